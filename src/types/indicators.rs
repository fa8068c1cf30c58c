use serde::{Deserialize, Deserializer, Serialize};

/// Indicator periods used for one computation.
///
/// Produced by defaults or by an optimizer and carried forward inside
/// [`IndicatorSet`] so the next computation reuses the last-known-good values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSet {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ma_short: usize,
    pub ma_long: usize,
    /// Return volatility measured when the set was produced (0 = unmeasured).
    #[serde(default, deserialize_with = "deserialize_volatility")]
    pub volatility_level: f64,
}

impl Default for ParamSet {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ma_short: 20,
            ma_long: 50,
            volatility_level: 0.0,
        }
    }
}

impl ParamSet {
    /// Periods are non-zero, MACD fast < slow, short MA < long MA and the
    /// volatility level is a finite non-negative number.
    pub fn is_valid(&self) -> bool {
        self.rsi_period > 0
            && self.macd_fast > 0
            && self.macd_signal > 0
            && self.macd_fast < self.macd_slow
            && self.ma_short > 0
            && self.ma_short < self.ma_long
            && self.volatility_level.is_finite()
            && self.volatility_level >= 0.0
    }
}

/// Volatility arrives either as a bare number or wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVolatility {
    Level(f64),
    Nested {
        #[serde(alias = "value")]
        level: f64,
    },
}

fn deserialize_volatility<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawVolatility::deserialize(deserializer)? {
        RawVolatility::Level(level) | RawVolatility::Nested { level } => level,
    })
}

/// MACD line, signal line and histogram at the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Indicators computed for one (symbol, timeframe) series.
///
/// Immutable once produced; cache entries are replaced, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub macd: Option<MacdValue>,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    /// Long MA of the series without its last bar.
    pub ma_long_prev: Option<f64>,
    pub volatility: f64,
    pub params: ParamSet,
}

impl IndicatorSet {
    /// Set with every indicator missing.
    pub fn empty(params: ParamSet) -> Self {
        Self {
            rsi: None,
            macd: None,
            ma_short: None,
            ma_long: None,
            ma_long_prev: None,
            volatility: params.volatility_level,
            params,
        }
    }

    /// Number of indicators that produced a value.
    pub fn populated(&self) -> usize {
        [
            self.rsi.is_some(),
            self.macd.is_some(),
            self.ma_short.is_some(),
            self.ma_long.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}
