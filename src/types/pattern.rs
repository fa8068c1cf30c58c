use super::Trend;
use serde::{Deserialize, Serialize};

/// Ordinary least-squares line fitted over bar index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Relative move of the fitted line across the whole window.
    pub normalized_slope: f64,
}

impl TrendLine {
    /// Value of the line at bar `index`.
    pub fn value_at(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }
}

/// Close through support or resistance on above-average volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakout {
    pub bias: Trend,
    pub confidence: u8,
    /// Level that was crossed.
    pub level: f64,
    pub close: f64,
    /// Breakout-bar volume divided by the window average.
    pub volume_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriangleKind {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triangle {
    pub kind: TriangleKind,
    pub bias: Trend,
    pub confidence: u8,
    pub resistance_line: TrendLine,
    pub support_line: TrendLine,
}

/// Strong move followed by a tight consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub bias: Trend,
    pub confidence: u8,
    /// Percent change from the mid-window close to the last close.
    pub pole_change_pct: f64,
    /// Percent change from the three-quarter close to the last close.
    pub consolidation_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WedgeKind {
    Rising,
    Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wedge {
    pub kind: WedgeKind,
    pub bias: Trend,
    pub confidence: u8,
    pub resistance_line: TrendLine,
    pub support_line: TrendLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoubleKind {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoublePattern {
    pub kind: DoubleKind,
    pub bias: Trend,
    pub confidence: u8,
    pub level: f64,
    /// Window indices that touched the level.
    pub touches: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadShoulders {
    pub bias: Trend,
    pub confidence: u8,
    pub left_shoulder: f64,
    pub head: f64,
    pub right_shoulder: f64,
    pub neckline: f64,
    /// Projected price: neckline minus the head height.
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandlestickKind {
    Doji,
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    HangingMan,
    InvertedHammer,
    ShootingStar,
}

impl CandlestickKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Doji => "Doji",
            Self::BullishEngulfing => "Bullish Engulfing",
            Self::BearishEngulfing => "Bearish Engulfing",
            Self::Hammer => "Hammer",
            Self::HangingMan => "Hanging Man",
            Self::InvertedHammer => "Inverted Hammer",
            Self::ShootingStar => "Shooting Star",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlestickPattern {
    pub kind: CandlestickKind,
    pub bias: Trend,
    pub confidence: u8,
    /// Body size over high-low range of the signalling bar.
    pub body_ratio: f64,
}

/// Discriminant of [`Pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    Breakout,
    Triangle,
    Flag,
    Wedge,
    Double,
    HeadShoulders,
    Candlestick,
}

/// Any detected pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pattern {
    Breakout(Breakout),
    Triangle(Triangle),
    Flag(Flag),
    Wedge(Wedge),
    Double(DoublePattern),
    HeadShoulders(HeadShoulders),
    Candlestick(CandlestickPattern),
}

impl Pattern {
    pub fn pattern_type(&self) -> PatternType {
        match self {
            Pattern::Breakout(_) => PatternType::Breakout,
            Pattern::Triangle(_) => PatternType::Triangle,
            Pattern::Flag(_) => PatternType::Flag,
            Pattern::Wedge(_) => PatternType::Wedge,
            Pattern::Double(_) => PatternType::Double,
            Pattern::HeadShoulders(_) => PatternType::HeadShoulders,
            Pattern::Candlestick(_) => PatternType::Candlestick,
        }
    }

    pub fn bias(&self) -> Trend {
        match self {
            Pattern::Breakout(p) => p.bias,
            Pattern::Triangle(p) => p.bias,
            Pattern::Flag(p) => p.bias,
            Pattern::Wedge(p) => p.bias,
            Pattern::Double(p) => p.bias,
            Pattern::HeadShoulders(p) => p.bias,
            Pattern::Candlestick(p) => p.bias,
        }
    }

    pub fn confidence(&self) -> u8 {
        match self {
            Pattern::Breakout(p) => p.confidence,
            Pattern::Triangle(p) => p.confidence,
            Pattern::Flag(p) => p.confidence,
            Pattern::Wedge(p) => p.confidence,
            Pattern::Double(p) => p.confidence,
            Pattern::HeadShoulders(p) => p.confidence,
            Pattern::Candlestick(p) => p.confidence,
        }
    }
}

/// Everything the detector found in one window.
///
/// The default value is the fail-soft result: no levels, no patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternResult {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    /// Standard deviation of single-bar returns over the window.
    pub volatility: Option<f64>,
    /// Tolerance band chosen from the volatility.
    pub tolerance: Option<f64>,
    pub breakout: Option<Breakout>,
    pub triangle: Option<Triangle>,
    pub flag: Option<Flag>,
    pub wedge: Option<Wedge>,
    pub double: Option<DoublePattern>,
    pub head_shoulders: Option<HeadShoulders>,
    pub candlesticks: Vec<CandlestickPattern>,
}

impl PatternResult {
    /// All detections as tagged patterns.
    pub fn patterns(&self) -> Vec<Pattern> {
        let mut out = Vec::new();
        out.extend(self.breakout.clone().map(Pattern::Breakout));
        out.extend(self.triangle.clone().map(Pattern::Triangle));
        out.extend(self.flag.clone().map(Pattern::Flag));
        out.extend(self.wedge.clone().map(Pattern::Wedge));
        out.extend(self.double.clone().map(Pattern::Double));
        out.extend(self.head_shoulders.clone().map(Pattern::HeadShoulders));
        out.extend(self.candlesticks.iter().cloned().map(Pattern::Candlestick));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.patterns().is_empty()
    }

    /// Confidence-weighted vote of all directional detections.
    pub fn dominant_bias(&self) -> Trend {
        let mut bull = 0u32;
        let mut bear = 0u32;
        for pattern in self.patterns() {
            match pattern.bias() {
                Trend::Bullish => bull += pattern.confidence() as u32,
                Trend::Bearish => bear += pattern.confidence() as u32,
                Trend::Neutral => {}
            }
        }
        match bull.cmp(&bear) {
            std::cmp::Ordering::Greater => Trend::Bullish,
            std::cmp::Ordering::Less => Trend::Bearish,
            std::cmp::Ordering::Equal => Trend::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(kind: CandlestickKind, bias: Trend, confidence: u8) -> CandlestickPattern {
        CandlestickPattern {
            kind,
            bias,
            confidence,
            body_ratio: 0.5,
        }
    }

    #[test]
    fn test_default_result_is_empty() {
        let result = PatternResult::default();
        assert!(result.is_empty());
        assert_eq!(result.dominant_bias(), Trend::Neutral);
    }

    #[test]
    fn test_dominant_bias_weights_confidence() {
        let result = PatternResult {
            candlesticks: vec![
                candle(CandlestickKind::BullishEngulfing, Trend::Bullish, 90),
                candle(CandlestickKind::ShootingStar, Trend::Bearish, 60),
                candle(CandlestickKind::Doji, Trend::Neutral, 95),
            ],
            ..Default::default()
        };
        assert_eq!(result.patterns().len(), 3);
        assert_eq!(result.dominant_bias(), Trend::Bullish);
    }

    #[test]
    fn test_pattern_is_tagged_by_type() {
        let pattern = Pattern::Candlestick(candle(CandlestickKind::Hammer, Trend::Bullish, 80));
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["type"], "CANDLESTICK");
        assert_eq!(json["kind"], "HAMMER");
        assert_eq!(json["bias"], "BULLISH");
        assert_eq!(pattern.pattern_type(), PatternType::Candlestick);
    }

    #[test]
    fn test_trend_line_value() {
        let line = TrendLine {
            slope: 2.0,
            intercept: 10.0,
            r_squared: 1.0,
            normalized_slope: 0.0,
        };
        assert_eq!(line.value_at(3.0), 16.0);
    }
}
