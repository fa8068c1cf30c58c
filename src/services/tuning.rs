//! Volatility-driven indicator period selection.

use crate::error::Result;
use crate::services::optimizer::ParamOptimizer;
use crate::services::signals::stats::{pct_returns, std_dev};
use crate::types::{OhlcvSeries, ParamSet, Timeframe};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Picks shorter periods for volatile series and longer ones for quiet series.
///
/// The measured return volatility is recorded in `volatility_level`.
#[derive(Debug, Clone)]
pub struct VolatilityTuner {
    /// Returns stdev below this counts as quiet.
    pub low_volatility: f64,
    /// Returns stdev above this counts as volatile.
    pub high_volatility: f64,
    /// Fewer closes than this yields no candidate.
    pub min_bars: usize,
}

impl Default for VolatilityTuner {
    fn default() -> Self {
        Self {
            low_volatility: 0.01,
            high_volatility: 0.03,
            min_bars: 30,
        }
    }
}

impl VolatilityTuner {
    /// Periods for a measured volatility and available history.
    pub fn select(&self, volatility: f64, bars: usize) -> ParamSet {
        let base = if volatility > self.high_volatility {
            ParamSet {
                rsi_period: 9,
                macd_fast: 8,
                macd_slow: 21,
                macd_signal: 5,
                ma_short: 10,
                ma_long: 30,
                volatility_level: 0.0,
            }
        } else if volatility < self.low_volatility && bars >= 100 {
            ParamSet {
                rsi_period: 21,
                macd_fast: 12,
                macd_slow: 26,
                macd_signal: 9,
                ma_short: 30,
                ma_long: 100,
                volatility_level: 0.0,
            }
        } else {
            ParamSet::default()
        };

        ParamSet {
            volatility_level: volatility,
            ..base
        }
    }
}

impl ParamOptimizer for VolatilityTuner {
    fn optimize<'a>(
        &'a self,
        series: &'a OhlcvSeries,
        symbol: &'a str,
        timeframe: Timeframe,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ParamSet>>> + Send + 'a>> {
        Box::pin(async move {
            if series.len() < self.min_bars {
                return Ok(None);
            }

            let returns: Vec<f64> = pct_returns(series.closes())
                .into_iter()
                .filter(|r| r.is_finite())
                .collect();
            let Some(volatility) = std_dev(&returns).filter(|v| v.is_finite()) else {
                return Ok(None);
            };

            let params = self.select(volatility, series.len());
            debug!(
                "Tuned {} at {}: volatility {:.4} -> rsi {} ma {}/{}",
                symbol, timeframe, volatility, params.rsi_period, params.ma_short, params.ma_long
            );
            Ok(Some(params))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_volatile() {
        let params = VolatilityTuner::default().select(0.05, 200);
        assert_eq!(params.rsi_period, 9);
        assert_eq!(params.ma_long, 30);
        assert_eq!(params.volatility_level, 0.05);
        assert!(params.is_valid());
    }

    #[test]
    fn test_select_quiet_needs_history() {
        let tuner = VolatilityTuner::default();
        assert_eq!(tuner.select(0.001, 150).ma_long, 100);
        assert_eq!(tuner.select(0.001, 60).ma_long, 50);
    }

    #[test]
    fn test_optimize_short_series_has_no_candidate() {
        let series = OhlcvSeries::from_closes(&[100.0; 10]);
        let tuner = VolatilityTuner::default();
        let result =
            tokio_test::block_on(tuner.optimize(&series, "btc", Timeframe::OneHour)).unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_optimize_volatile_series() {
        let closes: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 100.0 } else { 110.0 })
            .collect();
        let series = OhlcvSeries::from_closes(&closes);
        let params = VolatilityTuner::default()
            .optimize(&series, "doge", Timeframe::FiveMinutes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(params.rsi_period, 9);
        assert!(params.volatility_level > 0.03);
    }
}
