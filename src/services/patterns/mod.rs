//! Chart pattern and candlestick detection.

pub mod candlestick;
pub mod chart;
pub mod trendline;

use crate::config::PatternConfig;
use crate::error::{Result, SignalError};
use crate::services::signals::stats::{pct_returns, std_dev};
use crate::types::{OhlcvSeries, PatternResult};
use tracing::{debug, warn};

/// Detection window shared by the chart pattern checks.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub bars: &'a OhlcvSeries,
    /// Relative band used for flatness, touches and convergence.
    pub tolerance: f64,
    pub support: f64,
    pub resistance: f64,
}

/// Stateless detector over the trailing window of a series.
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Detect everything in the last `min_window` bars.
    ///
    /// Invalid or short input yields an empty result rather than an error.
    pub fn detect(&self, series: &OhlcvSeries) -> PatternResult {
        let bars = series.tail(self.config.min_window);
        if let Err(e) = self.validate(series, &bars) {
            if e.is_insufficient_data() {
                debug!("Pattern detection skipped: {}", e);
            } else {
                warn!("Pattern detection rejected input: {}", e);
            }
            return PatternResult::default();
        }

        let returns: Vec<f64> = pct_returns(&bars.close)
            .into_iter()
            .filter(|r| r.is_finite())
            .collect();
        let volatility = std_dev(&returns).unwrap_or(0.0);
        let tolerance = self.tolerance_for(volatility);

        let window = Window {
            bars: &bars,
            tolerance,
            support: bars.low.iter().copied().fold(f64::MAX, f64::min),
            resistance: bars.high.iter().copied().fold(f64::MIN, f64::max),
        };

        let upper = trendline::fit_line(&bars.high);
        let lower = trendline::fit_line(&bars.low);
        let (triangle, wedge) = match (&upper, &lower) {
            (Some(upper), Some(lower)) => (
                chart::triangle(&window, &self.config, upper, lower),
                chart::wedge(&window, &self.config, upper, lower),
            ),
            _ => (None, None),
        };

        let result = PatternResult {
            support: Some(window.support),
            resistance: Some(window.resistance),
            volatility: Some(volatility),
            tolerance: Some(tolerance),
            breakout: chart::breakout(&window, &self.config),
            triangle,
            flag: chart::flag(&window, &self.config),
            wedge,
            double: chart::double(&window, &self.config),
            head_shoulders: chart::head_shoulders(&window, &self.config),
            candlesticks: candlestick::detect(&bars, &self.config),
        };

        debug!(
            "Detected {} patterns (volatility {:.4}, tolerance {})",
            result.patterns().len(),
            volatility,
            tolerance
        );
        result
    }

    /// Tolerance band for a measured return volatility.
    pub fn tolerance_for(&self, volatility: f64) -> f64 {
        if volatility < self.config.low_volatility {
            self.config.tight_tolerance
        } else if volatility > self.config.high_volatility {
            self.config.wide_tolerance
        } else {
            self.config.default_tolerance
        }
    }

    fn validate(&self, series: &OhlcvSeries, bars: &OhlcvSeries) -> Result<()> {
        if !series.is_aligned() {
            return Err(SignalError::InvalidValue(
                "OHLCV arrays have different lengths".to_string(),
            ));
        }
        if series.len() < self.config.min_window {
            return Err(SignalError::insufficient(self.config.min_window, series.len()));
        }

        let prices = bars.open.iter().chain(&bars.high).chain(&bars.low).chain(&bars.close);
        if let Some(bad) = prices.copied().find(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SignalError::InvalidValue(format!("price {}", bad)));
        }
        if let Some(bad) = bars.volume.iter().copied().find(|v| !v.is_finite() || *v < 0.0) {
            return Err(SignalError::InvalidValue(format!("volume {}", bad)));
        }

        let n = bars.len();
        let sample = self.config.consistency_sample.min(n);
        let inconsistent = (0..sample)
            .chain(n - sample..n)
            .find(|&i| !bars.is_consistent_at(i));
        if let Some(i) = inconsistent {
            return Err(SignalError::InvalidValue(format!(
                "bar {} violates high/low bounds",
                i
            )));
        }

        Ok(())
    }
}
