//! Indicator math consumed by the cache and the scorers.
//!
//! The cache talks to indicators only through [`IndicatorLibrary`], so the
//! numeric routines can be swapped (or mocked in tests) without touching the
//! caching and optimization logic.

pub mod indicators;
pub mod stats;

use crate::error::{Result, SignalError};
use crate::types::MacdValue;

/// Stateless indicator routines parameterised by period.
///
/// Insufficient data is reported as [`SignalError::InsufficientData`], which is
/// distinct from a computed zero.
pub trait IndicatorLibrary: Send + Sync {
    fn rsi(&self, values: &[f64], period: usize) -> Result<f64>;

    fn macd(&self, values: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MacdValue>;

    fn sma(&self, values: &[f64], period: usize) -> Result<f64>;
}

/// Wilder RSI, EMA-based MACD and simple moving average.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardIndicators;

impl IndicatorLibrary for StandardIndicators {
    fn rsi(&self, values: &[f64], period: usize) -> Result<f64> {
        ensure_finite(values)?;
        finite_or_err("RSI", indicators::rsi(values, period)?)
    }

    fn macd(&self, values: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MacdValue> {
        ensure_finite(values)?;
        let value = indicators::macd(values, fast, slow, signal)?;
        if value.macd.is_finite() && value.signal.is_finite() && value.histogram.is_finite() {
            Ok(value)
        } else {
            Err(SignalError::InvalidValue("MACD produced a non-finite value".to_string()))
        }
    }

    fn sma(&self, values: &[f64], period: usize) -> Result<f64> {
        ensure_finite(values)?;
        finite_or_err("SMA", indicators::sma(values, period)?)
    }
}

fn ensure_finite(values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite() || *v <= 0.0) {
        Some(i) => Err(SignalError::InvalidValue(format!(
            "value at index {} is {}",
            i, values[i]
        ))),
        None => Ok(()),
    }
}

fn finite_or_err(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SignalError::InvalidValue(format!("{} produced {}", name, value)))
    }
}
