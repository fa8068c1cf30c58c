//! MACD (Moving Average Convergence Divergence).

use super::ema::ema_series;
use crate::error::{Result, SignalError};
use crate::types::MacdValue;

/// MACD at the last value.
///
/// - MACD Line = EMA(fast) - EMA(slow)
/// - Signal Line = EMA(signal) of MACD Line
/// - Histogram = MACD Line - Signal Line
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MacdValue> {
    if fast == 0 || signal == 0 || fast >= slow {
        return Err(SignalError::InvalidValue(format!(
            "MACD periods {}/{}/{} are not usable",
            fast, slow, signal
        )));
    }

    let required = slow + signal - 1;
    if values.len() < required {
        return Err(SignalError::insufficient(required, values.len()));
    }

    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);

    // Fast EMA starts (slow - fast) values earlier.
    let offset = slow - fast;
    let macd_line: Vec<f64> = fast_ema
        .iter()
        .skip(offset)
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema_series(&macd_line, signal);

    match (macd_line.last(), signal_line.last()) {
        (Some(&macd), Some(&signal)) => Ok(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        }),
        _ => Err(SignalError::insufficient(required, values.len())),
    }
}
