//! Relative Strength Index (RSI).

use crate::error::{Result, SignalError};

/// RSI of the last value using Wilder's smoothing.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses.
/// Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// A series with no movement at all reads 50.
pub fn rsi(values: &[f64], period: usize) -> Result<f64> {
    if period == 0 {
        return Err(SignalError::InvalidValue("RSI period must be positive".to_string()));
    }
    if values.len() < period + 1 {
        return Err(SignalError::insufficient(period + 1, values.len()));
    }

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);

    for pair in values.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uptrend(count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| 100.0 + i as f64 * 1.5 + if i % 3 == 0 { -1.0 } else { 0.0 })
            .collect()
    }

    fn downtrend(count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| 200.0 - i as f64 * 1.5 + if i % 3 == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let err = rsi(&uptrend(10), 14).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_rsi_zero_period() {
        assert!(matches!(rsi(&uptrend(10), 0), Err(SignalError::InvalidValue(_))));
    }

    #[test]
    fn test_rsi_uptrend_high_value() {
        let value = rsi(&uptrend(50), 14).unwrap();
        assert!(value > 50.0, "RSI in uptrend should be > 50, got {}", value);
    }

    #[test]
    fn test_rsi_downtrend_low_value() {
        let value = rsi(&downtrend(50), 14).unwrap();
        assert!(value < 50.0, "RSI in downtrend should be < 50, got {}", value);
    }

    #[test]
    fn test_rsi_flat_series_is_neutral() {
        assert_eq!(rsi(&[100.0; 20], 14).unwrap(), 50.0);
    }

    #[test]
    fn test_rsi_only_gains_is_100() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&values, 14).unwrap(), 100.0);
    }

    #[test]
    fn test_rsi_custom_period() {
        let value = rsi(&uptrend(20), 7).unwrap();
        assert!((0.0..=100.0).contains(&value));
    }
}
