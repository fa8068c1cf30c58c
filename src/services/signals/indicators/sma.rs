//! Simple Moving Average (SMA).

use crate::error::{Result, SignalError};

/// Average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Result<f64> {
    if period == 0 {
        return Err(SignalError::InvalidValue("SMA period must be positive".to_string()));
    }
    if values.len() < period {
        return Err(SignalError::insufficient(period, values.len()));
    }

    Ok(values.iter().rev().take(period).sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_uses_latest_values() {
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap(), 4.5);
    }

    #[test]
    fn test_sma_whole_series() {
        assert_eq!(sma(&[2.0, 4.0, 6.0], 3).unwrap(), 4.0);
    }

    #[test]
    fn test_sma_insufficient() {
        assert!(sma(&[1.0], 5).unwrap_err().is_insufficient_data());
    }
}
