//! Average True Range (ATR).

use crate::error::{Result, SignalError};

/// True range of bar `i` against the previous close:
/// TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|)
fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// ATR at the last bar using Wilder's smoothing.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<f64> {
    if period == 0 {
        return Err(SignalError::InvalidValue("ATR period must be positive".to_string()));
    }
    let n = close.len().min(high.len()).min(low.len());
    if n < period + 1 {
        return Err(SignalError::insufficient(period + 1, n));
    }

    let true_ranges: Vec<f64> = (1..n)
        .map(|i| true_range(high[i], low[i], close[i - 1]))
        .collect();

    let mut value: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    for tr in true_ranges.iter().skip(period) {
        value = (value * (period - 1) as f64 + tr) / period as f64;
    }

    Ok(value)
}

/// ATR as a percentage of the last close.
pub fn atr_pct(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<f64> {
    let value = atr(high, low, close, period)?;
    let last = close
        .last()
        .copied()
        .filter(|c| *c > 0.0)
        .ok_or_else(|| SignalError::InvalidValue("last close must be positive".to_string()))?;
    Ok(value / last * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atr_constant_range() {
        let close = vec![100.0; 20];
        let high = vec![101.0; 20];
        let low = vec![99.0; 20];
        let value = atr(&high, &low, &close, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-12);
        let pct = atr_pct(&high, &low, &close, 14).unwrap();
        assert!((pct - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_atr_uses_gap_from_previous_close() {
        // Bar 1 gaps up: |high - prev close| dominates the range.
        let close = vec![100.0, 110.0];
        let high = vec![100.0, 111.0];
        let low = vec![100.0, 109.0];
        assert_eq!(atr(&high, &low, &close, 1).unwrap(), 11.0);
    }

    #[test]
    fn test_atr_insufficient() {
        let v = vec![1.0; 5];
        assert!(atr(&v, &v, &v, 14).unwrap_err().is_insufficient_data());
    }
}
