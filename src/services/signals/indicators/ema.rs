//! Exponential Moving Average (EMA).

/// EMA series seeded with the SMA of the first `period` values.
///
/// The output has `values.len() - period + 1` entries; the first one lines up
/// with `values[period - 1]`. Empty when there are fewer than `period` values.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = Vec::with_capacity(values.len() - period + 1);

    let mut current: f64 = values.iter().take(period).sum::<f64>() / period as f64;
    ema.push(current);

    for value in &values[period..] {
        current = (value - current) * multiplier + current;
        ema.push(current);
    }

    ema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeded_with_sma() {
        let ema = ema_series(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(ema.len(), 2);
        assert_eq!(ema[0], 2.0);
        // (4 - 2) * 0.5 + 2
        assert_eq!(ema[1], 3.0);
    }

    #[test]
    fn test_ema_too_short() {
        assert!(ema_series(&[1.0, 2.0], 3).is_empty());
        assert!(ema_series(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_ema_constant_series() {
        let ema = ema_series(&[5.0; 10], 4);
        assert!(ema.iter().all(|v| (*v - 5.0).abs() < 1e-12));
    }
}
