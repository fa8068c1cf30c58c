//! Small statistics helpers shared by the detectors and scorers.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Bar-to-bar fractional returns. Pairs with a non-positive base yield NaN
/// so callers can drop them while keeping positions aligned.
pub fn pct_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { f64::NAN })
        .collect()
}

/// Pearson correlation coefficient of two return series.
///
/// Series are aligned from the end to the shorter length and pairs with a
/// non-finite member are ignored. Degenerate inputs (fewer than 2 valid
/// pairs, zero variance) give exactly 0. The result is clamped to [-1, 1].
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();

    if pairs.len() < 2 {
        return 0.0;
    }

    let count = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / count;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a < 1e-18 || var_b < 1e-18 {
        return 0.0;
    }

    let r = cov / (var_a.sqrt() * var_b.sqrt());
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
