//! Least-squares trendlines over bar index.

use crate::types::TrendLine;

/// Shape of a fitted line after tolerance and quality gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    Flat,
    Rising,
    Falling,
    /// R² too low to call it a line at all.
    Noisy,
}

/// Fit y = intercept + slope * i for i = 0..n.
///
/// A perfectly constant series has R² = 1. `None` with fewer than two
/// points or a non-positive mean.
pub fn fit_line(values: &[f64]) -> Option<TrendLine> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let sum_t: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_t2: f64 = (0..values.len()).map(|i| (i * i) as f64).sum();
    let sum_ty: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &y)| i as f64 * y)
        .sum();

    let denominator = n * sum_t2 - sum_t * sum_t;
    if denominator.abs() < 1e-10 {
        return None;
    }

    let slope = (n * sum_ty - sum_t * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_t) / n;

    let mean_y = sum_y / n;
    if mean_y <= 0.0 {
        return None;
    }

    let ss_tot: f64 = values.iter().map(|&y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();

    // Relative to the price level so flatness does not depend on price scale.
    let r_squared = if ss_tot > 1e-10 * mean_y * mean_y {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else {
        1.0
    };

    Some(TrendLine {
        slope,
        intercept,
        r_squared,
        normalized_slope: slope * n / mean_y,
    })
}

/// Classify a line: R² must exceed `min_r_squared`, then the normalised
/// slope is compared against `tolerance`.
pub fn classify(line: &TrendLine, tolerance: f64, min_r_squared: f64) -> LineDirection {
    if line.r_squared <= min_r_squared {
        return LineDirection::Noisy;
    }
    if line.normalized_slope.abs() < tolerance {
        LineDirection::Flat
    } else if line.normalized_slope > 0.0 {
        LineDirection::Rising
    } else {
        LineDirection::Falling
    }
}
