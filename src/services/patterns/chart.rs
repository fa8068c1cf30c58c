//! Multi-bar chart patterns over the detection window.

use super::trendline::{classify, LineDirection};
use super::Window;
use crate::config::PatternConfig;
use crate::services::signals::stats::mean;
use crate::types::{
    Breakout, DoubleKind, DoublePattern, Flag, HeadShoulders, Trend, TrendLine, Triangle,
    TriangleKind, Wedge, WedgeKind,
};

fn to_confidence(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Confidence of a two-line pattern from the average fit quality.
fn line_confidence(upper: &TrendLine, lower: &TrendLine) -> u8 {
    let avg_r2 = (upper.r_squared + lower.r_squared) / 2.0;
    to_confidence(50.0 + 40.0 * avg_r2)
}

/// Last close crossing the prior window's extreme on a volume spike.
///
/// The prior extremes exclude the last bar so the level being broken was
/// in place before the breakout bar.
pub fn breakout(w: &Window<'_>, config: &PatternConfig) -> Option<Breakout> {
    let bars = w.bars;
    let n = bars.len();
    if n < 3 {
        return None;
    }

    let prior_high = bars.high[..n - 1].iter().copied().fold(f64::MIN, f64::max);
    let prior_low = bars.low[..n - 1].iter().copied().fold(f64::MAX, f64::min);
    let prev_close = bars.close[n - 2];
    let last_close = bars.close[n - 1];

    let avg_volume = mean(&bars.volume)?;
    if avg_volume <= 0.0 {
        return None;
    }
    let volume_ratio = bars.volume[n - 1] / avg_volume;
    if volume_ratio <= config.volume_threshold {
        return None;
    }

    let (bias, level) = if prev_close <= prior_high && last_close > prior_high {
        (Trend::Bullish, prior_high)
    } else if prev_close >= prior_low && last_close < prior_low {
        (Trend::Bearish, prior_low)
    } else {
        return None;
    };

    let penetration = (last_close - level).abs() / level;
    let volume_bonus = ((volume_ratio / config.volume_threshold - 1.0) * 40.0).min(20.0);
    let penetration_bonus = (penetration / w.tolerance * 5.0).min(15.0);

    Some(Breakout {
        bias,
        confidence: to_confidence(60.0 + volume_bonus + penetration_bonus),
        level,
        close: last_close,
        volume_ratio,
    })
}

/// Ascending: flat highs over rising lows. Descending: flat lows under
/// falling highs.
pub fn triangle(
    w: &Window<'_>,
    config: &PatternConfig,
    upper: &TrendLine,
    lower: &TrendLine,
) -> Option<Triangle> {
    let up = classify(upper, w.tolerance, config.min_r_squared);
    let down = classify(lower, w.tolerance, config.min_r_squared);

    let (kind, bias) = match (up, down) {
        (LineDirection::Flat, LineDirection::Rising) => (TriangleKind::Ascending, Trend::Bullish),
        (LineDirection::Falling, LineDirection::Flat) => {
            (TriangleKind::Descending, Trend::Bearish)
        }
        _ => return None,
    };

    Some(Triangle {
        kind,
        bias,
        confidence: line_confidence(upper, lower),
        resistance_line: *upper,
        support_line: *lower,
    })
}

/// Both lines sloping the same way and converging.
///
/// Rising wedge: the support line climbs faster than resistance. Falling
/// wedge: resistance drops faster than support.
pub fn wedge(
    w: &Window<'_>,
    config: &PatternConfig,
    upper: &TrendLine,
    lower: &TrendLine,
) -> Option<Wedge> {
    let up = classify(upper, w.tolerance, config.min_r_squared);
    let down = classify(lower, w.tolerance, config.min_r_squared);

    let gap = (upper.normalized_slope - lower.normalized_slope).abs();
    if gap <= w.tolerance {
        return None;
    }

    let (kind, bias) = match (up, down) {
        (LineDirection::Rising, LineDirection::Rising)
            if upper.slope.abs() < lower.slope.abs() =>
        {
            (WedgeKind::Rising, Trend::Bearish)
        }
        (LineDirection::Falling, LineDirection::Falling)
            if upper.slope.abs() > lower.slope.abs() =>
        {
            (WedgeKind::Falling, Trend::Bullish)
        }
        _ => return None,
    };

    Some(Wedge {
        kind,
        bias,
        confidence: line_confidence(upper, lower),
        resistance_line: *upper,
        support_line: *lower,
    })
}

/// Strong pole into the middle of the window, then a small drift.
pub fn flag(w: &Window<'_>, config: &PatternConfig) -> Option<Flag> {
    let closes = &w.bars.close;
    let n = closes.len();
    if n < 4 {
        return None;
    }

    let last = closes[n - 1];
    let mid = closes[n / 2];
    let three_quarter = closes[3 * n / 4];
    if mid <= 0.0 || three_quarter <= 0.0 {
        return None;
    }

    let pole_change_pct = (last - mid) / mid * 100.0;
    let consolidation_pct = (last - three_quarter) / three_quarter * 100.0;

    if pole_change_pct.abs() <= config.flag_pole_min_pct
        || consolidation_pct.abs() >= config.flag_consolidation_max_pct
    {
        return None;
    }

    let bias = if pole_change_pct > 0.0 {
        Trend::Bullish
    } else {
        Trend::Bearish
    };
    let pole_bonus = ((pole_change_pct.abs() - config.flag_pole_min_pct) * 3.0).min(25.0);
    let tightness_bonus =
        (config.flag_consolidation_max_pct - consolidation_pct.abs()) * 5.0;

    Some(Flag {
        bias,
        confidence: to_confidence(55.0 + pole_bonus + tightness_bonus),
        pole_change_pct,
        consolidation_pct,
    })
}

fn touches(values: &[f64], level: f64, tolerance: f64) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - level) / level).abs() <= tolerance)
        .map(|(i, _)| i)
        .collect()
}

/// Two touches far enough apart with at least one bar between them that
/// pulled away from the level.
fn has_separated_retest(touched: &[usize], min_separation: usize) -> bool {
    touched.iter().enumerate().any(|(a, &i)| {
        touched[a + 1..].iter().enumerate().any(|(offset, &j)| {
            let between_touches = offset;
            let gap = j - i;
            gap >= min_separation && between_touches < gap - 1
        })
    })
}

/// Repeated tests of resistance (top) or support (bottom).
///
/// When both qualify, the level nearer the last close wins.
pub fn double(w: &Window<'_>, config: &PatternConfig) -> Option<DoublePattern> {
    let last = *w.bars.close.last()?;

    let build = |kind: DoubleKind, values: &[f64], level: f64| -> Option<DoublePattern> {
        let touched = touches(values, level, w.tolerance);
        if !has_separated_retest(&touched, config.min_touch_separation) {
            return None;
        }
        let bias = match kind {
            DoubleKind::Top => Trend::Bearish,
            DoubleKind::Bottom => Trend::Bullish,
        };
        let extra = touched.len().saturating_sub(2) as f64;
        Some(DoublePattern {
            kind,
            bias,
            confidence: to_confidence((60.0 + 5.0 * extra).min(85.0)),
            level,
            touches: touched,
        })
    };

    let top = build(DoubleKind::Top, &w.bars.high, w.resistance);
    let bottom = build(DoubleKind::Bottom, &w.bars.low, w.support);

    match (top, bottom) {
        (Some(t), Some(b)) => {
            if (t.level - last).abs() <= (b.level - last).abs() {
                Some(t)
            } else {
                Some(b)
            }
        }
        (t, b) => t.or(b),
    }
}

/// Three peaks in the trailing bars with a dominant middle peak.
pub fn head_shoulders(w: &Window<'_>, config: &PatternConfig) -> Option<HeadShoulders> {
    let span = config.head_shoulders_bars.max(7);
    if w.bars.len() < span {
        return None;
    }
    let recent = w.bars.tail(span);

    let left_shoulder = recent.high[1];
    let head = recent.high[3];
    let right_shoulder = recent.high[5];
    let neckline = recent.low[2].min(recent.low[4]);

    if head <= left_shoulder || head <= right_shoulder || head <= neckline {
        return None;
    }

    let shoulder_diff =
        (left_shoulder - right_shoulder).abs() / left_shoulder.max(right_shoulder);
    if shoulder_diff > w.tolerance {
        return None;
    }

    let symmetry = 1.0 - shoulder_diff / w.tolerance;
    Some(HeadShoulders {
        bias: Trend::Bearish,
        confidence: to_confidence(65.0 + 15.0 * symmetry),
        left_shoulder,
        head,
        right_shoulder,
        neckline,
        target: neckline - (head - neckline),
    })
}
