//! Single- and two-bar candlestick formations on the most recent bars.

use crate::config::PatternConfig;
use crate::types::{CandlestickKind, CandlestickPattern, OhlcvSeries, Trend};

/// Geometry of one bar.
#[derive(Debug, Clone, Copy)]
struct Candle {
    open: f64,
    close: f64,
    body: f64,
    upper_shadow: f64,
    lower_shadow: f64,
    body_ratio: f64,
}

impl Candle {
    fn at(bars: &OhlcvSeries, i: usize) -> Self {
        let (open, high, low, close) = (bars.open[i], bars.high[i], bars.low[i], bars.close[i]);
        let body = (close - open).abs();
        let range = high - low;
        Self {
            open,
            close,
            body,
            upper_shadow: high - open.max(close),
            lower_shadow: open.min(close) - low,
            body_ratio: if range > 0.0 { body / range } else { 0.0 },
        }
    }

    fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Direction of the closes leading into bar `current`, by majority of moves.
fn prior_trend(closes: &[f64], current: usize, bars: usize) -> Trend {
    let start = current.saturating_sub(bars);
    let (mut ups, mut downs) = (0, 0);
    for pair in closes[start..current].windows(2) {
        if pair[1] > pair[0] {
            ups += 1;
        } else if pair[1] < pair[0] {
            downs += 1;
        }
    }
    match ups.cmp(&downs) {
        std::cmp::Ordering::Greater => Trend::Bullish,
        std::cmp::Ordering::Less => Trend::Bearish,
        std::cmp::Ordering::Equal => Trend::Neutral,
    }
}

fn confidence(config: &PatternConfig, base: u8, adjustment: i32, reversal: bool) -> u8 {
    let bonus = if reversal {
        config.reversal_bonus as i32
    } else {
        0
    };
    (base as i32 + adjustment + bonus).clamp(
        config.min_candle_confidence as i32,
        config.max_candle_confidence as i32,
    ) as u8
}

/// Detect formations on the last two bars of `bars`.
pub fn detect(bars: &OhlcvSeries, config: &PatternConfig) -> Vec<CandlestickPattern> {
    let n = bars.len();
    if n < 2 {
        return Vec::new();
    }

    let prev = Candle::at(bars, n - 2);
    let cur = Candle::at(bars, n - 1);
    let before = prior_trend(&bars.close, n - 1, config.prior_trend_bars);
    let adjust = config.body_ratio_adjustment as i32;
    let is_reversal = |bias: Trend| before != Trend::Neutral && bias == before.opposite();

    let mut found = Vec::new();
    let mut push = |kind: CandlestickKind, bias: Trend, base: u8, adjustment: i32| {
        found.push(CandlestickPattern {
            kind,
            bias,
            confidence: confidence(config, base, adjustment, is_reversal(bias)),
            body_ratio: cur.body_ratio,
        });
    };

    if cur.body <= cur.close * config.doji_body_pct {
        let adjustment = if cur.body_ratio < 0.1 { adjust } else { -adjust };
        push(
            CandlestickKind::Doji,
            Trend::Neutral,
            config.doji_base_confidence,
            adjustment,
        );
    }

    let engulfs = cur.open.min(cur.close) < prev.open.min(prev.close)
        && cur.open.max(cur.close) > prev.open.max(prev.close);
    if engulfs {
        let adjustment = if cur.body_ratio >= 0.6 {
            adjust
        } else if cur.body_ratio < 0.4 {
            -adjust
        } else {
            0
        };
        if prev.is_bearish() && cur.is_bullish() {
            push(
                CandlestickKind::BullishEngulfing,
                Trend::Bullish,
                config.engulfing_base_confidence,
                adjustment,
            );
        } else if prev.is_bullish() && cur.is_bearish() {
            push(
                CandlestickKind::BearishEngulfing,
                Trend::Bearish,
                config.engulfing_base_confidence,
                adjustment,
            );
        }
    }

    let long = config.long_shadow_ratio * cur.body;
    let short = config.short_shadow_ratio * cur.body;
    let small_body_adjustment = if cur.body_ratio <= 0.3 { adjust } else { -adjust };

    if cur.lower_shadow >= long && cur.upper_shadow < short {
        let (kind, bias) = if before == Trend::Bullish {
            (CandlestickKind::HangingMan, Trend::Bearish)
        } else {
            (CandlestickKind::Hammer, Trend::Bullish)
        };
        push(kind, bias, config.hammer_base_confidence, small_body_adjustment);
    } else if cur.upper_shadow >= long && cur.lower_shadow < short {
        let (kind, bias) = if before == Trend::Bullish {
            (CandlestickKind::ShootingStar, Trend::Bearish)
        } else {
            (CandlestickKind::InvertedHammer, Trend::Bullish)
        };
        push(kind, bias, config.hammer_base_confidence, small_body_adjustment);
    }

    found
}
