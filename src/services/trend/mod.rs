//! Trend consensus and bounded strength scoring.
//!
//! Four votes decide the direction; RSI, MACD, MA spread and volume move a
//! 0-100 strength away from 50. The raw sum saturates easily, so the result
//! is then capped by context: near the long MA, in a tight sideways range,
//! and on the daily timeframe unless several extremes line up.

pub mod correlation;

use crate::config::{CorrelationConfig, ScoringConfig};
use crate::services::signals::indicators::atr_pct;
use crate::services::signals::stats::mean;
use crate::types::{IndicatorSet, OhlcvSeries, Timeframe, Trend, TrendScore};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct TrendConsensusScorer {
    scoring: ScoringConfig,
    correlation: CorrelationConfig,
}

/// Bull and bear votes cast by the indicator set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Votes {
    pub bull: i32,
    pub bear: i32,
}

impl Votes {
    fn cast(&mut self, bullish: bool, bearish: bool) {
        if bullish {
            self.bull += 1;
        } else if bearish {
            self.bear += 1;
        }
    }
}

impl TrendConsensusScorer {
    pub fn new(scoring: ScoringConfig, correlation: CorrelationConfig) -> Self {
        Self {
            scoring,
            correlation,
        }
    }

    pub fn scoring_config(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn correlation_config(&self) -> &CorrelationConfig {
        &self.correlation
    }

    /// Trend label and strength for the latest bar.
    ///
    /// Without a usable last close the score is neutral at 50.
    pub fn score_trend(
        &self,
        indicators: &IndicatorSet,
        series: &OhlcvSeries,
        timeframe: Timeframe,
    ) -> TrendScore {
        let Some(price) = series.last_close().filter(|p| p.is_finite() && *p > 0.0) else {
            return TrendScore::neutral();
        };

        let votes = self.votes(indicators, price);
        let mut trend = self.decide(indicators, price, votes, timeframe);

        let mut raw = 50.0;
        if let Some(rsi) = indicators.rsi {
            raw += self.rsi_points(rsi);
        }
        if let Some(macd) = &indicators.macd {
            raw += self.macd_points(macd.macd - macd.signal, price);
        }
        if let (Some(short), Some(long)) = (indicators.ma_short, indicators.ma_long) {
            raw += self.ma_points(short, long);
        }

        let price_vs_ma = self
            .reference_ma(indicators, series)
            .map(|ma| (price - ma) / ma * 100.0)
            .unwrap_or(0.0);
        let near_ma = price_vs_ma.abs() <= self.scoring.near_ma_pct;
        if !near_ma {
            trend = if price_vs_ma > 0.0 {
                Trend::Bullish
            } else {
                Trend::Bearish
            };
        }

        // Contributions are signed towards bullish; a bearish call reads
        // them from the other side.
        let mut strength = match trend {
            Trend::Bearish => 100.0 - raw,
            _ => raw,
        };
        strength += self.volume_points(series);

        if near_ma {
            strength = strength.min(self.scoring.near_ma_cap);
        } else {
            strength = strength.max(self.scoring.far_ma_floor);
        }

        if self.is_consolidating(series) {
            strength = strength.min(self.scoring.consolidation_cap);
        }

        if timeframe.is_highest() {
            let ceiling = if self.is_extreme_confluence(indicators, price, price_vs_ma) {
                self.scoring.confluence_ceiling
            } else {
                self.scoring.highest_timeframe_ceiling
            };
            strength = strength.min(ceiling);
        }

        let strength = if strength.is_finite() {
            strength.round().clamp(0.0, 100.0) as u8
        } else {
            50
        };

        debug!(
            "Trend {} strength {} (votes {}/{}, price vs MA {:.2}%)",
            trend, strength, votes.bull, votes.bear, price_vs_ma
        );
        TrendScore { trend, strength }
    }

    /// Votes from price vs long MA, MA cross, long MA slope and MACD histogram.
    pub fn votes(&self, indicators: &IndicatorSet, price: f64) -> Votes {
        let band = self.scoring.price_ma_band;
        let mut votes = Votes::default();

        if let Some(long) = indicators.ma_long {
            votes.cast(price > long * (1.0 + band), price < long * (1.0 - band));
        }
        if let (Some(short), Some(long)) = (indicators.ma_short, indicators.ma_long) {
            votes.cast(short > long, short < long);
        }
        if let (Some(long), Some(prev)) = (indicators.ma_long, indicators.ma_long_prev) {
            votes.cast(long > prev, long < prev);
        }
        if let Some(macd) = &indicators.macd {
            votes.cast(macd.histogram > 0.0, macd.histogram < 0.0);
        }

        votes
    }

    fn decide(
        &self,
        indicators: &IndicatorSet,
        price: f64,
        votes: Votes,
        timeframe: Timeframe,
    ) -> Trend {
        if timeframe.is_highest() {
            if let (Some(short), Some(long)) = (indicators.ma_short, indicators.ma_long) {
                if price < long && short < long {
                    return Trend::Bearish;
                }
            }
        }

        if votes.bull - votes.bear >= self.scoring.vote_margin {
            Trend::Bullish
        } else if votes.bear - votes.bull >= self.scoring.vote_margin {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }

    fn rsi_points(&self, rsi: f64) -> f64 {
        let s = &self.scoring;
        if !rsi.is_finite() {
            0.0
        } else if rsi > s.rsi_overbought {
            s.rsi_max_points
        } else if rsi >= s.rsi_moderate_high {
            (rsi - s.rsi_moderate_high) / (s.rsi_overbought - s.rsi_moderate_high)
                * s.rsi_moderate_points
        } else if rsi < s.rsi_oversold {
            -s.rsi_max_points
        } else if rsi <= s.rsi_moderate_low {
            -(s.rsi_moderate_low - rsi) / (s.rsi_moderate_low - s.rsi_oversold)
                * s.rsi_moderate_points
        } else {
            0.0
        }
    }

    fn macd_points(&self, difference: f64, price: f64) -> f64 {
        let scaled = (difference / price * self.scoring.macd_scale).clamp(-1.0, 1.0);
        if scaled.is_finite() {
            scaled * self.scoring.macd_max_points
        } else {
            0.0
        }
    }

    fn ma_points(&self, short: f64, long: f64) -> f64 {
        if long <= 0.0 {
            return 0.0;
        }
        let spread = (short - long) / long;
        (spread / self.scoring.ma_spread_full).clamp(-1.0, 1.0) * self.scoring.ma_spread_max_points
    }

    /// Last bar's volume against the average of the bars before it.
    fn volume_points(&self, series: &OhlcvSeries) -> f64 {
        let n = series.volume.len();
        if n < 2 {
            return 0.0;
        }
        let start = n.saturating_sub(self.scoring.volume_lookback + 1);
        let Some(avg) = mean(&series.volume[start..n - 1]).filter(|a| *a > 0.0) else {
            return 0.0;
        };
        let ratio = series.volume[n - 1] / avg;
        if !ratio.is_finite() {
            0.0
        } else if ratio > 1.0 {
            ((ratio - 1.0) * self.scoring.volume_high_max_points)
                .min(self.scoring.volume_high_max_points)
        } else {
            -((1.0 - ratio) * 10.0).min(self.scoring.volume_low_max_points)
        }
    }

    /// Long MA, else short MA, else the mean close.
    fn reference_ma(&self, indicators: &IndicatorSet, series: &OhlcvSeries) -> Option<f64> {
        indicators
            .ma_long
            .or(indicators.ma_short)
            .or_else(|| mean(series.closes()))
            .filter(|ma| ma.is_finite() && *ma > 0.0)
    }

    /// Small true range and small net move over the recent bars.
    fn is_consolidating(&self, series: &OhlcvSeries) -> bool {
        let s = &self.scoring;
        let Ok(atr) = atr_pct(&series.high, &series.low, &series.close, s.atr_period) else {
            return false;
        };

        let closes = series.closes();
        let n = closes.len();
        if n <= s.consolidation_slope_bars {
            return false;
        }
        let base = closes[n - 1 - s.consolidation_slope_bars];
        if base <= 0.0 {
            return false;
        }
        let net_move = (closes[n - 1] - base) / base * 100.0;

        atr < s.consolidation_atr_pct && net_move.abs() < s.consolidation_slope_pct
    }

    fn is_extreme_confluence(&self, indicators: &IndicatorSet, price: f64, price_vs_ma: f64) -> bool {
        let s = &self.scoring;
        let far = price_vs_ma.abs() > s.confluence_price_pct;
        let rsi_extreme = indicators
            .rsi
            .map(|r| r > s.confluence_rsi_high || r < s.confluence_rsi_low)
            .unwrap_or(false);
        let momentum = indicators
            .macd
            .as_ref()
            .map(|m| m.histogram.abs() / price * 100.0 > s.confluence_histogram_pct)
            .unwrap_or(false);
        far && rsi_extreme && momentum
    }
}
