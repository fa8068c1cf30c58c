use crate::error::{Result, SignalError};
use crate::types::Timeframe;
use std::env;
use std::str::FromStr;

/// Indicator cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry TTL for 1-minute bars (ms).
    pub ttl_one_minute_ms: i64,
    /// Entry TTL for 5-minute bars (ms).
    pub ttl_five_minutes_ms: i64,
    /// Entry TTL for 15-minute bars (ms).
    pub ttl_fifteen_minutes_ms: i64,
    /// Entry TTL for 30-minute bars (ms).
    pub ttl_thirty_minutes_ms: i64,
    /// Entry TTL for hourly bars (ms).
    pub ttl_one_hour_ms: i64,
    /// Entry TTL for 4-hour bars (ms).
    pub ttl_four_hours_ms: i64,
    /// Entry TTL for daily bars (ms).
    pub ttl_one_day_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_one_minute_ms: 30_000,
            ttl_five_minutes_ms: 60_000,
            ttl_fifteen_minutes_ms: 120_000,
            ttl_thirty_minutes_ms: 300_000,
            ttl_one_hour_ms: 600_000,
            ttl_four_hours_ms: 1_800_000,
            ttl_one_day_ms: 7_200_000,
        }
    }
}

impl CacheConfig {
    /// TTL in milliseconds for a timeframe.
    pub fn ttl_ms(&self, timeframe: Timeframe) -> i64 {
        match timeframe {
            Timeframe::OneMinute => self.ttl_one_minute_ms,
            Timeframe::FiveMinutes => self.ttl_five_minutes_ms,
            Timeframe::FifteenMinutes => self.ttl_fifteen_minutes_ms,
            Timeframe::ThirtyMinutes => self.ttl_thirty_minutes_ms,
            Timeframe::OneHour => self.ttl_one_hour_ms,
            Timeframe::FourHours => self.ttl_four_hours_ms,
            Timeframe::OneDay => self.ttl_one_day_ms,
        }
    }
}

/// Background optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Whether cache misses schedule background optimizations.
    pub enabled: bool,
    /// Minimum time between two attempts for the same key (ms).
    pub cooldown_ms: i64,
    /// Upper bound on a single optimizer call (ms).
    pub timeout_ms: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 30_000,
            timeout_ms: 10_000,
        }
    }
}

/// Pattern detector thresholds.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    /// Trailing window length (and minimum series length).
    pub min_window: usize,
    /// Breakout volume must exceed average volume times this.
    pub volume_threshold: f64,
    /// Minimum R² for a regression line to count as a trendline.
    pub min_r_squared: f64,
    /// Return volatility below this selects the tight tolerance.
    pub low_volatility: f64,
    /// Return volatility above this selects the wide tolerance.
    pub high_volatility: f64,
    pub tight_tolerance: f64,
    pub default_tolerance: f64,
    pub wide_tolerance: f64,
    /// Minimum bar distance between two touches of a double top/bottom.
    pub min_touch_separation: usize,
    /// Minimum pole move for a flag (percent).
    pub flag_pole_min_pct: f64,
    /// Maximum consolidation move for a flag (percent).
    pub flag_consolidation_max_pct: f64,
    /// Bars inspected for head-and-shoulders.
    pub head_shoulders_bars: usize,
    /// Doji when |open - close| <= close * this.
    pub doji_body_pct: f64,
    /// Long shadow must be at least body times this.
    pub long_shadow_ratio: f64,
    /// Opposite shadow must be under body times this.
    pub short_shadow_ratio: f64,
    /// Bars used to judge the trend preceding a candlestick.
    pub prior_trend_bars: usize,
    /// Bars checked for OHLC consistency at each end of the window.
    pub consistency_sample: usize,
    pub doji_base_confidence: u8,
    pub engulfing_base_confidence: u8,
    pub hammer_base_confidence: u8,
    pub body_ratio_adjustment: u8,
    pub reversal_bonus: u8,
    pub min_candle_confidence: u8,
    pub max_candle_confidence: u8,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_window: 20,
            volume_threshold: 1.5,
            min_r_squared: 0.3,
            low_volatility: 0.01,
            high_volatility: 0.03,
            tight_tolerance: 0.005,
            default_tolerance: 0.01,
            wide_tolerance: 0.02,
            min_touch_separation: 3,
            flag_pole_min_pct: 5.0,
            flag_consolidation_max_pct: 2.0,
            head_shoulders_bars: 7,
            doji_body_pct: 0.001,
            long_shadow_ratio: 2.0,
            short_shadow_ratio: 0.5,
            prior_trend_bars: 5,
            consistency_sample: 3,
            doji_base_confidence: 70,
            engulfing_base_confidence: 80,
            hammer_base_confidence: 75,
            body_ratio_adjustment: 5,
            reversal_bonus: 10,
            min_candle_confidence: 50,
            max_candle_confidence: 95,
        }
    }
}

/// Trend consensus and strength weights and caps.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Price within ±band of the long MA casts no vote.
    pub price_ma_band: f64,
    /// Vote margin needed for a non-neutral trend.
    pub vote_margin: i32,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_moderate_high: f64,
    pub rsi_moderate_low: f64,
    pub rsi_max_points: f64,
    pub rsi_moderate_points: f64,
    pub macd_max_points: f64,
    /// MACD-minus-signal as a fraction of price is multiplied by this before clamping to ±1.
    pub macd_scale: f64,
    pub ma_spread_max_points: f64,
    /// Relative MA spread that earns the full MA contribution.
    pub ma_spread_full: f64,
    pub volume_lookback: usize,
    pub volume_high_max_points: f64,
    pub volume_low_max_points: f64,
    /// Price within this percent of the long MA is "near".
    pub near_ma_pct: f64,
    pub near_ma_cap: f64,
    pub far_ma_floor: f64,
    pub atr_period: usize,
    /// Consolidation when ATR% is below this...
    pub consolidation_atr_pct: f64,
    pub consolidation_slope_bars: usize,
    /// ...and the net move over the slope bars is below this percent.
    pub consolidation_slope_pct: f64,
    pub consolidation_cap: f64,
    pub highest_timeframe_ceiling: f64,
    pub confluence_ceiling: f64,
    pub confluence_price_pct: f64,
    pub confluence_rsi_high: f64,
    pub confluence_rsi_low: f64,
    /// |MACD histogram| as percent of price needed for confluence.
    pub confluence_histogram_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            price_ma_band: 0.002,
            vote_margin: 2,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_moderate_high: 60.0,
            rsi_moderate_low: 40.0,
            rsi_max_points: 20.0,
            rsi_moderate_points: 10.0,
            macd_max_points: 15.0,
            macd_scale: 1000.0,
            ma_spread_max_points: 25.0,
            ma_spread_full: 0.05,
            volume_lookback: 20,
            volume_high_max_points: 8.0,
            volume_low_max_points: 5.0,
            near_ma_pct: 1.5,
            near_ma_cap: 55.0,
            far_ma_floor: 60.0,
            atr_period: 14,
            consolidation_atr_pct: 1.0,
            consolidation_slope_bars: 10,
            consolidation_slope_pct: 2.0,
            consolidation_cap: 70.0,
            highest_timeframe_ceiling: 80.0,
            confluence_ceiling: 95.0,
            confluence_price_pct: 5.0,
            confluence_rsi_high: 75.0,
            confluence_rsi_low: 25.0,
            confluence_histogram_pct: 0.2,
        }
    }
}

/// Cross-asset correlation adjustment.
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Return bars used for the Pearson coefficient.
    pub lookback: usize,
    /// Reference strength below this disables the adjustment.
    pub strength_floor: u8,
    pub strong_threshold: u8,
    pub moderate_threshold: u8,
    pub aligned_strong_bonus: i32,
    pub aligned_moderate_bonus: i32,
    pub aligned_weak_bonus: i32,
    pub against_strong_penalty: i32,
    pub against_moderate_penalty: i32,
    /// Bonus kept when opposing a weak reference.
    pub against_weak_bonus: i32,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            strength_floor: 30,
            strong_threshold: 70,
            moderate_threshold: 50,
            aligned_strong_bonus: 25,
            aligned_moderate_bonus: 15,
            aligned_weak_bonus: 8,
            against_strong_penalty: 15,
            against_moderate_penalty: 8,
            against_weak_bonus: 3,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub optimizer: OptimizerConfig,
    pub patterns: PatternConfig,
    pub scoring: ScoringConfig,
    pub correlation: CorrelationConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache: CacheConfig {
                ttl_one_minute_ms: env_or("OMEN_TTL_1M_MS", defaults.cache.ttl_one_minute_ms),
                ttl_five_minutes_ms: env_or("OMEN_TTL_5M_MS", defaults.cache.ttl_five_minutes_ms),
                ttl_fifteen_minutes_ms: env_or(
                    "OMEN_TTL_15M_MS",
                    defaults.cache.ttl_fifteen_minutes_ms,
                ),
                ttl_thirty_minutes_ms: env_or(
                    "OMEN_TTL_30M_MS",
                    defaults.cache.ttl_thirty_minutes_ms,
                ),
                ttl_one_hour_ms: env_or("OMEN_TTL_1H_MS", defaults.cache.ttl_one_hour_ms),
                ttl_four_hours_ms: env_or("OMEN_TTL_4H_MS", defaults.cache.ttl_four_hours_ms),
                ttl_one_day_ms: env_or("OMEN_TTL_1D_MS", defaults.cache.ttl_one_day_ms),
            },
            optimizer: OptimizerConfig {
                enabled: env::var("OMEN_OPTIMIZER_ENABLED")
                    .map(|v| v != "false" && v != "0")
                    .unwrap_or(defaults.optimizer.enabled),
                cooldown_ms: env_or("OMEN_OPTIMIZER_COOLDOWN_MS", defaults.optimizer.cooldown_ms),
                timeout_ms: env_or("OMEN_OPTIMIZER_TIMEOUT_MS", defaults.optimizer.timeout_ms),
            },
            patterns: PatternConfig {
                min_window: env_or("OMEN_PATTERN_WINDOW", defaults.patterns.min_window),
                volume_threshold: env_or(
                    "OMEN_BREAKOUT_VOLUME_THRESHOLD",
                    defaults.patterns.volume_threshold,
                ),
                min_r_squared: env_or("OMEN_MIN_R_SQUARED", defaults.patterns.min_r_squared),
                ..defaults.patterns
            },
            scoring: defaults.scoring,
            correlation: CorrelationConfig {
                lookback: env_or("OMEN_CORRELATION_LOOKBACK", defaults.correlation.lookback),
                strength_floor: env_or(
                    "OMEN_REFERENCE_STRENGTH_FLOOR",
                    defaults.correlation.strength_floor,
                ),
                ..defaults.correlation
            },
        }
    }

    /// Reject settings the detectors and scorers cannot work with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.patterns;
        if p.min_window < p.head_shoulders_bars.max(4) {
            return Err(SignalError::InvalidConfig(format!(
                "pattern window {} is shorter than {} bars",
                p.min_window,
                p.head_shoulders_bars.max(4)
            )));
        }
        if !(p.tight_tolerance <= p.default_tolerance && p.default_tolerance <= p.wide_tolerance) {
            return Err(SignalError::InvalidConfig(
                "tolerance bands must satisfy tight <= default <= wide".to_string(),
            ));
        }
        if p.low_volatility > p.high_volatility {
            return Err(SignalError::InvalidConfig(
                "low volatility threshold exceeds high threshold".to_string(),
            ));
        }
        if p.min_candle_confidence > p.max_candle_confidence {
            return Err(SignalError::InvalidConfig(
                "candlestick confidence floor exceeds ceiling".to_string(),
            ));
        }
        if self.optimizer.timeout_ms == 0 {
            return Err(SignalError::InvalidConfig(
                "optimizer timeout must be positive".to_string(),
            ));
        }
        if self.correlation.lookback < 2 {
            return Err(SignalError::InvalidConfig(
                "correlation lookback must cover at least 2 returns".to_string(),
            ));
        }
        let c = &self.correlation;
        if c.moderate_threshold > c.strong_threshold {
            return Err(SignalError::InvalidConfig(
                "moderate reference threshold exceeds strong threshold".to_string(),
            ));
        }
        Ok(())
    }
}
