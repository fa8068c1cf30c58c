//! End-to-end signal analysis for one (symbol, timeframe) series.

use crate::config::Config;
use crate::services::clock::{Clock, SystemClock};
use crate::services::indicator_cache::{EntryStore, IndicatorCache};
use crate::services::optimizer::{BackgroundOptimizer, ParamOptimizer};
use crate::services::patterns::PatternDetector;
use crate::services::signals::{IndicatorLibrary, StandardIndicators};
use crate::services::trend::TrendConsensusScorer;
use crate::types::{
    CorrelationResult, IndicatorSet, OhlcvSeries, PatternResult, Timeframe, TrendScore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Reference asset the analysed symbol is compared against.
#[derive(Debug, Clone, Copy)]
pub struct Reference<'a> {
    pub symbol: &'a str,
    pub series: &'a OhlcvSeries,
}

/// Combined output of the indicator, trend, pattern and correlation stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub price: f64,
    pub indicators: IndicatorSet,
    pub trend: TrendScore,
    pub patterns: PatternResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationResult>,
    /// Trend strength after the correlation bonus and penalty, in [0, 100].
    pub adjusted_strength: u8,
    pub generated_at: i64,
}

pub struct SignalAnalyzer {
    cache: Arc<IndicatorCache>,
    detector: PatternDetector,
    scorer: TrendConsensusScorer,
    clock: Arc<dyn Clock>,
}

impl SignalAnalyzer {
    pub fn new(
        cache: Arc<IndicatorCache>,
        detector: PatternDetector,
        scorer: TrendConsensusScorer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            detector,
            scorer,
            clock,
        }
    }

    /// Wire the standard components from configuration.
    pub fn from_config(config: &Config, optimizer: Arc<dyn ParamOptimizer>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let library: Arc<dyn IndicatorLibrary> = Arc::new(StandardIndicators);
        let store = Arc::new(EntryStore::new());

        let background = config.optimizer.enabled.then(|| {
            BackgroundOptimizer::new(
                store.clone(),
                library.clone(),
                optimizer,
                clock.clone(),
                config.optimizer.clone(),
            )
        });

        let cache = IndicatorCache::new(
            store,
            library,
            background,
            clock.clone(),
            config.cache.clone(),
        );

        info!(
            "Signal analyzer ready (optimizer {})",
            if config.optimizer.enabled { "enabled" } else { "disabled" }
        );

        Self::new(
            cache,
            PatternDetector::new(config.patterns.clone()),
            TrendConsensusScorer::new(config.scoring.clone(), config.correlation.clone()),
            clock,
        )
    }

    pub fn cache(&self) -> &Arc<IndicatorCache> {
        &self.cache
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn scorer(&self) -> &TrendConsensusScorer {
        &self.scorer
    }

    /// Analyse the latest bar of `series`.
    ///
    /// `None` only when the series is empty. A reference whose own
    /// indicators cannot be computed leaves `correlation` unset.
    pub fn analyze(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        series: &OhlcvSeries,
        reference: Option<Reference<'_>>,
    ) -> Option<SignalReport> {
        let price = series.last_close()?;
        let indicators = self.cache.get_indicators(symbol, timeframe, series)?;
        let trend = self.scorer.score_trend(&indicators, series, timeframe);
        let patterns = self.detector.detect(series);

        let correlation = reference.and_then(|reference| {
            let reference_indicators =
                self.cache
                    .get_indicators(reference.symbol, timeframe, reference.series)?;
            let reference_score =
                self.scorer
                    .score_trend(&reference_indicators, reference.series, timeframe);
            Some(self.scorer.adjust_for_correlation(
                trend.trend,
                reference_score.trend,
                reference_score.strength,
                series,
                reference.series,
            ))
        });

        let net = correlation.map(|c| c.net()).unwrap_or(0);
        let adjusted_strength = (trend.strength as i32 + net).clamp(0, 100) as u8;

        debug!(
            "{} {}: {} {} -> {} ({} patterns)",
            symbol,
            timeframe,
            trend.trend,
            trend.strength,
            adjusted_strength,
            patterns.patterns().len()
        );

        Some(SignalReport {
            symbol: symbol.to_string(),
            timeframe,
            price,
            indicators: (*indicators).clone(),
            trend,
            patterns,
            correlation,
            adjusted_strength,
            generated_at: self.clock.now_ms(),
        })
    }
}
