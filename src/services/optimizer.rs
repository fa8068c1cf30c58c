//! Background indicator-period optimization.
//!
//! Per key the optimizer is either idle or running, with an independent
//! cooldown after every attempt. A successful run recomputes the indicator set
//! with the new periods and swaps the cache entry, unless the entry changed
//! while the optimizer was working.

use crate::config::OptimizerConfig;
use crate::error::{Result, SignalError};
use crate::services::clock::Clock;
use crate::services::indicator_cache::{cache_key, compute_indicators, EntryStore, Fingerprint};
use crate::services::signals::IndicatorLibrary;
use crate::types::{OhlcvSeries, ParamSet, Timeframe};
use dashmap::{DashMap, DashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Searches for better indicator periods for a series.
///
/// `Ok(None)` means no candidate was found. The caller imposes the timeout.
pub trait ParamOptimizer: Send + Sync {
    fn optimize<'a>(
        &'a self,
        series: &'a OhlcvSeries,
        symbol: &'a str,
        timeframe: Timeframe,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ParamSet>>> + Send + 'a>>;
}

/// Optimizer that never proposes new parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOptimizer;

impl ParamOptimizer for NoopOptimizer {
    fn optimize<'a>(
        &'a self,
        _series: &'a OhlcvSeries,
        _symbol: &'a str,
        _timeframe: Timeframe,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ParamSet>>> + Send + 'a>> {
        Box::pin(async { Ok(None) })
    }
}

/// Result of one `run` call.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationOutcome {
    /// New parameters were applied to the cache entry.
    Applied(ParamSet),
    /// The entry changed while optimizing; the result was discarded.
    Superseded,
    /// The optimizer found no candidate.
    NoCandidate,
    /// The optimizer errored or returned unusable parameters.
    Failed(String),
    /// The optimizer did not finish within the timeout.
    TimedOut,
    /// Another optimization for the key is running.
    SkippedInFlight,
    /// The key was attempted too recently.
    SkippedCooldown,
}

impl OptimizationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, OptimizationOutcome::Applied(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            OptimizationOutcome::SkippedInFlight | OptimizationOutcome::SkippedCooldown
        )
    }
}

/// Per-key optimizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Idle,
    Running,
}

/// Marks a key as running; unmarks on drop, including when a timed-out
/// future is abandoned.
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    key: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a DashSet<String>, key: &str) -> Option<Self> {
        if set.insert(key.to_string()) {
            Some(Self {
                set,
                key: key.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Runs parameter optimizations and applies their results to the cache.
pub struct BackgroundOptimizer {
    store: Arc<EntryStore>,
    library: Arc<dyn IndicatorLibrary>,
    optimizer: Arc<dyn ParamOptimizer>,
    clock: Arc<dyn Clock>,
    config: OptimizerConfig,
    in_progress: DashSet<String>,
    /// Cache key format: "{symbol}:{timeframe}"
    last_attempt: DashMap<String, i64>,
}

impl BackgroundOptimizer {
    pub fn new(
        store: Arc<EntryStore>,
        library: Arc<dyn IndicatorLibrary>,
        optimizer: Arc<dyn ParamOptimizer>,
        clock: Arc<dyn Clock>,
        config: OptimizerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            library,
            optimizer,
            clock,
            config,
            in_progress: DashSet::new(),
            last_attempt: DashMap::new(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn state(&self, symbol: &str, timeframe: Timeframe) -> OptimizerState {
        if self.in_progress.contains(&cache_key(symbol, timeframe)) {
            OptimizerState::Running
        } else {
            OptimizerState::Idle
        }
    }

    /// Timestamp of the last finished attempt for a key.
    pub fn last_attempt(&self, symbol: &str, timeframe: Timeframe) -> Option<i64> {
        self.last_attempt
            .get(&cache_key(symbol, timeframe))
            .map(|entry| *entry.value())
    }

    pub fn in_cooldown(&self, symbol: &str, timeframe: Timeframe) -> bool {
        self.last_attempt(symbol, timeframe)
            .map(|last| self.clock.now_ms() - last < self.config.cooldown_ms)
            .unwrap_or(false)
    }

    /// Optimize one key and apply the result. Never fails; the outcome says
    /// what happened.
    pub async fn run(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        series: &OhlcvSeries,
    ) -> OptimizationOutcome {
        let key = cache_key(symbol, timeframe);

        if self.in_cooldown(symbol, timeframe) {
            debug!(key = %key, "Optimization skipped: cooldown");
            return OptimizationOutcome::SkippedCooldown;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_progress, &key) else {
            debug!(key = %key, "Optimization skipped: already running");
            return OptimizationOutcome::SkippedInFlight;
        };

        if series.is_empty() {
            self.record_attempt(&key);
            return failed(&key, "empty series");
        }

        let expected_generation = self.store.generation(&key);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let result = tokio::time::timeout(
            timeout,
            self.optimizer.optimize(series, symbol, timeframe),
        )
        .await;

        self.record_attempt(&key);

        let params = match result {
            Err(_) => {
                warn!(key = %key, "{}", SignalError::OptimizationTimeout(timeout));
                return OptimizationOutcome::TimedOut;
            }
            Ok(Err(e)) => return failed(&key, e),
            Ok(Ok(None)) => {
                debug!(key = %key, "Optimizer proposed no parameters");
                return OptimizationOutcome::NoCandidate;
            }
            Ok(Ok(Some(params))) if !params.is_valid() => {
                debug!(key = %key, ?params, "Rejected optimizer parameters");
                return failed(&key, "invalid parameter set");
            }
            Ok(Ok(Some(params))) => params,
        };

        let indicators = compute_indicators(self.library.as_ref(), series.closes(), &params);
        if indicators.populated() == 0 {
            debug!(key = %key, ?params, "Rejected optimizer parameters");
            return failed(&key, "no indicators computable with optimized parameters");
        }

        let applied = self.store.replace_if_current(
            &key,
            expected_generation,
            Arc::new(indicators),
            self.clock.now_ms(),
            Fingerprint::of(series),
        );

        if applied {
            info!(key = %key, ?params, "Applied optimized indicator parameters");
            OptimizationOutcome::Applied(params)
        } else {
            debug!(key = %key, "Optimization result superseded by newer entry");
            OptimizationOutcome::Superseded
        }
    }

    fn record_attempt(&self, key: &str) {
        self.last_attempt
            .insert(key.to_string(), self.clock.now_ms());
    }
}

/// Log an optimizer failure and report it as an outcome.
fn failed(key: &str, cause: impl ToString) -> OptimizationOutcome {
    let err = SignalError::OptimizationFailed(cause.to_string());
    warn!(key = %key, "{}", err);
    OptimizationOutcome::Failed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::services::signals::StandardIndicators;
    use crate::types::IndicatorSet;

    struct FixedOptimizer(ParamSet);

    impl ParamOptimizer for FixedOptimizer {
        fn optimize<'a>(
            &'a self,
            _series: &'a OhlcvSeries,
            _symbol: &'a str,
            _timeframe: Timeframe,
        ) -> Pin<Box<dyn Future<Output = Result<Option<ParamSet>>> + Send + 'a>> {
            let params = self.0;
            Box::pin(async move { Ok(Some(params)) })
        }
    }

    fn fast_params() -> ParamSet {
        ParamSet {
            rsi_period: 7,
            macd_fast: 5,
            macd_slow: 13,
            macd_signal: 4,
            ma_short: 5,
            ma_long: 15,
            volatility_level: 0.02,
        }
    }

    fn series() -> OhlcvSeries {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.3).cos() * 2.0).collect();
        OhlcvSeries::from_closes(&closes)
    }

    fn optimizer_with(
        inner: Arc<dyn ParamOptimizer>,
        clock: Arc<ManualClock>,
    ) -> (Arc<EntryStore>, Arc<BackgroundOptimizer>) {
        let store = Arc::new(EntryStore::new());
        let optimizer = BackgroundOptimizer::new(
            store.clone(),
            Arc::new(StandardIndicators),
            inner,
            clock,
            OptimizerConfig::default(),
        );
        (store, optimizer)
    }

    #[tokio::test]
    async fn test_run_applies_params_to_vacant_key() {
        let clock = Arc::new(ManualClock::new(0));
        let (store, optimizer) = optimizer_with(Arc::new(FixedOptimizer(fast_params())), clock);

        let outcome = optimizer.run("sol", Timeframe::OneHour, &series()).await;
        assert_eq!(outcome, OptimizationOutcome::Applied(fast_params()));

        let entry = store.get("sol:1h").unwrap();
        assert_eq!(entry.indicators.params, fast_params());
        assert_eq!(entry.indicators.volatility, 0.02);
        assert_eq!(entry.fingerprint, Fingerprint::of(&series()));
    }

    #[tokio::test]
    async fn test_cooldown_blocks_second_attempt() {
        let clock = Arc::new(ManualClock::new(0));
        let (_store, optimizer) = optimizer_with(Arc::new(NoopOptimizer), clock.clone());

        assert_eq!(
            optimizer.run("sol", Timeframe::OneHour, &series()).await,
            OptimizationOutcome::NoCandidate
        );
        assert_eq!(
            optimizer.run("sol", Timeframe::OneHour, &series()).await,
            OptimizationOutcome::SkippedCooldown
        );

        clock.advance_ms(OptimizerConfig::default().cooldown_ms);
        assert_eq!(
            optimizer.run("sol", Timeframe::OneHour, &series()).await,
            OptimizationOutcome::NoCandidate
        );
    }

    #[tokio::test]
    async fn test_cooldown_is_per_key() {
        let clock = Arc::new(ManualClock::new(0));
        let (_store, optimizer) = optimizer_with(Arc::new(NoopOptimizer), clock);

        optimizer.run("sol", Timeframe::OneHour, &series()).await;
        assert!(optimizer.in_cooldown("sol", Timeframe::OneHour));
        assert!(!optimizer.in_cooldown("sol", Timeframe::OneDay));
        assert_eq!(optimizer.state("sol", Timeframe::OneHour), OptimizerState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_params_are_rejected() {
        let mut bad = fast_params();
        bad.macd_fast = 20;
        let clock = Arc::new(ManualClock::new(0));
        let (store, optimizer) = optimizer_with(Arc::new(FixedOptimizer(bad)), clock);

        let outcome = optimizer.run("sol", Timeframe::OneHour, &series()).await;
        assert_eq!(
            outcome,
            OptimizationOutcome::Failed(
                "Optimization failed: invalid parameter set".to_string()
            )
        );
        assert!(store.is_empty());
    }

    struct ErrOptimizer;

    impl ParamOptimizer for ErrOptimizer {
        fn optimize<'a>(
            &'a self,
            _series: &'a OhlcvSeries,
            _symbol: &'a str,
            _timeframe: Timeframe,
        ) -> Pin<Box<dyn Future<Output = Result<Option<ParamSet>>> + Send + 'a>> {
            Box::pin(async { Err(SignalError::InvalidValue("search diverged".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_optimizer_error_becomes_failed_outcome() {
        let clock = Arc::new(ManualClock::new(0));
        let (store, optimizer) = optimizer_with(Arc::new(ErrOptimizer), clock);

        let outcome = optimizer.run("sol", Timeframe::OneHour, &series()).await;
        assert_eq!(
            outcome,
            OptimizationOutcome::Failed(
                "Optimization failed: Invalid value: search diverged".to_string()
            )
        );
        assert!(optimizer.in_cooldown("sol", Timeframe::OneHour));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_result_is_discarded() {
        let clock = Arc::new(ManualClock::new(0));
        let (store, optimizer) = optimizer_with(Arc::new(FixedOptimizer(fast_params())), clock);

        // An entry appears after the optimizer has captured "vacant".
        let newer = Arc::new(IndicatorSet::empty(ParamSet::default()));
        let fp = Fingerprint { length: 1, last_close: 1.0 };
        let expected = store.generation("sol:1h");
        store.insert("sol:1h".to_string(), newer.clone(), 5, fp);
        assert!(!store.replace_if_current(
            "sol:1h",
            expected,
            Arc::new(IndicatorSet::empty(fast_params())),
            6,
            fp
        ));
        assert!(Arc::ptr_eq(&store.get("sol:1h").unwrap().indicators, &newer));

        // A run that starts after the insert applies normally.
        assert!(optimizer
            .run("sol", Timeframe::OneHour, &series())
            .await
            .is_applied());
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let set = DashSet::new();
        {
            let guard = InFlightGuard::acquire(&set, "k");
            assert!(guard.is_some());
            assert!(InFlightGuard::acquire(&set, "k").is_none());
        }
        assert!(set.is_empty());
        assert!(InFlightGuard::acquire(&set, "k").is_some());
    }
}
