//! Integration tests for the indicator cache and background optimizer

use omen::config::{CacheConfig, OptimizerConfig};
use omen::services::{
    BackgroundOptimizer, EntryStore, Fingerprint, IndicatorCache, ManualClock, NoopOptimizer,
    OptimizationOutcome, OptimizerState, ParamOptimizer, StandardIndicators,
};
use omen::{OhlcvSeries, ParamSet, Timeframe};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.4).sin() * 3.0 + i as f64 * 0.05)
        .collect()
}

fn series(n: usize) -> OhlcvSeries {
    OhlcvSeries::from_closes(&closes(n))
}

fn tuned_params() -> ParamSet {
    ParamSet {
        rsi_period: 9,
        macd_fast: 8,
        macd_slow: 21,
        macd_signal: 5,
        ma_short: 10,
        ma_long: 30,
        volatility_level: 0.04,
    }
}

struct FixedOptimizer(ParamSet);

impl ParamOptimizer for FixedOptimizer {
    fn optimize<'a>(
        &'a self,
        _series: &'a OhlcvSeries,
        _symbol: &'a str,
        _timeframe: Timeframe,
    ) -> Pin<Box<dyn Future<Output = omen::Result<Option<ParamSet>>> + Send + 'a>> {
        let params = self.0;
        Box::pin(async move { Ok(Some(params)) })
    }
}

/// Signals when it starts, then waits to be released.
struct GatedOptimizer {
    started: Notify,
    release: Notify,
}

impl GatedOptimizer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Notify::new(),
        })
    }
}

impl ParamOptimizer for GatedOptimizer {
    fn optimize<'a>(
        &'a self,
        _series: &'a OhlcvSeries,
        _symbol: &'a str,
        _timeframe: Timeframe,
    ) -> Pin<Box<dyn Future<Output = omen::Result<Option<ParamSet>>> + Send + 'a>> {
        Box::pin(async move {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Some(tuned_params()))
        })
    }
}

struct SlowOptimizer;

impl ParamOptimizer for SlowOptimizer {
    fn optimize<'a>(
        &'a self,
        _series: &'a OhlcvSeries,
        _symbol: &'a str,
        _timeframe: Timeframe,
    ) -> Pin<Box<dyn Future<Output = omen::Result<Option<ParamSet>>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(tuned_params()))
        })
    }
}

struct Harness {
    store: Arc<EntryStore>,
    clock: Arc<ManualClock>,
    cache: Arc<IndicatorCache>,
    optimizer: Arc<BackgroundOptimizer>,
}

/// Cache and optimizer over one store. `auto` controls whether cache misses
/// schedule optimizations on their own.
fn harness(inner: Arc<dyn ParamOptimizer>, optimizer_config: OptimizerConfig, auto: bool) -> Harness {
    let store = Arc::new(EntryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let optimizer = BackgroundOptimizer::new(
        store.clone(),
        Arc::new(StandardIndicators),
        inner,
        clock.clone(),
        optimizer_config,
    );
    let cache = IndicatorCache::new(
        store.clone(),
        Arc::new(StandardIndicators),
        auto.then(|| optimizer.clone()),
        clock.clone(),
        CacheConfig::default(),
    );
    Harness {
        store,
        clock,
        cache,
        optimizer,
    }
}

#[test]
fn test_cache_hit_returns_same_instance() {
    let h = harness(Arc::new(NoopOptimizer), OptimizerConfig::default(), false);
    let s = series(80);

    let first = h.cache.get_indicators("BTC", Timeframe::OneHour, &s).unwrap();
    let second = h.cache.get_indicators("btc", Timeframe::OneHour, &s).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.cache.len(), 1);
}

#[test]
fn test_appended_bar_forces_recompute() {
    let h = harness(Arc::new(NoopOptimizer), OptimizerConfig::default(), false);
    let mut s = series(80);

    let before = h.cache.get_indicators("btc", Timeframe::OneHour, &s).unwrap();
    s.push(103.0, 104.0, 102.0, 103.5, 1.0);
    let after = h.cache.get_indicators("btc", Timeframe::OneHour, &s).unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    let entry = h.cache.entry("btc", Timeframe::OneHour).unwrap();
    assert_eq!(entry.fingerprint, Fingerprint::of(&s));
}

#[test]
fn test_expired_entry_is_recomputed() {
    let h = harness(Arc::new(NoopOptimizer), OptimizerConfig::default(), false);
    let s = series(80);

    let first = h.cache.get_indicators("eth", Timeframe::OneMinute, &s).unwrap();
    h.clock.advance_ms(CacheConfig::default().ttl_ms(Timeframe::OneMinute));
    let second = h.cache.get_indicators("eth", Timeframe::OneMinute, &s).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[test]
fn test_empty_series_is_none() {
    let h = harness(Arc::new(NoopOptimizer), OptimizerConfig::default(), false);
    assert!(h
        .cache
        .get_indicators("btc", Timeframe::OneHour, &OhlcvSeries::default())
        .is_none());
    assert!(h.cache.is_empty());
}

#[test]
fn test_short_series_keeps_partial_indicators() {
    let h = harness(Arc::new(NoopOptimizer), OptimizerConfig::default(), false);
    let set = h
        .cache
        .get_indicators("btc", Timeframe::OneHour, &series(25))
        .unwrap();
    assert!(set.rsi.is_some());
    assert!(set.ma_short.is_some());
    assert!(set.ma_long.is_none());
}

#[test]
fn test_invalidate_symbol() {
    let h = harness(Arc::new(NoopOptimizer), OptimizerConfig::default(), false);
    let s = series(60);
    h.cache.get_indicators("btc", Timeframe::OneHour, &s);
    h.cache.get_indicators("btc", Timeframe::OneDay, &s);
    h.cache.get_indicators("eth", Timeframe::OneHour, &s);

    h.cache.invalidate("BTC");
    assert_eq!(h.cache.len(), 1);
    assert!(h.cache.entry("eth", Timeframe::OneHour).is_some());

    h.cache.clear();
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_background_optimization_reaches_cache() {
    let h = harness(
        Arc::new(FixedOptimizer(tuned_params())),
        OptimizerConfig::default(),
        true,
    );
    let s = series(80);

    let initial = h.cache.get_indicators("sol", Timeframe::OneHour, &s).unwrap();
    assert_eq!(initial.params, ParamSet::default());

    let mut applied = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if h.cache.entry("sol", Timeframe::OneHour).unwrap().indicators.params == tuned_params() {
            applied = true;
            break;
        }
    }
    assert!(applied, "optimized parameters never reached the cache");

    let served = h.cache.get_indicators("sol", Timeframe::OneHour, &s).unwrap();
    assert_eq!(served.params, tuned_params());
    assert_eq!(served.volatility, 0.04);
}

#[tokio::test]
async fn test_timeout_abandons_attempt() {
    let config = OptimizerConfig {
        timeout_ms: 20,
        ..OptimizerConfig::default()
    };
    let h = harness(Arc::new(SlowOptimizer), config, false);
    let s = series(80);
    let before = h.cache.get_indicators("ada", Timeframe::OneHour, &s).unwrap();

    let outcome = h.optimizer.run("ada", Timeframe::OneHour, &s).await;
    assert_eq!(outcome, OptimizationOutcome::TimedOut);
    assert_eq!(h.optimizer.state("ada", Timeframe::OneHour), OptimizerState::Idle);
    assert!(h.optimizer.in_cooldown("ada", Timeframe::OneHour));

    let after = h.cache.get_indicators("ada", Timeframe::OneHour, &s).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_result_for_replaced_entry_is_discarded() {
    let gate = GatedOptimizer::new();
    let h = harness(gate.clone(), OptimizerConfig::default(), false);
    let mut s = series(80);
    h.cache.get_indicators("dot", Timeframe::OneHour, &s);

    let optimizer = h.optimizer.clone();
    let snapshot = s.clone();
    let task = tokio::spawn(async move {
        optimizer.run("dot", Timeframe::OneHour, &snapshot).await
    });

    gate.started.notified().await;
    s.push(104.0, 105.0, 103.0, 104.5, 1.0);
    let fresh = h.cache.get_indicators("dot", Timeframe::OneHour, &s).unwrap();
    gate.release.notify_one();

    assert_eq!(task.await.unwrap(), OptimizationOutcome::Superseded);
    let entry = h.cache.entry("dot", Timeframe::OneHour).unwrap();
    assert!(Arc::ptr_eq(&entry.indicators, &fresh));
    assert_eq!(entry.indicators.params, ParamSet::default());
}

#[tokio::test]
async fn test_concurrent_run_for_same_key_is_skipped() {
    let gate = GatedOptimizer::new();
    let h = harness(gate.clone(), OptimizerConfig::default(), false);
    let s = series(80);

    let optimizer = h.optimizer.clone();
    let snapshot = s.clone();
    let task = tokio::spawn(async move {
        optimizer.run("xrp", Timeframe::FourHours, &snapshot).await
    });

    gate.started.notified().await;
    assert_eq!(h.optimizer.state("xrp", Timeframe::FourHours), OptimizerState::Running);
    assert_eq!(
        h.optimizer.run("xrp", Timeframe::FourHours, &s).await,
        OptimizationOutcome::SkippedInFlight
    );
    // A different key is unaffected by the in-flight one.
    assert_eq!(h.optimizer.state("xrp", Timeframe::OneHour), OptimizerState::Idle);

    gate.release.notify_one();
    assert!(task.await.unwrap().is_applied());
    assert_eq!(h.optimizer.state("xrp", Timeframe::FourHours), OptimizerState::Idle);
    assert_eq!(
        h.cache.entry("xrp", Timeframe::FourHours).unwrap().indicators.params,
        tuned_params()
    );
}

#[tokio::test]
async fn test_disabled_optimizer_is_not_scheduled() {
    let config = OptimizerConfig {
        enabled: false,
        ..OptimizerConfig::default()
    };
    let h = harness(Arc::new(FixedOptimizer(tuned_params())), config, true);
    let s = series(80);
    h.cache.get_indicators("ltc", Timeframe::OneHour, &s);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.optimizer.last_attempt("ltc", Timeframe::OneHour).is_none());
    assert_eq!(
        h.cache.entry("ltc", Timeframe::OneHour).unwrap().indicators.params,
        ParamSet::default()
    );
}
