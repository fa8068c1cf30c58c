//! Indicator cache keyed by (symbol, timeframe).
//!
//! A hit requires a live entry (younger than the timeframe TTL) whose
//! fingerprint matches the series being asked about. Entries are stored as
//! `Arc`s and swapped whole, so a reader sees either the old or the new
//! indicator set, never a mix. Every store carries a generation number which
//! the background optimizer uses to avoid overwriting a newer entry.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::services::clock::Clock;
use crate::services::optimizer::BackgroundOptimizer;
use crate::services::signals::IndicatorLibrary;
use crate::types::{IndicatorSet, MacdValue, OhlcvSeries, ParamSet, Timeframe};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache key format: "{symbol}:{timeframe}"
pub fn cache_key(symbol: &str, timeframe: Timeframe) -> String {
    format!("{}:{}", symbol.to_lowercase(), timeframe.as_str())
}

/// Cheap coherency check standing in for a full series comparison.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprint {
    pub length: usize,
    pub last_close: f64,
}

impl Fingerprint {
    pub fn of(series: &OhlcvSeries) -> Self {
        Self {
            length: series.len(),
            last_close: series.last_close().unwrap_or(f64::NAN),
        }
    }
}

// Bitwise comparison: the same candle must produce the same fingerprint, NaN included.
impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.last_close.to_bits() == other.last_close.to_bits()
    }
}

impl Eq for Fingerprint {}

/// One cached computation.
#[derive(Debug)]
pub struct CacheEntry {
    pub indicators: Arc<IndicatorSet>,
    pub computed_at: i64,
    pub fingerprint: Fingerprint,
    pub generation: u64,
}

/// Shared map of cache entries.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<String, Arc<CacheEntry>>,
    next_generation: AtomicU64,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn generation(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.generation)
    }

    fn make_entry(
        &self,
        indicators: Arc<IndicatorSet>,
        computed_at: i64,
        fingerprint: Fingerprint,
    ) -> Arc<CacheEntry> {
        Arc::new(CacheEntry {
            indicators,
            computed_at,
            fingerprint,
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    /// Unconditionally store a fresh computation.
    pub fn insert(
        &self,
        key: String,
        indicators: Arc<IndicatorSet>,
        computed_at: i64,
        fingerprint: Fingerprint,
    ) -> Arc<CacheEntry> {
        let entry = self.make_entry(indicators, computed_at, fingerprint);
        self.entries.insert(key, entry.clone());
        entry
    }

    /// Store only if the entry still has the `expected` generation
    /// (`None` = the key must still be vacant). Returns whether it was stored.
    pub fn replace_if_current(
        &self,
        key: &str,
        expected: Option<u64>,
        indicators: Arc<IndicatorSet>,
        computed_at: i64,
        fingerprint: Fingerprint,
    ) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if Some(occupied.get().generation) != expected {
                    return false;
                }
                let entry = self.make_entry(indicators, computed_at, fingerprint);
                occupied.insert(entry);
                true
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return false;
                }
                let entry = self.make_entry(indicators, computed_at, fingerprint);
                vacant.insert(entry);
                true
            }
        }
    }

    /// Remove all entries for a symbol (every timeframe).
    pub fn invalidate(&self, symbol: &str) {
        let prefix = format!("{}:", symbol.to_lowercase());
        self.entries.retain(|k, _| !k.starts_with(&prefix));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn soft<T>(name: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_insufficient_data() => {
            debug!(indicator = name, "Skipping indicator: {}", e);
            None
        }
        Err(e) => {
            warn!(indicator = name, "Indicator computation failed: {}", e);
            None
        }
    }
}

fn finite(name: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if !v.is_finite() => {
            warn!(indicator = name, "Discarding non-finite indicator value {}", v);
            None
        }
        other => other,
    }
}

fn finite_macd(value: Option<MacdValue>) -> Option<MacdValue> {
    value.filter(|m| {
        let ok = m.macd.is_finite() && m.signal.is_finite() && m.histogram.is_finite();
        if !ok {
            warn!(indicator = "macd", "Discarding non-finite MACD value");
        }
        ok
    })
}

/// Compute every indicator independently with the given periods.
///
/// A failing indicator becomes `None`; the others are still computed.
/// Volatility is carried through from the parameter set.
pub fn compute_indicators(
    library: &dyn IndicatorLibrary,
    closes: &[f64],
    params: &ParamSet,
) -> IndicatorSet {
    let rsi = finite("rsi", soft("rsi", library.rsi(closes, params.rsi_period)));
    let macd = finite_macd(soft(
        "macd",
        library.macd(closes, params.macd_fast, params.macd_slow, params.macd_signal),
    ));
    let ma_short = finite("ma_short", soft("ma_short", library.sma(closes, params.ma_short)));
    let ma_long = finite("ma_long", soft("ma_long", library.sma(closes, params.ma_long)));
    let ma_long_prev = closes.split_last().and_then(|(_, previous)| {
        finite(
            "ma_long_prev",
            soft("ma_long_prev", library.sma(previous, params.ma_long)),
        )
    });

    IndicatorSet {
        rsi,
        macd,
        ma_short,
        ma_long,
        ma_long_prev,
        volatility: params.volatility_level,
        params: *params,
    }
}

/// Get-or-compute cache for indicator sets.
pub struct IndicatorCache {
    store: Arc<EntryStore>,
    library: Arc<dyn IndicatorLibrary>,
    optimizer: Option<Arc<BackgroundOptimizer>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl IndicatorCache {
    /// Create a cache over a shared entry store.
    ///
    /// Pass the optimizer built over the same store so its results land here.
    pub fn new(
        store: Arc<EntryStore>,
        library: Arc<dyn IndicatorLibrary>,
        optimizer: Option<Arc<BackgroundOptimizer>>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            library,
            optimizer,
            clock,
            config,
        })
    }

    /// Indicators for a series, from cache when still coherent.
    ///
    /// Returns `None` only when the series has no closes. On every fresh
    /// computation a background optimization is scheduled for the key.
    pub fn get_indicators(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        series: &OhlcvSeries,
    ) -> Option<Arc<IndicatorSet>> {
        if series.is_empty() {
            debug!("No closes for {} at {} - cannot compute indicators", symbol, timeframe);
            return None;
        }

        let key = cache_key(symbol, timeframe);
        let fingerprint = Fingerprint::of(series);
        let now = self.clock.now_ms();

        let previous = self.store.get(&key);
        if let Some(cached) = &previous {
            let fresh = now - cached.computed_at < self.config.ttl_ms(timeframe);
            if fresh && cached.fingerprint == fingerprint {
                return Some(cached.indicators.clone());
            }
            if fresh {
                debug!(
                    key = %key,
                    cached_len = cached.fingerprint.length,
                    len = fingerprint.length,
                    "Fingerprint mismatch within TTL, recomputing"
                );
            }
        }

        let params = previous
            .as_ref()
            .map(|entry| entry.indicators.params)
            .unwrap_or_default();

        debug!(
            "Computing indicators for {} at {} with {} closes",
            symbol,
            timeframe,
            series.len()
        );

        let indicators = Arc::new(compute_indicators(
            self.library.as_ref(),
            series.closes(),
            &params,
        ));
        self.store
            .insert(key, indicators.clone(), now, fingerprint);

        self.schedule_optimization(symbol, timeframe, series);

        Some(indicators)
    }

    /// Fire-and-forget optimization; no-op outside a Tokio runtime.
    fn schedule_optimization(&self, symbol: &str, timeframe: Timeframe, series: &OhlcvSeries) {
        let Some(optimizer) = self.optimizer.clone() else {
            return;
        };
        if !optimizer.is_enabled() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let symbol = symbol.to_string();
                let series = series.clone();
                handle.spawn(async move {
                    let outcome = optimizer.run(&symbol, timeframe, &series).await;
                    debug!("Background optimization for {} at {}: {:?}", symbol, timeframe, outcome);
                });
            }
            Err(_) => {
                debug!(
                    "No async runtime, skipping background optimization for {} at {}",
                    symbol, timeframe
                );
            }
        }
    }

    /// Current entry for a key, regardless of age.
    pub fn entry(&self, symbol: &str, timeframe: Timeframe) -> Option<Arc<CacheEntry>> {
        self.store.get(&cache_key(symbol, timeframe))
    }

    pub fn optimizer(&self) -> Option<&Arc<BackgroundOptimizer>> {
        self.optimizer.as_ref()
    }

    /// Invalidate cache for a symbol (all timeframes).
    pub fn invalidate(&self, symbol: &str) {
        self.store.invalidate(symbol);
    }

    /// Invalidate all cached indicators.
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::services::signals::StandardIndicators;

    fn closes(count: usize) -> Vec<f64> {
        (0..count).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.2).collect()
    }

    fn cache_with_clock(clock: Arc<ManualClock>) -> Arc<IndicatorCache> {
        IndicatorCache::new(
            Arc::new(EntryStore::new()),
            Arc::new(StandardIndicators),
            None,
            clock,
            CacheConfig::default(),
        )
    }

    #[test]
    fn test_cache_key_lowercases_symbol() {
        assert_eq!(cache_key("BTC", Timeframe::OneHour), "btc:1h");
    }

    #[test]
    fn test_fingerprint_equality_is_bitwise() {
        let a = Fingerprint { length: 3, last_close: f64::NAN };
        let b = Fingerprint { length: 3, last_close: f64::NAN };
        assert_eq!(a, b);
        let c = Fingerprint { length: 3, last_close: 0.0 };
        let d = Fingerprint { length: 3, last_close: -0.0 };
        assert_ne!(c, d);
    }

    #[test]
    fn test_compute_indicators_partial_on_short_series() {
        let set = compute_indicators(&StandardIndicators, &closes(25), &ParamSet::default());
        assert!(set.rsi.is_some());
        assert!(set.ma_short.is_some());
        assert!(set.ma_long.is_none());
        assert!(set.macd.is_none());
        assert!(set.ma_long_prev.is_none());
    }

    #[test]
    fn test_compute_indicators_full_series() {
        let set = compute_indicators(&StandardIndicators, &closes(80), &ParamSet::default());
        assert_eq!(set.populated(), 4);
        assert!(set.ma_long_prev.is_some());
    }

    #[test]
    fn test_empty_series_returns_none() {
        let cache = cache_with_clock(Arc::new(ManualClock::new(0)));
        assert!(cache
            .get_indicators("btc", Timeframe::OneHour, &OhlcvSeries::default())
            .is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_returns_same_arc() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache_with_clock(clock.clone());
        let series = OhlcvSeries::from_closes(&closes(60));

        let first = cache.get_indicators("eth", Timeframe::OneHour, &series).unwrap();
        clock.advance_ms(1_000);
        let second = cache.get_indicators("eth", Timeframe::OneHour, &series).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_expired_entry_is_recomputed() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with_clock(clock.clone());
        let series = OhlcvSeries::from_closes(&closes(60));

        let first = cache.get_indicators("eth", Timeframe::OneMinute, &series).unwrap();
        clock.advance_ms(CacheConfig::default().ttl_one_minute_ms);
        let second = cache.get_indicators("eth", Timeframe::OneMinute, &series).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_invalidate_only_touches_symbol() {
        let cache = cache_with_clock(Arc::new(ManualClock::new(0)));
        let series = OhlcvSeries::from_closes(&closes(30));
        cache.get_indicators("btc", Timeframe::OneHour, &series);
        cache.get_indicators("btc", Timeframe::OneDay, &series);
        cache.get_indicators("btcup", Timeframe::OneDay, &series);
        cache.invalidate("BTC");
        assert_eq!(cache.len(), 1);
        assert!(cache.entry("btcup", Timeframe::OneDay).is_some());
    }

    #[test]
    fn test_replace_if_current_rejects_stale_generation() {
        let store = EntryStore::new();
        let set = Arc::new(IndicatorSet::empty(ParamSet::default()));
        let fp = Fingerprint { length: 1, last_close: 1.0 };
        let first = store.insert("k".to_string(), set.clone(), 0, fp);
        store.insert("k".to_string(), set.clone(), 1, fp);

        assert!(!store.replace_if_current("k", Some(first.generation), set.clone(), 2, fp));
        let current = store.generation("k");
        assert!(store.replace_if_current("k", current, set.clone(), 3, fp));
        assert_eq!(store.get("k").unwrap().computed_at, 3);
    }

    #[test]
    fn test_replace_if_current_on_vacant_key() {
        let store = EntryStore::new();
        let set = Arc::new(IndicatorSet::empty(ParamSet::default()));
        let fp = Fingerprint { length: 1, last_close: 1.0 };
        assert!(!store.replace_if_current("k", Some(1), set.clone(), 0, fp));
        assert!(store.replace_if_current("k", None, set, 0, fp));
        assert_eq!(store.len(), 1);
    }
}
