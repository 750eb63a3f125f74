//! LRU record cache in front of an asset store

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::stats::{CacheCounters, CacheStats};
use bytes::Bytes;
use lru::LruCache;
use mulkit_storage::{AssetStore, Result};
use parking_lot::Mutex;

/// Cache key: one record of one asset type.
///
/// Asset types are trimmed and lowercased the way the stores resolve them,
/// so `"ART"` and `"art"` name the same cached record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized asset type
    pub asset_type: String,
    /// Record index
    pub index: usize,
}

impl CacheKey {
    /// Create a key
    pub fn new(asset_type: &str, index: usize) -> Self {
        Self {
            asset_type: asset_type.trim().to_ascii_lowercase(),
            index,
        }
    }
}

struct LruState {
    entries: LruCache<CacheKey, Bytes>,
    bytes: usize,
}

/// An [`AssetStore`] that keeps recently read records in memory.
///
/// Records are evicted least-recently-used first whenever either bound of
/// the [`CacheConfig`] is exceeded. A record larger than `max_bytes` is
/// returned to the caller but evicted in the same call, so such records
/// always go to the wrapped store. Failed reads are never cached.
///
/// The lock guarding the LRU order is not held while the wrapped store is
/// called.
pub struct CachedStore<S> {
    inner: S,
    config: CacheConfig,
    state: Mutex<LruState>,
    counters: CacheCounters,
}

impl<S: AssetStore> CachedStore<S> {
    /// Wrap `inner` with a cache bounded by `config`.
    pub fn new(inner: S, config: CacheConfig) -> std::result::Result<Self, CacheError> {
        config.validate().map_err(CacheError::InvalidConfiguration)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Record cache enabled: max_entries={}, max_bytes={}",
            config.max_entries,
            config.max_bytes
        );

        Ok(Self::build(inner, config))
    }

    /// Wrap `inner` with the default bounds (1024 records, 256 MiB).
    pub fn with_defaults(inner: S) -> Self {
        Self::build(inner, CacheConfig::default())
    }

    fn build(inner: S, config: CacheConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(LruState {
                entries: LruCache::unbounded(),
                bytes: 0,
            }),
            counters: CacheCounters::default(),
        }
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the store, dropping every cached record
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Cache bounds
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether no record is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes currently cached
    pub fn total_bytes(&self) -> usize {
        self.state.lock().bytes
    }

    /// Whether a record is cached, without touching its recency
    pub fn contains(&self, asset_type: &str, index: usize) -> bool {
        self.state
            .lock()
            .entries
            .contains(&CacheKey::new(asset_type, index))
    }

    /// Remove one record from the cache. Returns whether it was cached.
    pub fn invalidate(&self, asset_type: &str, index: usize) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.pop(&CacheKey::new(asset_type, index));
        if let Some(bytes) = &removed {
            state.bytes -= bytes.len();
            self.counters.record_invalidations(1);
        }
        removed.is_some()
    }

    /// Remove every record from the cache.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let count = state.entries.len() as u64;
        state.entries.clear();
        state.bytes = 0;
        self.counters.record_invalidations(count);
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        self.counters.snapshot(state.entries.len(), state.bytes)
    }

    fn insert(&self, key: CacheKey, value: Bytes) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.bytes += value.len();
        if let Some((_, replaced)) = state.entries.push(key, value) {
            state.bytes -= replaced.len();
        }
        self.counters.record_insert();

        let mut evicted = 0u64;
        while state.entries.len() > self.config.max_entries || state.bytes > self.config.max_bytes {
            #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
            let Some((key, bytes)) = state.entries.pop_lru() else {
                break;
            };
            state.bytes -= bytes.len();
            evicted += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Evicted {}[{}] ({} bytes)",
                key.asset_type,
                key.index,
                bytes.len()
            );
        }
        if evicted > 0 {
            self.counters.record_evictions(evicted);
        }
    }
}

impl<S: AssetStore> AssetStore for CachedStore<S> {
    fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes> {
        let key = CacheKey::new(asset_type, index);

        let cached = self.state.lock().entries.get(&key).cloned();
        if let Some(bytes) = cached {
            self.counters.record_hit();
            #[cfg(feature = "tracing")]
            tracing::trace!("Cache hit for {}[{}]", asset_type, index);
            return Ok(bytes);
        }

        self.counters.record_miss();
        let bytes = self.inner.get_entry(asset_type, index)?;
        self.insert(key, bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use mulkit_storage::StorageError;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store counting how often each record is fetched.
    #[derive(Default)]
    struct CountingStore {
        records: HashMap<(String, usize), Bytes>,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn with(mut self, asset_type: &str, index: usize, size: usize) -> Self {
            let fill = (index % 256) as u8;
            self.records
                .insert((asset_type.to_string(), index), Bytes::from(vec![fill; size]));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AssetStore for CountingStore {
        fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.records
                .get(&(asset_type.to_string(), index))
                .cloned()
                .ok_or(StorageError::Invalid { index })
        }
    }

    #[test]
    fn test_lru_order_evicts_least_recent() {
        let store = CountingStore::default()
            .with("art", 0, 1)
            .with("art", 1, 1)
            .with("art", 2, 1);
        let cache = CachedStore::new(store, CacheConfig::new(2, 1024)).expect("valid config");

        cache.get_entry("art", 0).expect("A");
        cache.get_entry("art", 1).expect("B");
        cache.get_entry("art", 0).expect("A again");
        cache.get_entry("art", 2).expect("C");

        assert!(cache.contains("art", 0));
        assert!(!cache.contains("art", 1));
        assert!(cache.contains("art", 2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.inner().calls(), 3);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_byte_bound_evicts_until_satisfied() {
        let store = CountingStore::default()
            .with("gumps", 0, 40)
            .with("gumps", 1, 40)
            .with("gumps", 2, 50);
        let cache = CachedStore::new(store, CacheConfig::new(10, 100)).expect("valid config");

        cache.get_entry("gumps", 0).expect("first");
        cache.get_entry("gumps", 1).expect("second");
        assert_eq!(cache.total_bytes(), 80);

        cache.get_entry("gumps", 2).expect("third");
        assert_eq!(cache.total_bytes(), 90);
        assert!(!cache.contains("gumps", 0));
        assert!(cache.contains("gumps", 1));
    }

    #[test]
    fn test_oversized_record_passes_through() {
        let store = CountingStore::default().with("art", 0, 10).with("art", 1, 500);
        let cache = CachedStore::new(store, CacheConfig::new(10, 100)).expect("valid config");

        cache.get_entry("art", 0).expect("small");
        let big = cache.get_entry("art", 1).expect("oversized");
        assert_eq!(big.len(), 500);
        assert!(big.iter().all(|&b| b == 1));

        assert!(!cache.contains("art", 1));
        assert!(cache.total_bytes() <= 100);

        cache.get_entry("art", 1).expect("oversized again");
        assert_eq!(cache.inner().calls(), 3);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = CachedStore::new(CountingStore::default(), CacheConfig::default())
            .expect("valid config");

        for _ in 0..3 {
            assert!(matches!(
                cache.get_entry("art", 9),
                Err(StorageError::Invalid { index: 9 })
            ));
        }
        assert_eq!(cache.inner().calls(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_hit_returns_identical_bytes() {
        let store = CountingStore::default().with("hues", 5, 16);
        let cache = CachedStore::with_defaults(store);

        let first = cache.get_entry("hues", 5).expect("miss");
        let second = cache.get_entry("hues", 5).expect("hit");
        assert_eq!(first, second);
        assert_eq!(first.as_ptr(), second.as_ptr());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.inserts), (1, 1, 1));
        assert_eq!(cache.inner().calls(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let store = CountingStore::default().with("art", 0, 4).with("art", 1, 6);
        let cache = CachedStore::with_defaults(store);
        cache.get_entry("art", 0).expect("A");
        cache.get_entry("art", 1).expect("B");

        assert!(cache.invalidate("art", 0));
        assert!(!cache.invalidate("art", 0));
        assert_eq!(cache.total_bytes(), 6);

        cache.get_entry("art", 0).expect("refetched");
        assert_eq!(cache.inner().calls(), 3);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
        assert_eq!(cache.stats().invalidations, 3);
    }

    #[test]
    fn test_asset_type_case_is_ignored() {
        let store = CountingStore::default().with("art", 0, 4);
        let cache = CachedStore::with_defaults(store);

        cache.get_entry("art", 0).expect("miss");
        cache.get_entry("ART", 0).expect("hit under another case");
        assert!(cache.contains(" Art ", 0));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.inner().calls(), 1);

        assert!(cache.invalidate("ART", 0));
        assert!(!cache.contains("art", 0));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_bounds_rejected() {
        assert!(matches!(
            CachedStore::new(CountingStore::default(), CacheConfig::new(0, 1)),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(CachedStore::new(CountingStore::default(), CacheConfig::new(1, 0)).is_err());
    }

    #[test]
    fn test_concurrent_readers_respect_bounds() {
        let mut store = CountingStore::default();
        for index in 0..64 {
            store = store.with("art", index, 8 + index);
        }
        let cache = Arc::new(CachedStore::new(store, CacheConfig::new(16, 400)).expect("config"));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let index = (round * 7 + t * 13) % 64;
                        let bytes = cache.get_entry("art", index).expect("read");
                        assert_eq!(bytes.len(), 8 + index);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        assert!(cache.len() <= 16);
        assert!(cache.total_bytes() <= 400);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 800);
    }
}
