//! Main cache store implementation with LRU eviction and reactive cells

use crate::cache::{
    cell::{LoadFuture, ResultCell},
    config::CacheConfig,
    entry::{CacheEntry, EntryMetadata},
    types::{CacheKey, CacheStats},
};
use crate::error::SpreeError;
use crate::rx::{Observer, Subject, Subscription};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Loader future produced by a fallback on a cache miss
pub type Fallback<V> = BoxFuture<'static, anyhow::Result<V>>;

/// Bounded map from key to a broadcasting [`ResultCell`].
///
/// This implementation provides:
/// - Lazy fill on miss: the fallback's future is driven on the ambient tokio
///   runtime and its outcome is applied to the cell it created, unless that
///   cell was replaced or evicted first
/// - Replay-latest subscriptions per key
/// - LRU eviction when `max_entries` is reached; reads and writes count as use
///
/// Cloning a `Cache` yields another handle to the same store. Callbacks given
/// to `read`, `clear` and `subscribe` must not call back into the same cache
/// synchronously; observers may.
///
/// A key's delivery lock is held while its observers run. On a multi-threaded
/// runtime, an observer of one key must not write another key whose
/// observers may in turn write the first: two threads publishing those keys
/// at once would deadlock on each other's delivery locks. Writing the
/// observed key itself is always fine.
pub struct Cache<V> {
    inner: Arc<CacheInner<V>>,
}

struct CacheInner<V> {
    config: CacheConfig,

    /// Never held while observers run
    store: Mutex<CacheStore<V>>,

    /// Source of cell generations, unique across the cache's lifetime
    generations: AtomicU64,
}

/// Internal cache storage
struct CacheStore<V> {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry<V>>,

    /// LRU tracking: front is least recently used
    lru_queue: VecDeque<CacheKey>,

    /// Current cache statistics
    stats: CacheStats,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        info!("Initializing query cache with config: {:?}", config);

        let store = CacheStore {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            stats: CacheStats::default(),
        };

        Self {
            inner: Arc::new(CacheInner {
                config,
                store: Mutex::new(store),
                generations: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the current cell for `key`, creating a pending one from
    /// `fallback` on a miss. Never blocks on the loader.
    pub fn read<F>(&self, key: &str, fallback: F) -> ResultCell<V>
    where
        F: FnOnce() -> Fallback<V>,
    {
        self.ensure(key, fallback).0
    }

    /// Ensure the entry exists (as in [`Cache::read`]) and subscribe to it.
    /// The observer immediately receives the current cell.
    pub fn subscribe<F, O>(&self, key: &str, fallback: F, observer: O) -> Subscription
    where
        F: FnOnce() -> Fallback<V>,
        O: Observer<ResultCell<V>> + 'static,
    {
        let (_, subject) = self.ensure(key, fallback);
        subject.subscribe(observer)
    }

    /// Force the cell for `key`, creating the entry if absent, and broadcast
    /// it. Supersedes any in-flight load for the key. A written `Pending`
    /// cell is stored as-is; nothing settles it.
    pub fn write(&self, key: &str, cell: ResultCell<V>) {
        let generation = self.next_generation();

        let existing = {
            let mut store = self.inner.store.lock();
            self.record(&mut store, |stats| stats.writes += 1);

            let existing = store.entries.get_mut(key).map(|entry| {
                entry.metadata.mark_accessed();
                entry.metadata.generation = generation;
                (entry.subject.clone(), Arc::clone(&entry.generation))
            });

            if existing.is_some() {
                Self::touch(&mut store, key);
            } else {
                self.evict_if_needed(&mut store);
                store
                    .entries
                    .insert(key.to_string(), CacheEntry::new(cell.clone(), generation));
                store.lru_queue.push_back(key.to_string());
                store.stats.entries = store.entries.len();
            }
            existing
        };

        debug!("Cache write ({}): {}", cell.status(), key);

        if let Some((subject, live)) = existing {
            Self::publish(&subject, cell, || {
                live.store(generation, Ordering::Release);
                true
            });
        }
    }

    /// Evict every entry whose key matches. Evicted subjects are dropped
    /// without notifying their observers. Returns the number evicted.
    pub fn clear<P>(&self, predicate: P) -> usize
    where
        P: Fn(&str) -> bool,
    {
        let mut store = self.inner.store.lock();

        let doomed: Vec<CacheKey> = store
            .entries
            .keys()
            .filter(|key| predicate(key.as_str()))
            .cloned()
            .collect();

        for key in &doomed {
            Self::remove_entry(&mut store, key);
        }

        let removed = doomed.len();
        self.record(&mut store, |stats| stats.invalidations += removed as u64);
        store.stats.entries = store.entries.len();

        info!("Cleared {} entries from cache", removed);
        removed
    }

    /// All live keys, most recently used first
    pub fn keys(&self) -> Vec<CacheKey> {
        let store = self.inner.store.lock();
        store.lru_queue.iter().rev().cloned().collect()
    }

    /// Current cell for `key` without loading or counting as use
    pub fn peek(&self, key: &str) -> Option<ResultCell<V>> {
        let store = self.inner.store.lock();
        store.entries.get(key).map(|entry| entry.subject.value())
    }

    /// Check if a key exists in the cache (without updating recency)
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.store.lock().entries.contains_key(key)
    }

    /// Metadata for a live key
    pub fn metadata(&self, key: &str) -> Option<EntryMetadata> {
        let store = self.inner.store.lock();
        store.entries.get(key).map(|entry| {
            let mut metadata = entry.metadata.clone();
            metadata.generation = entry.current_generation();
            metadata
        })
    }

    /// Get number of entries in cache
    pub fn len(&self) -> usize {
        self.inner.store.lock().entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let store = self.inner.store.lock();
        let mut stats = store.stats.clone();
        stats.entries = store.entries.len();
        stats
    }

    fn ensure<F>(&self, key: &str, fallback: F) -> (ResultCell<V>, Subject<ResultCell<V>>)
    where
        F: FnOnce() -> Fallback<V>,
    {
        let mut store = self.inner.store.lock();

        if let Some(entry) = store.entries.get_mut(key) {
            entry.metadata.mark_accessed();
            let subject = entry.subject.clone();
            Self::touch(&mut store, key);
            self.record(&mut store, |stats| stats.hits += 1);

            debug!("Cache hit: {}", key);
            return (subject.value(), subject);
        }

        self.record(&mut store, |stats| stats.misses += 1);
        debug!("Cache miss: {}", key);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot load {} outside of a tokio runtime: {}", key, e);
                let cell = ResultCell::Rejected(SpreeError::Runtime(e.to_string()));
                return (cell.clone(), Subject::new(cell));
            }
        };

        let generation = self.next_generation();
        let cell = ResultCell::Pending(self.spawn_load(&runtime, key, generation, fallback()));

        self.evict_if_needed(&mut store);
        let entry = CacheEntry::new(cell.clone(), generation);
        let subject = entry.subject.clone();
        store.entries.insert(key.to_string(), entry);
        store.lru_queue.push_back(key.to_string());
        store.stats.entries = store.entries.len();

        (cell, subject)
    }

    /// Drive `load` on the runtime and settle the cell of `generation` with
    /// its outcome. The returned future resolves after settlement.
    fn spawn_load(
        &self,
        runtime: &Handle,
        key: &str,
        generation: u64,
        load: Fallback<V>,
    ) -> LoadFuture<V> {
        let cache: Weak<CacheInner<V>> = Arc::downgrade(&self.inner);
        let key = key.to_string();

        let task = runtime.spawn(async move {
            let outcome = match AssertUnwindSafe(load).catch_unwind().await {
                Ok(result) => result.map_err(SpreeError::load),
                Err(_) => Err(SpreeError::Aborted(format!("loader for {} panicked", key))),
            };

            if let Some(inner) = cache.upgrade() {
                Cache { inner }.settle(&key, generation, &outcome);
            }
            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SpreeError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    /// Apply a loader outcome if its cell is still the live one for `key`
    fn settle(&self, key: &str, generation: u64, outcome: &Result<V, SpreeError>) {
        let target = {
            let store = self.inner.store.lock();
            store
                .entries
                .get(key)
                .map(|entry| (entry.subject.clone(), Arc::clone(&entry.generation)))
        };

        let applied = match target {
            Some((subject, live)) => Self::publish(&subject, outcome.clone().into(), || {
                live.load(Ordering::Acquire) == generation
            }),
            None => false,
        };

        {
            let mut store = self.inner.store.lock();
            if applied {
                self.record(&mut store, |stats| stats.settled_loads += 1);
            } else {
                self.record(&mut store, |stats| stats.stale_settlements += 1);
            }
        }

        match (applied, outcome) {
            (true, Ok(_)) => debug!("Load settled: {}", key),
            (true, Err(e)) => warn!("Load failed for {}: {}", key, e),
            (false, _) => debug!("Discarding stale settlement for {}", key),
        }
    }

    /// Broadcast `cell` if `guard` allows it; a rejection is followed by an
    /// error notification to the same observers.
    fn publish(
        subject: &Subject<ResultCell<V>>,
        cell: ResultCell<V>,
        guard: impl FnOnce() -> bool,
    ) -> bool {
        let _delivery = subject.lock_delivery();
        let error = cell.error().cloned();

        let applied = subject.next_if(cell, guard);
        if applied {
            if let Some(error) = error {
                subject.error(error);
            }
        }
        applied
    }

    fn next_generation(&self) -> u64 {
        self.inner.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, store: &mut CacheStore<V>, update: impl FnOnce(&mut CacheStats)) {
        if self.inner.config.enable_metrics {
            update(&mut store.stats);
        }
    }

    /// Internal: Move a key to the most recently used end
    fn touch(store: &mut CacheStore<V>, key: &str) {
        store.lru_queue.retain(|k| k != key);
        store.lru_queue.push_back(key.to_string());
    }

    /// Internal: Remove an entry from the store
    fn remove_entry(store: &mut CacheStore<V>, key: &str) {
        if store.entries.remove(key).is_some() {
            store.lru_queue.retain(|k| k != key);
        }
    }

    /// Internal: Evict least recently used entries to make room for one more
    fn evict_if_needed(&self, store: &mut CacheStore<V>) {
        while store.entries.len() >= self.inner.config.max_entries {
            match store.lru_queue.pop_front() {
                Some(key) => {
                    debug!("Evicting entry due to max_entries limit: {}", key);
                    store.entries.remove(&key);
                    self.record(store, |stats| stats.evictions += 1);
                }
                None => break,
            }
        }
        store.stats.entries = store.entries.len();
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.inner.store.lock();
        f.debug_struct("Cache")
            .field("config", &self.inner.config)
            .field("entries", &store.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn resolved(value: i32) -> ResultCell<i32> {
        ResultCell::Resolved(value)
    }

    fn ready(value: i32) -> impl FnOnce() -> Fallback<i32> {
        move || async move { anyhow::Ok(value) }.boxed()
    }

    fn never_called() -> impl FnOnce() -> Fallback<i32> {
        || -> Fallback<i32> { panic!("fallback must not be invoked") }
    }

    async fn explode() -> anyhow::Result<i32> {
        panic!("loader bug")
    }

    async fn settle(cell: ResultCell<i32>) {
        if let ResultCell::Pending(future) = cell {
            let _ = future.await;
        }
    }

    #[tokio::test]
    async fn test_read_missing_loads_from_fallback() {
        let cache = Cache::new(CacheConfig::default());

        let cell = cache.read("test", ready(27));
        assert!(cell.is_pending());

        settle(cell).await;

        let cell = cache.read("test", never_called());
        assert_eq!(cell.value(), Some(&27));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.settled_loads, 1);
    }

    #[tokio::test]
    async fn test_read_is_idempotent() {
        let cache = Cache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            cache.read("test", move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(32) }.boxed()
            });
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        settle(cache.read("test", never_called())).await;
        assert_eq!(cache.read("test", never_called()).value(), Some(&32));
    }

    #[tokio::test]
    async fn test_pending_reads_share_one_future() {
        let cache = Cache::new(CacheConfig::default());
        let (tx, rx) = oneshot::channel::<i32>();

        let first = cache.read("test", move || {
            async move { rx.await.map_err(anyhow::Error::from) }.boxed()
        });
        let second = cache.read("test", never_called());

        tx.send(5).unwrap();

        match (first, second) {
            (ResultCell::Pending(a), ResultCell::Pending(b)) => {
                assert_eq!(a.await.unwrap(), 5);
                assert_eq!(b.await.unwrap(), 5);
            }
            other => panic!("expected two pending cells, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_without_loading() {
        let cache = Cache::new(CacheConfig::default());

        cache.write("test", resolved(21));

        assert_eq!(cache.read("test", never_called()).value(), Some(&21));
        assert_eq!(cache.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_transition() {
        let cache = Cache::new(CacheConfig::default());
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let cell_for_wait = cache.read("test", ready(32));
        cache.subscribe("test", never_called(), move |cell: &ResultCell<i32>| {
            sink.lock().push(format!("{:?}", cell));
        });

        settle(cell_for_wait).await;
        cache.write("test", resolved(1));

        assert_eq!(
            *seen.lock(),
            vec!["Pending".to_string(), "Resolved(32)".to_string(), "Resolved(1)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_write_supersedes_inflight_load() {
        let cache = Cache::new(CacheConfig::default());
        let (tx, rx) = oneshot::channel::<i32>();

        let pending = cache.read("test", move || {
            async move { rx.await.map_err(anyhow::Error::from) }.boxed()
        });

        cache.write("test", resolved(1));
        tx.send(99).unwrap();
        settle(pending).await;

        assert_eq!(cache.read("test", never_called()).value(), Some(&1));
        assert_eq!(cache.stats().stale_settlements, 1);
        assert_eq!(cache.stats().settled_loads, 0);
    }

    #[tokio::test]
    async fn test_rejected_load_notifies_error() {
        struct Errors(Arc<AtomicUsize>);

        impl Observer<ResultCell<i32>> for Errors {
            fn next(&self, _cell: &ResultCell<i32>) {}

            fn error(&self, _error: &SpreeError) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let cache: Cache<i32> = Cache::new(CacheConfig::default());
        let errors = Arc::new(AtomicUsize::new(0));

        let pending = cache.read("test", || async { Err(anyhow::anyhow!("offline")) }.boxed());
        cache.subscribe("test", never_called(), Errors(errors.clone()));
        settle(pending).await;

        let cell = cache.read("test", never_called());
        assert!(matches!(cell.error(), Some(SpreeError::Load(_))));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_panic_rejects_cell() {
        let cache: Cache<i32> = Cache::new(CacheConfig::default());

        let pending = cache.read("test", || explode().boxed());
        settle(pending).await;

        let cell = cache.read("test", never_called());
        assert!(matches!(cell.error(), Some(SpreeError::Aborted(_))));
    }

    #[tokio::test]
    async fn test_clear_matching_entries() {
        let cache = Cache::new(CacheConfig::default());
        cache.write("a", resolved(1));
        cache.write("absynth", resolved(2));
        cache.write("ballet", resolved(3));

        let removed = cache.clear(|key| key.starts_with('a'));

        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["ballet".to_string()]);
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[tokio::test]
    async fn test_clear_keeps_other_subjects_working() {
        let cache = Cache::new(CacheConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        cache.write("keep", resolved(1));
        cache.write("drop", resolved(2));
        let sink = seen.clone();
        cache.subscribe("keep", never_called(), move |cell: &ResultCell<i32>| {
            sink.lock().push(cell.value().copied());
        });

        cache.clear(|key| key == "drop");
        cache.write("keep", resolved(3));

        assert_eq!(*seen.lock(), vec![Some(1), Some(3)]);
        assert!(!cache.contains_key("drop"));
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let config = CacheConfig::builder().max_entries(2).build();
        let cache = Cache::new(config);

        cache.write("key1", resolved(1));
        cache.write("key2", resolved(2));
        // Use key1 so key2 becomes least recently used
        cache.read("key1", never_called());
        cache.write("key3", resolved(3));

        assert!(cache.contains_key("key1"));
        assert!(!cache.contains_key("key2"));
        assert!(cache.contains_key("key3"));
        assert_eq!(cache.keys(), vec!["key3".to_string(), "key1".to_string()]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_evicted_pending_load_is_discarded() {
        let config = CacheConfig::builder().max_entries(1).build();
        let cache = Cache::new(config);
        let (tx, rx) = oneshot::channel::<i32>();

        let pending = cache.read("slow", move || {
            async move { rx.await.map_err(anyhow::Error::from) }.boxed()
        });
        cache.write("other", resolved(1));
        tx.send(10).unwrap();
        settle(pending).await;

        assert!(!cache.contains_key("slow"));
        assert_eq!(cache.stats().stale_settlements, 1);
    }

    #[tokio::test]
    async fn test_peek_and_metadata() {
        let cache = Cache::new(CacheConfig::default());
        assert!(cache.peek("missing").is_none());

        cache.write("key", resolved(4));
        cache.write("key", resolved(5));

        assert_eq!(cache.peek("key").and_then(|cell| cell.value().copied()), Some(5));
        let metadata = cache.metadata("key").unwrap();
        assert_eq!(metadata.access_count, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let config = CacheConfig::builder().enable_metrics(false).build();
        let cache = Cache::new(config);

        cache.write("key", resolved(1));
        cache.read("key", never_called());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_read_outside_runtime_rejects() {
        let cache: Cache<i32> = Cache::default();

        let cell = cache.read("test", ready(1));

        assert!(matches!(cell.error(), Some(SpreeError::Runtime(_))));
        assert!(cache.is_empty());
    }
}
