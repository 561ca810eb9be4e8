//! QueryCache - keyed async results with single-flight fetching.
//!
//! This module provides [`QueryCache`], which stores the result of an async
//! fetch per [`QueryKey`] and tracks each entry's status and staleness.
//!
//! # Architecture
//!
//! Each entry is a pure state machine (from stow-core). The cache feeds it
//! events and interprets the effects it returns: spawning fetches, waking
//! observers, logging discarded results.
//!
//! ```text
//! Consumer → QueryCache → Fetcher → data source
//!                ↓
//!           stow-core (pure entry state machine)
//! ```
//!
//! Entries are never evicted; the map grows for the lifetime of the cache.
//!
//! # Example
//!
//! ```ignore
//! use stow_client::{CacheConfig, MockFetcher, QueryCache};
//!
//! let cache: QueryCache<Vec<String>> = QueryCache::new(CacheConfig::default());
//! let fetcher = MockFetcher::new();
//! fetcher.queue_ok(vec!["lab".into(), "poodle".into()]);
//!
//! let key = QueryKey::scope("breeds").with("dog");
//! let result = cache.fetch(&key, &fetcher).await;
//! assert!(result.is_success());
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use stow_core::{EntryEffect, EntryEvent, EntryState, Generation, StaleTime};
use stow_types::{QueryKey, QueryStatus};
use tokio::sync::{watch, Mutex};

use crate::fetcher::{FetchError, Fetcher};

/// Configuration for QueryCache.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// How long resolved data stays fresh (default: never stale).
    pub stale_time: StaleTime,
}

impl CacheConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staleness policy.
    pub fn with_stale_time(mut self, stale_time: StaleTime) -> Self {
        self.stale_time = stale_time;
        self
    }
}

/// Snapshot of one cache entry as seen by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// The key this result belongs to.
    pub key: QueryKey,
    /// Entry status.
    pub status: QueryStatus,
    /// Resolved data (only on success).
    pub data: Option<T>,
    /// Captured failure (only on error).
    pub error: Option<FetchError>,
}

impl<T> QueryResult<T> {
    fn pending(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Pending,
            data: None,
            error: None,
        }
    }

    fn from_entry(key: &QueryKey, entry: &EntryState<T, FetchError>) -> Option<Self>
    where
        T: Clone,
    {
        let status = entry.status()?;
        Some(Self {
            key: key.clone(),
            status,
            data: entry.data().cloned(),
            error: entry.error().cloned(),
        })
    }

    /// Check if a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// Check if data is available.
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Check if the fetch failed.
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

impl<T: Default> QueryResult<T> {
    /// Result for a key with a blank parameter: successful and empty.
    pub fn empty(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Success,
            data: Some(T::default()),
            error: None,
        }
    }

    /// The data, or `T::default()` while loading or failed.
    pub fn data_or_default(self) -> T {
        self.data.unwrap_or_default()
    }
}

struct CacheInner<T> {
    config: CacheConfig,
    entries: Mutex<HashMap<QueryKey, EntryState<T, FetchError>>>,
    /// Bumped on every observable entry change.
    version: watch::Sender<u64>,
}

/// Keyed cache of async query results.
///
/// Cheap to clone; clones share the same entries.
pub struct QueryCache<T> {
    inner: Arc<CacheInner<T>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> QueryCache<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(CacheInner {
                config,
                entries: Mutex::new(HashMap::new()),
                version,
            }),
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Read the entry for `key`, starting a fetch if it is missing or stale.
    ///
    /// Returns immediately with the current snapshot. Concurrent calls for
    /// a key that is already in flight join that fetch instead of starting
    /// another. Keys with a blank parameter resolve to an empty result
    /// without calling the fetcher or creating an entry.
    pub async fn query<F>(&self, key: &QueryKey, fetcher: &F) -> QueryResult<T>
    where
        F: Fetcher<T> + Clone + 'static,
    {
        if key.is_incomplete() {
            tracing::debug!(%key, "blank query parameter, skipping fetch");
            return QueryResult::empty(key.clone());
        }

        let (snapshot, effects) = {
            let mut entries = self.inner.entries.lock().await;
            let entry = entries.entry(key.clone()).or_default();
            let (next, effects) = std::mem::take(entry).on_event(EntryEvent::Requested {
                now: Instant::now(),
            });
            *entry = next;
            let snapshot = QueryResult::from_entry(key, entry)
                .unwrap_or_else(|| QueryResult::pending(key.clone()));
            (snapshot, effects)
        };

        for generation in self.apply_effects(key, effects) {
            self.spawn_fetch(key.clone(), generation, fetcher.clone());
        }
        snapshot
    }

    /// Query `key` and wait until its entry settles.
    pub async fn fetch<F>(&self, key: &QueryKey, fetcher: &F) -> QueryResult<T>
    where
        F: Fetcher<T> + Clone + 'static,
    {
        // Subscribe first so a settle between query and wait is not missed.
        let mut changes = self.inner.version.subscribe();
        let mut result = self.query(key, fetcher).await;

        while result.is_loading() {
            if changes.changed().await.is_err() {
                break;
            }
            match self.peek(key).await {
                Some(latest) => result = latest,
                None => break,
            }
        }

        result
    }

    /// Read the entry for `key` without side effects.
    ///
    /// Returns `None` if the key was never queried.
    pub async fn peek(&self, key: &QueryKey) -> Option<QueryResult<T>> {
        let entries = self.inner.entries.lock().await;
        entries
            .get(key)
            .and_then(|entry| QueryResult::from_entry(key, entry))
    }

    /// Mark the entry for `key` stale.
    ///
    /// Nothing is fetched until the next `query`. A fetch still in flight is
    /// replaced by that next query and its result discarded.
    pub async fn invalidate(&self, key: &QueryKey) -> bool {
        self.invalidate_where(|k| k == key).await > 0
    }

    /// Mark every entry whose key starts with `prefix` stale.
    ///
    /// Returns the number of entries invalidated.
    pub async fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        self.invalidate_where(|k| k.starts_with(prefix)).await
    }

    async fn invalidate_where(&self, pred: impl Fn(&QueryKey) -> bool) -> usize {
        let mut notify = false;
        let mut count = 0;
        {
            let mut entries = self.inner.entries.lock().await;
            for (key, entry) in entries.iter_mut().filter(|(k, _)| pred(k)) {
                let (next, effects) = std::mem::take(entry).on_event(EntryEvent::Invalidated);
                *entry = next;
                count += 1;
                notify |= effects
                    .iter()
                    .any(|e| matches!(e, EntryEffect::Notify { .. }));
                tracing::debug!(%key, "invalidated");
            }
        }
        if notify {
            self.bump_version();
        }
        count
    }

    /// Subscribe to entry changes.
    ///
    /// The value is a change counter; re-read entries when it changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Number of entries (never shrinks).
    pub async fn len(&self) -> usize {
        self.inner.entries.lock().await.len()
    }

    /// Check if no key was ever queried.
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.lock().await.is_empty()
    }

    /// Run the side effects of a transition; returns the fetches to start.
    fn apply_effects(&self, key: &QueryKey, effects: Vec<EntryEffect>) -> Vec<Generation> {
        let mut fetches = Vec::new();
        for effect in effects {
            match effect {
                EntryEffect::Fetch { generation } => fetches.push(generation),
                EntryEffect::Join { generation } => {
                    tracing::debug!(%key, %generation, "joined in-flight fetch");
                }
                EntryEffect::Hit => {
                    tracing::debug!(%key, "cache hit");
                }
                EntryEffect::Notify { status } => {
                    tracing::debug!(%key, %status, "entry changed");
                    self.bump_version();
                }
                EntryEffect::Discard {
                    generation,
                    current,
                } => {
                    tracing::warn!(
                        %key,
                        %generation,
                        current = ?current,
                        "discarding superseded fetch result"
                    );
                }
            }
        }
        fetches
    }

    fn spawn_fetch<F>(&self, key: QueryKey, generation: Generation, fetcher: F)
    where
        F: Fetcher<T> + 'static,
    {
        tracing::debug!(%key, %generation, "starting fetch");
        let cache = self.clone();
        tokio::spawn(async move {
            let fetch_key = key.clone();
            let fetch = tokio::spawn(async move { fetcher.fetch(&fetch_key).await });
            // A panicking fetcher must still settle the entry.
            let result = match fetch.await {
                Ok(result) => result,
                Err(e) => Err(FetchError::Request(format!("fetch task failed: {}", e))),
            };
            cache.settle(&key, generation, result).await;
        });
    }

    async fn settle(&self, key: &QueryKey, generation: Generation, result: Result<T, FetchError>) {
        let event = match result {
            Ok(data) => {
                tracing::info!(%key, %generation, "fetch resolved");
                EntryEvent::Resolved {
                    generation,
                    data,
                    stale_at: self.inner.config.stale_time.deadline(Instant::now()),
                }
            }
            Err(error) => {
                tracing::warn!(%key, %generation, %error, "fetch failed");
                EntryEvent::Failed { generation, error }
            }
        };

        let effects = {
            let mut entries = self.inner.entries.lock().await;
            match entries.get_mut(key) {
                Some(entry) => {
                    let (next, effects) = std::mem::take(entry).on_event(event);
                    *entry = next;
                    effects
                }
                None => vec![EntryEffect::Discard {
                    generation,
                    current: None,
                }],
            }
        };

        // Settling never starts a fetch.
        self.apply_effects(key, effects);
    }

    fn bump_version(&self) {
        self.inner.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MockFetcher;
    use std::time::Duration;
    use stow_types::KeyPart;

    type Breeds = Vec<String>;

    fn breeds_key(animal: Option<&str>) -> QueryKey {
        QueryKey::scope("breeds").with(animal)
    }

    fn breeds(names: &[&str]) -> Breeds {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn cache() -> QueryCache<Breeds> {
        QueryCache::new(CacheConfig::default())
    }

    /// Yield until the mock has seen `n` calls.
    async fn wait_for_calls(fetcher: &MockFetcher<Breeds>, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while fetcher.call_count() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetcher was not called in time");
    }

    /// Yield enough times for spawned settle tasks to finish.
    async fn settle_spawned() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    // ===========================================
    // Configuration Tests
    // ===========================================

    #[test]
    fn default_config_never_goes_stale() {
        assert_eq!(CacheConfig::default().stale_time, StaleTime::Never);
    }

    #[test]
    fn config_builder_pattern() {
        let config = CacheConfig::new().with_stale_time(StaleTime::After(Duration::from_secs(60)));
        assert_eq!(
            config.stale_time,
            StaleTime::After(Duration::from_secs(60))
        );
    }

    // ===========================================
    // Query Tests
    // ===========================================

    #[tokio::test]
    async fn first_query_is_pending() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        let _deferred = fetcher.defer();

        let result = cache.query(&breeds_key(Some("dog")), &fetcher).await;

        assert!(result.is_loading());
        assert!(result.data.is_none());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn fetch_resolves_and_caches() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(breeds(&["lab", "poodle"]));
        let key = breeds_key(Some("dog"));

        let result = cache.fetch(&key, &fetcher).await;
        assert_eq!(result.status, QueryStatus::Success);
        assert_eq!(result.data, Some(breeds(&["lab", "poodle"])));

        // Served from cache, fetcher not called again.
        let again = cache.query(&key, &fetcher).await;
        assert_eq!(again.data, Some(breeds(&["lab", "poodle"])));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_queries_fetch_once() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        let deferred = fetcher.defer();
        let key = breeds_key(Some("dog"));

        let first = cache.query(&key, &fetcher).await;
        let second = cache.query(&key, &fetcher).await;
        assert!(first.is_loading());
        assert!(second.is_loading());

        wait_for_calls(&fetcher, 1).await;
        assert!(deferred.resolve(breeds(&["lab"])));

        let (a, b) = tokio::join!(cache.fetch(&key, &fetcher), cache.fetch(&key, &fetcher));
        assert_eq!(a.data, Some(breeds(&["lab"])));
        assert_eq!(b.data, Some(breeds(&["lab"])));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_fetches_share_one_call() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.set_fallback(Ok(breeds(&["lab"])));
        let key = breeds_key(Some("dog"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let fetcher = fetcher.clone();
                let key = key.clone();
                tokio::spawn(async move { cache.fetch(&key, &fetcher).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_success());
        }
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn failure_is_captured_as_error_status() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_err(FetchError::Status(503));
        let key = breeds_key(Some("dog"));

        let result = cache.fetch(&key, &fetcher).await;
        assert!(result.is_error());
        assert_eq!(result.error, Some(FetchError::Status(503)));
        assert!(result.data.is_none());

        // No automatic retry.
        let again = cache.query(&key, &fetcher).await;
        assert!(again.is_error());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn blank_parameter_short_circuits() {
        let cache = cache();
        let fetcher = MockFetcher::new();

        let result = cache.query(&breeds_key(None), &fetcher).await;
        assert!(result.is_success());
        assert_eq!(result.data, Some(Breeds::new()));

        let result = cache.fetch(&breeds_key(Some("")), &fetcher).await;
        assert_eq!(result.data_or_default(), Breeds::new());

        settle_spawned().await;
        assert_eq!(fetcher.call_count(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn distinct_keys_are_cached_separately() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(breeds(&["lab"]));
        fetcher.queue_ok(breeds(&["siamese"]));

        let dog = cache.fetch(&breeds_key(Some("dog")), &fetcher).await;
        let cat = cache.fetch(&breeds_key(Some("cat")), &fetcher).await;

        assert_eq!(dog.data, Some(breeds(&["lab"])));
        assert_eq!(cat.data, Some(breeds(&["siamese"])));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn equal_map_keys_share_an_entry() {
        let cache: QueryCache<Vec<u32>> = QueryCache::new(CacheConfig::default());
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(vec![1, 2]);

        let a = QueryKey::scope("search").with(KeyPart::map([("animal", "dog"), ("location", "WA")]));
        let b = QueryKey::scope("search").with(KeyPart::map([("location", "WA"), ("animal", "dog")]));

        cache.fetch(&a, &fetcher).await;
        let result = cache.query(&b, &fetcher).await;

        assert_eq!(result.data, Some(vec![1, 2]));
        assert_eq!(fetcher.call_count(), 1);
    }

    // ===========================================
    // Staleness & Invalidation Tests
    // ===========================================

    #[tokio::test]
    async fn zero_stale_time_refetches_every_query() {
        let cache: QueryCache<Breeds> =
            QueryCache::new(CacheConfig::new().with_stale_time(StaleTime::After(Duration::ZERO)));
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(breeds(&["lab"]));
        fetcher.queue_ok(breeds(&["lab", "pug"]));
        let key = breeds_key(Some("dog"));

        cache.fetch(&key, &fetcher).await;
        let result = cache.fetch(&key, &fetcher).await;

        assert_eq!(result.data, Some(breeds(&["lab", "pug"])));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch_on_next_query() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(breeds(&["lab"]));
        fetcher.queue_ok(breeds(&["lab", "pug"]));
        let key = breeds_key(Some("dog"));

        cache.fetch(&key, &fetcher).await;
        assert!(cache.invalidate(&key).await);
        assert_eq!(fetcher.call_count(), 1);

        let result = cache.fetch(&key, &fetcher).await;
        assert_eq!(result.data, Some(breeds(&["lab", "pug"])));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_unknown_key_returns_false() {
        assert!(!cache().invalidate(&breeds_key(Some("dog"))).await);
    }

    #[tokio::test]
    async fn invalidate_prefix_covers_whole_scope() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.set_fallback(Ok(breeds(&["x"])));

        cache.fetch(&breeds_key(Some("dog")), &fetcher).await;
        cache.fetch(&breeds_key(Some("cat")), &fetcher).await;
        cache.fetch(&QueryKey::scope("details").with(1u32), &fetcher).await;

        let count = cache.invalidate_prefix(&QueryKey::scope("breeds")).await;
        assert_eq!(count, 2);

        cache.fetch(&breeds_key(Some("dog")), &fetcher).await;
        cache.fetch(&QueryKey::scope("details").with(1u32), &fetcher).await;
        assert_eq!(fetcher.call_count(), 4);
    }

    #[tokio::test]
    async fn panicking_fetcher_settles_as_error() {
        let cache = cache();
        let fetcher = crate::fetcher::fetcher_fn(|_key: QueryKey| async move {
            if true {
                panic!("fetcher blew up");
            }
            Ok::<Breeds, FetchError>(Breeds::new())
        });

        let result = cache.fetch(&breeds_key(Some("dog")), &fetcher).await;
        assert!(result.is_error());
        assert!(matches!(result.error, Some(FetchError::Request(_))));
    }

    #[tokio::test]
    async fn invalidate_recovers_from_error() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_err(FetchError::Request("offline".into()));
        fetcher.queue_ok(breeds(&["lab"]));
        let key = breeds_key(Some("dog"));

        assert!(cache.fetch(&key, &fetcher).await.is_error());
        cache.invalidate(&key).await;
        assert!(cache.fetch(&key, &fetcher).await.is_success());
    }

    // ===========================================
    // Supersession Tests
    // ===========================================

    #[tokio::test]
    async fn superseded_fetch_does_not_overwrite_newer_result() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        let first = fetcher.defer();
        let second = fetcher.defer();
        let key = breeds_key(Some("dog"));

        cache.query(&key, &fetcher).await;
        wait_for_calls(&fetcher, 1).await;

        cache.invalidate(&key).await;
        cache.query(&key, &fetcher).await;
        wait_for_calls(&fetcher, 2).await;

        assert!(second.resolve(breeds(&["new"])));
        let result = cache.fetch(&key, &fetcher).await;
        assert_eq!(result.data, Some(breeds(&["new"])));

        // The first fetch lands late and must be dropped.
        assert!(first.resolve(breeds(&["old"])));
        settle_spawned().await;

        let result = cache.peek(&key).await.unwrap();
        assert_eq!(result.data, Some(breeds(&["new"])));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn superseded_failure_does_not_clobber_pending_fetch() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        let first = fetcher.defer();
        let second = fetcher.defer();
        let key = breeds_key(Some("dog"));

        cache.query(&key, &fetcher).await;
        wait_for_calls(&fetcher, 1).await;
        cache.invalidate(&key).await;
        cache.query(&key, &fetcher).await;
        wait_for_calls(&fetcher, 2).await;

        assert!(first.fail(FetchError::Status(500)));
        settle_spawned().await;
        assert!(cache.peek(&key).await.unwrap().is_loading());

        assert!(second.resolve(breeds(&["ok"])));
        assert!(cache.fetch(&key, &fetcher).await.is_success());
    }

    // ===========================================
    // Subscription Tests
    // ===========================================

    #[tokio::test]
    async fn subscribers_see_changes() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(breeds(&["lab"]));
        let mut changes = cache.subscribe();

        cache.fetch(&breeds_key(Some("dog")), &fetcher).await;

        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();
        assert!(!changes.has_changed().unwrap());
    }

    // ===========================================
    // End-to-end
    // ===========================================

    #[tokio::test]
    async fn breed_list_scenario() {
        let cache = cache();
        let fetcher = MockFetcher::new();
        fetcher.queue_ok(breeds(&["lab", "poodle"]));

        let result = cache.fetch(&breeds_key(Some("dog")), &fetcher).await;
        assert_eq!(result.status, QueryStatus::Success);
        assert_eq!(result.data, Some(breeds(&["lab", "poodle"])));

        let cached = cache.query(&breeds_key(Some("dog")), &fetcher).await;
        assert_eq!(cached.data, Some(breeds(&["lab", "poodle"])));
        assert_eq!(fetcher.call_count(), 1);

        let none = cache.query(&breeds_key(None), &fetcher).await;
        assert_eq!(none.data_or_default(), Breeds::new());
        assert_eq!(fetcher.call_count(), 1);
    }
}
