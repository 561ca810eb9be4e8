//! QueryObserver - one consumer's view of the cache.
//!
//! An observer tracks a single current key. Consumers call [`set_key`] with
//! whatever their parameters are now; a fresh entry is served as a hit and
//! only a new or stale key starts a fetch. Reads always resolve against the
//! current key, so a late result for an earlier key is never shown here.
//!
//! [`set_key`]: QueryObserver::set_key

use stow_core::{KeyChange, KeyTracker};
use stow_types::QueryKey;

use crate::cache::{QueryCache, QueryResult};
use crate::fetcher::Fetcher;

/// Observes one key at a time on a [`QueryCache`].
pub struct QueryObserver<T, F> {
    cache: QueryCache<T>,
    fetcher: F,
    tracker: KeyTracker,
}

impl<T, F> QueryObserver<T, F>
where
    T: Clone + Default + Send + Sync + 'static,
    F: Fetcher<T> + Clone + 'static,
{
    /// Create an observer with no key yet.
    pub fn new(cache: QueryCache<T>, fetcher: F) -> Self {
        Self {
            cache,
            fetcher,
            tracker: KeyTracker::new(),
        }
    }

    /// The key currently observed.
    pub fn current_key(&self) -> Option<&QueryKey> {
        self.tracker.current()
    }

    /// Point the observer at `key` and return its result.
    pub async fn set_key(&mut self, key: QueryKey) -> QueryResult<T> {
        match self.tracker.observe(&key) {
            KeyChange::Changed { previous } => {
                tracing::debug!(%key, previous = ?previous, "observer key changed");
                self.cache.query(&key, &self.fetcher).await
            }
            // Same key: a fresh entry is a hit, a stale one is refetched.
            KeyChange::Unchanged => self.cache.query(&key, &self.fetcher).await,
        }
    }

    /// Re-run the query for the current key.
    ///
    /// Starts a fetch only if the entry is stale. Returns `None` before the
    /// first `set_key`.
    pub async fn refresh(&self) -> Option<QueryResult<T>> {
        let key = self.tracker.current()?;
        Some(self.cache.query(key, &self.fetcher).await)
    }

    /// Result for the current key without side effects.
    pub async fn result(&self) -> Option<QueryResult<T>> {
        let key = self.tracker.current()?;
        if key.is_incomplete() {
            return Some(QueryResult::empty(key.clone()));
        }
        self.cache.peek(key).await
    }

    /// Wait until the current key's entry settles.
    pub async fn wait(&self) -> Option<QueryResult<T>> {
        let key = self.tracker.current()?;
        Some(self.cache.fetch(key, &self.fetcher).await)
    }
}
