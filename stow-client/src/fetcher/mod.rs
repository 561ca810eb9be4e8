//! Fetcher abstraction for stow.
//!
//! This module provides the pluggable collaborator that the query cache
//! calls to produce data for a key (an HTTP client, a database, a mock for
//! testing).
//!
//! # Design
//!
//! The fetcher trait is async and stateless from the cache's point of view:
//! - `fetch()` receives the full [`QueryKey`] and returns data or a
//!   [`FetchError`]
//! - URL construction and response parsing belong to the implementation
//! - the cache calls `fetch()` at most once per entry generation
//!
//! # Example
//!
//! ```ignore
//! let fetcher = fetcher_fn(|key: QueryKey| async move {
//!     let animal = key.part(1).and_then(KeyPart::as_text).unwrap_or_default();
//!     Ok(vec![format!("{} breed", animal)])
//! });
//! let result = cache.fetch(&QueryKey::scope("breeds").with("dog"), &fetcher).await;
//! ```

mod mock;

pub use mock::{DeferredResponse, MockFetcher};

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use stow_types::QueryKey;
use thiserror::Error;

/// Fetch errors.
///
/// Stored inside failed cache entries and handed to every observer, so it
/// is `Clone` and carries plain data only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be sent or completed.
    #[error("request failed: {0}")]
    Request(String),

    /// The remote answered with a non-success status.
    #[error("unexpected status: {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The key does not identify anything the fetcher can produce.
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
}

/// Fetcher trait for producing the data behind a query key.
///
/// Implementations handle the underlying retrieval mechanism
/// (HTTP, database, mock, etc).
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    /// Produce the data for `key`.
    async fn fetch(&self, key: &QueryKey) -> Result<T, FetchError>;
}

#[async_trait]
impl<T, F> Fetcher<T> for Arc<F>
where
    T: Send + 'static,
    F: Fetcher<T> + ?Sized,
{
    async fn fetch(&self, key: &QueryKey) -> Result<T, FetchError> {
        (**self).fetch(key).await
    }
}

/// Adapter turning an async closure into a [`Fetcher`].
#[derive(Clone)]
pub struct FnFetcher<F>(F);

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher(f)
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn(QueryKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    async fn fetch(&self, key: &QueryKey) -> Result<T, FetchError> {
        (self.0)(key.clone()).await
    }
}
