//! Mock fetcher for testing.
//!
//! Allows queueing responses (ready or deferred) and capturing the keys
//! that were fetched.

use super::{FetchError, Fetcher};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stow_types::QueryKey;
use tokio::sync::oneshot;

/// Mock fetcher for testing.
///
/// Responses are handed out in queue order, one per `fetch()` call. When the
/// queue is empty the fallback response is used, if set; otherwise the call
/// fails with [`FetchError::Request`].
pub struct MockFetcher<T> {
    inner: Arc<Mutex<MockFetcherInner<T>>>,
}

struct MockFetcherInner<T> {
    calls: Vec<QueryKey>,
    responses: VecDeque<MockResponse<T>>,
    fallback: Option<Result<T, FetchError>>,
}

enum MockResponse<T> {
    Ready(Result<T, FetchError>),
    Deferred(oneshot::Receiver<Result<T, FetchError>>),
}

/// Handle for completing a deferred mock response.
pub struct DeferredResponse<T> {
    tx: oneshot::Sender<Result<T, FetchError>>,
}

impl<T> DeferredResponse<T> {
    /// Complete the fetch with data. Returns false if the fetch was dropped.
    pub fn resolve(self, data: T) -> bool {
        self.tx.send(Ok(data)).is_ok()
    }

    /// Complete the fetch with an error. Returns false if the fetch was dropped.
    pub fn fail(self, error: FetchError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

impl<T> MockFetcher<T> {
    /// Create a new mock fetcher with an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockFetcherInner {
                calls: Vec::new(),
                responses: VecDeque::new(),
                fallback: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockFetcherInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue data to be returned by a future `fetch()` call.
    pub fn queue_ok(&self, data: T) {
        self.lock().responses.push_back(MockResponse::Ready(Ok(data)));
    }

    /// Queue an error to be returned by a future `fetch()` call.
    pub fn queue_err(&self, error: FetchError) {
        self.lock().responses.push_back(MockResponse::Ready(Err(error)));
    }

    /// Queue a response that stays in flight until completed by hand.
    pub fn defer(&self) -> DeferredResponse<T> {
        let (tx, rx) = oneshot::channel();
        self.lock().responses.push_back(MockResponse::Deferred(rx));
        DeferredResponse { tx }
    }

    /// Response used once the queue is empty.
    pub fn set_fallback(&self, response: Result<T, FetchError>) {
        self.lock().fallback = Some(response);
    }

    /// Get every key that was fetched, in call order.
    pub fn calls(&self) -> Vec<QueryKey> {
        self.lock().calls.clone()
    }

    /// Number of `fetch()` calls so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

impl<T> Default for MockFetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MockFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<T> Fetcher<T> for MockFetcher<T>
where
    T: Clone + Send + 'static,
{
    async fn fetch(&self, key: &QueryKey) -> Result<T, FetchError> {
        // Guard must be released before awaiting a deferred response.
        let response = {
            let mut inner = self.lock();
            inner.calls.push(key.clone());
            match inner.responses.pop_front() {
                Some(response) => response,
                None => match &inner.fallback {
                    Some(fallback) => MockResponse::Ready(fallback.clone()),
                    None => MockResponse::Ready(Err(FetchError::Request(format!(
                        "no mock response queued for {}",
                        key
                    )))),
                },
            }
        };

        match response {
            MockResponse::Ready(result) => result,
            MockResponse::Deferred(rx) => rx.await.unwrap_or_else(|_| {
                Err(FetchError::Request("deferred response dropped".into()))
            }),
        }
    }
}
