//! # stow-client
//!
//! Async runtime layer for stow: local state, cached remote queries and
//! shared context, built on the pure logic in stow-core.
//!
//! ## Features
//!
//! - **Store**: ordered item list behind a reducer, observable via `watch`
//! - **Query Cache**: keyed async results with single-flight fetching
//! - **Query Observer**: per-consumer key tracking over the cache
//! - **Shared Slot**: named last-write-wins cell passed down by handle
//! - **Fetcher Abstraction**: pluggable data source (HTTP, mock)
//!
//! ## Example
//!
//! ```ignore
//! use stow_client::{CacheConfig, QueryCache, Store};
//!
//! let store = Store::new();
//! store.add(Item::new(ItemId::from_clock(), "walk the dog"));
//!
//! let cache = QueryCache::new(CacheConfig::default());
//! let breeds = cache.fetch(&QueryKey::scope("breeds").with("dog"), &fetcher).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod observer;
pub mod slot;
pub mod store;

pub use cache::{CacheConfig, QueryCache, QueryResult};
pub use error::ContextError;
pub use fetcher::{fetcher_fn, DeferredResponse, FetchError, Fetcher, FnFetcher, MockFetcher};
pub use observer::QueryObserver;
pub use slot::{SharedSlot, SlotHandle};
pub use store::{Store, StoreHandle};

pub use stow_core::{StaleTime, StoreAction, StoreChange, StoreState};
pub use stow_types::{Item, ItemId, KeyPart, QueryKey, QueryStatus, StowError};
