//! # stow-core
//!
//! Pure logic for stow (no I/O, instant tests).
//!
//! This crate implements the reducers and state machines behind the store
//! and the query cache without any runtime, clock or I/O of its own.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! Time is passed in as [`std::time::Instant`] values. The actual fetching,
//! notification and logging are performed by `stow-client`, which interprets
//! the changes and effects produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod staleness;
pub mod store;
pub mod tracker;

pub use entry::{EntryEffect, EntryEvent, EntryState, Generation};
pub use staleness::StaleTime;
pub use store::{StoreAction, StoreChange, StoreState};
pub use tracker::{KeyChange, KeyTracker};
