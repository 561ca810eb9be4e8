//! # stow-types
//!
//! Shared value types for the stow store and query cache.
//!
//! This crate provides the foundational types used across all stow crates:
//! - [`ItemId`], [`Item`] - Store entries and their identity
//! - [`QueryKey`], [`KeyPart`] - Structural cache keys
//! - [`QueryStatus`] - Lifecycle status of a cached query
//! - [`StowError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod key;
mod status;

pub use error::StowError;
pub use ids::{Item, ItemId};
pub use key::{KeyPart, QueryKey};
pub use status::QueryStatus;
