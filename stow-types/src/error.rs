//! Error types for stow.

use thiserror::Error;

/// Errors that can occur when building stow values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StowError {
    /// Item text was empty or whitespace only
    #[error("item text must not be empty")]
    EmptyText,

    /// Item id could not be parsed
    #[error("invalid item id: {0}")]
    InvalidItemId(String),
}
