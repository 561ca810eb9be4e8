//! Client-side errors.

use thiserror::Error;

/// Errors from handles whose owner is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The handle outlived the store or slot it was taken from.
    #[error("'{name}' handle used after its owner was dropped; keep the owner alive for as long as its handles are in use")]
    Detached {
        /// Name of the owner the handle was taken from.
        name: String,
    },
}

impl ContextError {
    pub(crate) fn detached(name: impl Into<String>) -> Self {
        Self::Detached { name: name.into() }
    }
}
