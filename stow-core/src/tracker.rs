//! Key change detection for query consumers.
//!
//! A consumer re-evaluates its query parameters on every interaction. The
//! tracker remembers the last key it saw so the consumer can tell whether
//! the parameters actually changed before going back to the cache.

use stow_types::QueryKey;

/// Remembers the last observed key.
#[derive(Debug, Clone, Default)]
pub struct KeyTracker {
    current: Option<QueryKey>,
}

/// Result of observing a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChange {
    /// Same key as last time.
    Unchanged,
    /// The key differs from the previous one (or is the first seen).
    Changed {
        /// The key that was replaced, if any.
        previous: Option<QueryKey>,
    },
}

impl KeyTracker {
    /// Create a tracker that has seen nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker starting at a known key.
    pub fn with_key(key: QueryKey) -> Self {
        Self { current: Some(key) }
    }

    /// Record `key` and report whether it differs from the last one.
    pub fn observe(&mut self, key: &QueryKey) -> KeyChange {
        if self.current.as_ref() == Some(key) {
            return KeyChange::Unchanged;
        }
        let previous = self.current.replace(key.clone());
        KeyChange::Changed { previous }
    }

    /// The last observed key.
    pub fn current(&self) -> Option<&QueryKey> {
        self.current.as_ref()
    }

    /// Forget the last key.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

impl KeyChange {
    /// Check if the key changed.
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}
