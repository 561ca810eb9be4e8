//! Store entries and their identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::StowError;

/// Identifier of an [`Item`] in the store.
///
/// Either chosen by the caller or derived from the wall clock
/// (milliseconds since the Unix epoch).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(u64);

impl ItemId {
    /// Create an ItemId with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Create an ItemId from the current time in milliseconds.
    ///
    /// A clock set before the epoch yields zero.
    pub fn from_clock() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    /// Get the numeric value of this ItemId.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl FromStr for ItemId {
    type Err = StowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| StowError::InvalidItemId(s.to_string()))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

/// A single entry of the local state store (a todo).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the store.
    pub id: ItemId,
    /// Free-form text.
    pub text: String,
}

impl Item {
    /// Create a new item without validation.
    pub fn new(id: ItemId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// Create a new item, rejecting blank text.
    ///
    /// Validation belongs to the caller; the store itself accepts anything.
    pub fn validated(id: ItemId, text: &str) -> Result<Self, StowError> {
        if text.trim().is_empty() {
            return Err(StowError::EmptyText);
        }
        Ok(Self::new(id, text))
    }
}
