//! Reducer for the local item store.
//!
//! This module provides a pure, side-effect-free reducer over an ordered
//! item list. Each action produces a new state plus a list of changes that
//! describe what happened.
//!
//! Dispatching, snapshots and change notification are handled by
//! stow-client, not by this module.

use stow_types::{Item, ItemId};

/// Item list state - NO I/O, just transitions.
///
/// Item ids are unique and insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    items: Vec<Item>,
}

impl StoreState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Look up an item by id.
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Check whether an item with this id exists.
    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply an action and return the new state plus the changes made.
    ///
    /// This is a pure function - no side effects. An `Add` whose id is
    /// already present is rejected and leaves the state untouched.
    pub fn reduce(mut self, action: StoreAction) -> (Self, Vec<StoreChange>) {
        match action {
            StoreAction::Add(item) => {
                if self.contains(item.id) {
                    let id = item.id;
                    return (self, vec![StoreChange::DuplicateRejected { id }]);
                }
                let id = item.id;
                self.items.push(item);
                (self, vec![StoreChange::Appended { id }])
            }
            StoreAction::Remove(id) => {
                let before = self.items.len();
                self.items.retain(|item| item.id != id);
                if self.items.len() == before {
                    (self, vec![])
                } else {
                    (self, vec![StoreChange::Removed { id }])
                }
            }
        }
    }
}

/// Actions accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Append an item.
    Add(Item),
    /// Remove every item with this id.
    Remove(ItemId),
}

/// What a reduction did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// An item was appended.
    Appended {
        /// Id of the new item.
        id: ItemId,
    },
    /// An item was removed.
    Removed {
        /// Id of the removed item.
        id: ItemId,
    },
    /// An `Add` was ignored because the id is already present.
    DuplicateRejected {
        /// The colliding id.
        id: ItemId,
    },
}
