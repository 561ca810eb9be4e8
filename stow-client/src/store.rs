//! Store - observable owner of the item list.
//!
//! Wraps the pure [`StoreState`] reducer in a `watch` channel so every
//! dispatch is visible to subscribers as soon as it is applied. Dispatch
//! never suspends; actions land strictly in call order.

use std::sync::{Arc, Weak};
use stow_core::{StoreAction, StoreChange, StoreState};
use stow_types::{Item, ItemId};
use tokio::sync::watch;

use crate::error::ContextError;

const STORE_NAME: &str = "store";

/// Owner of the item list.
///
/// Dropping the store detaches every [`StoreHandle`] taken from it.
pub struct Store {
    state: Arc<watch::Sender<StoreState>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_state(StoreState::new())
    }

    /// Create a store starting from `state`.
    pub fn with_state(state: StoreState) -> Self {
        let (tx, _) = watch::channel(state);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Apply an action and return what changed.
    pub fn dispatch(&self, action: StoreAction) -> Vec<StoreChange> {
        dispatch_on(&self.state, action)
    }

    /// Append an item (rejected if its id is already present).
    pub fn add(&self, item: Item) -> Vec<StoreChange> {
        self.dispatch(StoreAction::Add(item))
    }

    /// Remove the item with `id`, if present.
    pub fn remove(&self, id: ItemId) -> Vec<StoreChange> {
        self.dispatch(StoreAction::Remove(id))
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Snapshot of the current items, in insertion order.
    pub fn items(&self) -> Vec<Item> {
        self.state.borrow().items().to_vec()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// Take a handle that does not keep the store alive.
    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            state: Arc::downgrade(&self.state),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer view of a [`Store`].
#[derive(Clone)]
pub struct StoreHandle {
    state: Weak<watch::Sender<StoreState>>,
}

impl StoreHandle {
    fn upgrade(&self) -> Result<Arc<watch::Sender<StoreState>>, ContextError> {
        self.state
            .upgrade()
            .ok_or_else(|| ContextError::detached(STORE_NAME))
    }

    /// Apply an action on the owning store.
    pub fn dispatch(&self, action: StoreAction) -> Result<Vec<StoreChange>, ContextError> {
        let state = self.upgrade()?;
        Ok(dispatch_on(&state, action))
    }

    /// Snapshot of the owning store's state.
    pub fn state(&self) -> Result<StoreState, ContextError> {
        Ok(self.upgrade()?.borrow().clone())
    }

    /// Subscribe to the owning store.
    pub fn subscribe(&self) -> Result<watch::Receiver<StoreState>, ContextError> {
        Ok(self.upgrade()?.subscribe())
    }
}

fn dispatch_on(state: &watch::Sender<StoreState>, action: StoreAction) -> Vec<StoreChange> {
    let mut changes = Vec::new();
    state.send_if_modified(|current| {
        let (next, applied) = std::mem::take(current).reduce(action);
        *current = next;
        changes = applied;
        changes
            .iter()
            .any(|c| !matches!(c, StoreChange::DuplicateRejected { .. }))
    });

    for change in &changes {
        match change {
            StoreChange::Appended { id } => tracing::debug!(%id, "item added"),
            StoreChange::Removed { id } => tracing::debug!(%id, "item removed"),
            StoreChange::DuplicateRejected { id } => {
                tracing::warn!(%id, "duplicate item id rejected")
            }
        }
    }
    changes
}
