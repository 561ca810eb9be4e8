//! Named single-value cell shared across consumers.
//!
//! The owner creates a [`SharedSlot`] and passes [`SlotHandle`]s down to the
//! consumers that read or replace its value. Writes are last-write-wins and
//! reach every subscriber immediately.

use std::sync::{Arc, Weak};
use tokio::sync::watch;

use crate::error::ContextError;

/// Owner of a shared optional value.
pub struct SharedSlot<T> {
    name: Arc<str>,
    value: Arc<watch::Sender<Option<T>>>,
}

impl<T: Clone> SharedSlot<T> {
    /// Create an empty slot.
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            name: Arc::from(name.into()),
            value: Arc::new(tx),
        }
    }

    /// Slot name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        self.value.send_replace(Some(value));
    }

    /// Empty the slot.
    pub fn clear(&self) {
        self.value.send_replace(None);
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.value.subscribe()
    }

    /// Take a handle that does not keep the slot alive.
    pub fn handle(&self) -> SlotHandle<T> {
        SlotHandle {
            name: Arc::clone(&self.name),
            value: Arc::downgrade(&self.value),
        }
    }
}

/// Consumer view of a [`SharedSlot`].
pub struct SlotHandle<T> {
    name: Arc<str>,
    value: Weak<watch::Sender<Option<T>>>,
}

impl<T> Clone for SlotHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            value: Weak::clone(&self.value),
        }
    }
}

impl<T: Clone> SlotHandle<T> {
    fn upgrade(&self) -> Result<Arc<watch::Sender<Option<T>>>, ContextError> {
        self.value
            .upgrade()
            .ok_or_else(|| ContextError::detached(&*self.name))
    }

    /// Current value of the owning slot.
    pub fn get(&self) -> Result<Option<T>, ContextError> {
        Ok(self.upgrade()?.borrow().clone())
    }

    /// Replace the owning slot's value.
    pub fn set(&self, value: T) -> Result<(), ContextError> {
        self.upgrade()?.send_replace(Some(value));
        Ok(())
    }

    /// Empty the owning slot.
    pub fn clear(&self) -> Result<(), ContextError> {
        self.upgrade()?.send_replace(None);
        Ok(())
    }

    /// Subscribe to the owning slot.
    pub fn subscribe(&self) -> Result<watch::Receiver<Option<T>>, ContextError> {
        Ok(self.upgrade()?.subscribe())
    }
}
