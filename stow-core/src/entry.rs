//! Cache entry state machine for stow.
//!
//! This module provides a pure, side-effect-free state machine for the
//! lifecycle of a single cached query. The state machine takes events as
//! input and produces a new state plus a list of effects to execute.
//!
//! Every fetch is stamped with a [`Generation`]. A resolution is applied
//! only while the entry is still pending on that same generation; anything
//! else is a superseded fetch and is discarded.
//!
//! The actual fetching is performed by stow-client, not by this module.

use std::fmt;
use std::time::Instant;
use stow_types::QueryStatus;

/// Sequence number of a fetch for one entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Create a Generation with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Generation.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The generation that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generation({})", self.0)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry state machine - NO I/O, just state transitions.
///
/// `T` is the resolved data, `E` the captured failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState<T, E> {
    /// Never requested.
    Vacant,
    /// Fetch in flight.
    Pending {
        /// Generation of the in-flight fetch.
        generation: Generation,
        /// Invalidated while in flight. The next request replaces this
        /// fetch; if it resolves first, the result lands stale.
        invalidated: bool,
    },
    /// Fetch resolved with data.
    Success {
        /// Generation that produced the data.
        generation: Generation,
        /// The resolved data.
        data: T,
        /// When the data goes stale (`None` = never).
        stale_at: Option<Instant>,
        /// Explicitly invalidated.
        invalidated: bool,
    },
    /// Fetch failed.
    Failed {
        /// Generation that failed.
        generation: Generation,
        /// The captured failure.
        error: E,
        /// Explicitly invalidated.
        invalidated: bool,
    },
}

impl<T, E> Default for EntryState<T, E> {
    fn default() -> Self {
        Self::Vacant
    }
}

impl<T, E> EntryState<T, E> {
    /// Create a new, vacant entry.
    pub fn new() -> Self {
        Self::Vacant
    }

    /// Process an event and return the new state plus effects to execute.
    ///
    /// This is a pure function - no side effects. The caller (stow-client)
    /// is responsible for executing the returned effects.
    pub fn on_event(self, event: EntryEvent<T, E>) -> (Self, Vec<EntryEffect>) {
        match (self, event) {
            // Request
            (Self::Vacant, EntryEvent::Requested { .. }) => {
                Self::start_fetch(Generation::default().next())
            }
            (
                Self::Pending {
                    generation,
                    invalidated: false,
                },
                EntryEvent::Requested { .. },
            ) => (
                Self::Pending {
                    generation,
                    invalidated: false,
                },
                vec![EntryEffect::Join { generation }],
            ),
            (
                Self::Pending {
                    generation,
                    invalidated: true,
                },
                EntryEvent::Requested { .. },
            ) => Self::start_fetch(generation.next()),
            (state @ Self::Success { .. }, EntryEvent::Requested { now })
            | (state @ Self::Failed { .. }, EntryEvent::Requested { now }) => {
                if state.is_stale(now) {
                    let next = state.generation().unwrap_or_default().next();
                    Self::start_fetch(next)
                } else {
                    (state, vec![EntryEffect::Hit])
                }
            }

            // Resolution
            (
                Self::Pending {
                    generation: current,
                    invalidated,
                },
                EntryEvent::Resolved {
                    generation,
                    data,
                    stale_at,
                },
            ) if generation == current => (
                Self::Success {
                    generation,
                    data,
                    stale_at,
                    invalidated,
                },
                vec![EntryEffect::Notify {
                    status: QueryStatus::Success,
                }],
            ),
            (
                Self::Pending {
                    generation: current,
                    invalidated,
                },
                EntryEvent::Failed { generation, error },
            ) if generation == current => (
                Self::Failed {
                    generation,
                    error,
                    invalidated,
                },
                vec![EntryEffect::Notify {
                    status: QueryStatus::Error,
                }],
            ),
            (state, EntryEvent::Resolved { generation, .. })
            | (state, EntryEvent::Failed { generation, .. }) => {
                let current = state.generation();
                (state, vec![EntryEffect::Discard { generation, current }])
            }

            // Invalidation
            (Self::Vacant, EntryEvent::Invalidated) => (Self::Vacant, vec![]),
            (Self::Pending { generation, .. }, EntryEvent::Invalidated) => (
                Self::Pending {
                    generation,
                    invalidated: true,
                },
                vec![],
            ),
            (
                Self::Success {
                    generation,
                    data,
                    stale_at,
                    ..
                },
                EntryEvent::Invalidated,
            ) => (
                Self::Success {
                    generation,
                    data,
                    stale_at,
                    invalidated: true,
                },
                vec![EntryEffect::Notify {
                    status: QueryStatus::Success,
                }],
            ),
            (
                Self::Failed {
                    generation, error, ..
                },
                EntryEvent::Invalidated,
            ) => (
                Self::Failed {
                    generation,
                    error,
                    invalidated: true,
                },
                vec![EntryEffect::Notify {
                    status: QueryStatus::Error,
                }],
            ),
        }
    }

    fn start_fetch(generation: Generation) -> (Self, Vec<EntryEffect>) {
        (
            Self::Pending {
                generation,
                invalidated: false,
            },
            vec![
                EntryEffect::Fetch { generation },
                EntryEffect::Notify {
                    status: QueryStatus::Pending,
                },
            ],
        )
    }

    /// Status as seen by consumers (`None` while vacant).
    pub fn status(&self) -> Option<QueryStatus> {
        match self {
            Self::Vacant => None,
            Self::Pending { .. } => Some(QueryStatus::Pending),
            Self::Success { .. } => Some(QueryStatus::Success),
            Self::Failed { .. } => Some(QueryStatus::Error),
        }
    }

    /// Generation of the current or last fetch.
    pub fn generation(&self) -> Option<Generation> {
        match self {
            Self::Vacant => None,
            Self::Pending { generation, .. }
            | Self::Success { generation, .. }
            | Self::Failed { generation, .. } => Some(*generation),
        }
    }

    /// Resolved data, if any.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Captured failure, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Check if a fetch is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Check if the entry must be refetched on its next request.
    ///
    /// A pending entry is stale only once invalidated; until then requests
    /// join the in-flight fetch. Failed entries only go stale through
    /// invalidation.
    pub fn is_stale(&self, now: Instant) -> bool {
        match self {
            Self::Vacant => true,
            Self::Pending { invalidated, .. } => *invalidated,
            Self::Success {
                stale_at,
                invalidated,
                ..
            } => *invalidated || stale_at.is_some_and(|at| now >= at),
            Self::Failed { invalidated, .. } => *invalidated,
        }
    }
}

/// Events that can occur in an entry's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEvent<T, E> {
    /// A consumer asked for this entry.
    Requested {
        /// Current time, for staleness checks.
        now: Instant,
    },
    /// A fetch resolved with data.
    Resolved {
        /// Generation the fetch was started with.
        generation: Generation,
        /// The resolved data.
        data: T,
        /// When the data goes stale (`None` = never).
        stale_at: Option<Instant>,
    },
    /// A fetch failed.
    Failed {
        /// Generation the fetch was started with.
        generation: Generation,
        /// The captured failure.
        error: E,
    },
    /// The entry was explicitly invalidated.
    Invalidated,
}

/// Effects to be executed by stow-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEffect {
    /// Start a fetch stamped with this generation.
    Fetch {
        /// Generation to hand back on resolution.
        generation: Generation,
    },
    /// The request joined an in-flight fetch.
    Join {
        /// Generation of the in-flight fetch.
        generation: Generation,
    },
    /// The request was served from the entry as-is.
    Hit,
    /// The entry changed; wake observers.
    Notify {
        /// Status after the change.
        status: QueryStatus,
    },
    /// A resolution arrived for a fetch that is no longer current.
    Discard {
        /// Generation of the late fetch.
        generation: Generation,
        /// Generation the entry is on now.
        current: Option<Generation>,
    },
}
