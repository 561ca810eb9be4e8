//! Staleness policy for cached query results.

use std::time::{Duration, Instant};

/// How long a resolved query result stays fresh.
///
/// The default is [`StaleTime::Never`]: once resolved, an entry is served
/// until it is explicitly invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleTime {
    /// Results never go stale on their own.
    #[default]
    Never,
    /// Results go stale this long after they resolve.
    After(Duration),
}

impl StaleTime {
    /// Build from an optional number of seconds (`None` = never).
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) => Self::After(Duration::from_secs(secs)),
            None => Self::Never,
        }
    }

    /// The instant at which a result resolved at `resolved_at` goes stale.
    ///
    /// Returns `None` for [`StaleTime::Never`] and for deadlines too far in
    /// the future to represent.
    pub fn deadline(&self, resolved_at: Instant) -> Option<Instant> {
        match self {
            Self::Never => None,
            Self::After(ttl) => resolved_at.checked_add(*ttl),
        }
    }
}
