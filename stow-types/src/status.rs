//! Lifecycle status of a cached query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a cache entry, as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// A fetch is in flight and no result is available yet.
    Pending,
    /// The fetch resolved with data.
    Success,
    /// The fetch failed.
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_matches_serde() {
        for status in [QueryStatus::Pending, QueryStatus::Success, QueryStatus::Error] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }
}
