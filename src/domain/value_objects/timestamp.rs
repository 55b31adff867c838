//! Remote message timestamps.
//!
//! The event source identifies messages by a per-channel timestamp string of
//! the form `"<unix seconds>.<sequence>"`, e.g. `"1355517523.000005"`. The
//! string is opaque for identity purposes (reaction targets compare it
//! verbatim); only the seconds part carries wall-clock meaning.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote message timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct MessageTs(pub String);

impl MessageTs {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whole seconds since the unix epoch; `0` when the value is malformed.
    pub fn unix_seconds(&self) -> i64 {
        self.0
            .split('.')
            .next()
            .and_then(|secs| secs.parse().ok())
            .unwrap_or(0)
    }

    /// The wall-clock instant of the seconds part.
    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.unix_seconds(), 0)
            .single()
            .unwrap_or_default()
    }
}

impl fmt::Display for MessageTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageTs {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageTs {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for MessageTs {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
