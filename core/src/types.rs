//! Shared primitive types used across the entire engine.

use chrono::{DateTime, TimeZone, Utc};

/// A stable account identifier, owned by the integrator.
pub type UserId = String;

/// A content-derived cluster identifier.
pub type ClusterId = String;

/// A moderation case identifier.
pub type CaseId = String;

/// A pipeline run identifier.
pub type RunId = String;

/// All engine timestamps. Stored as unix seconds in SQLite.
pub type Timestamp = DateTime<Utc>;

/// Convert a timestamp to its storage representation.
pub fn to_unix(ts: Timestamp) -> i64 {
    ts.timestamp()
}

/// Convert a storage value back to a timestamp.
pub fn from_unix(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}
