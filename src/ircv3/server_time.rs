//! Server-time handling for the IRCv3 `server-time` capability.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp the way servers send the `time` tag.
///
/// Returns an ISO 8601 timestamp like `2023-01-01T12:00:00.000Z`.
pub fn format_server_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a `time` tag value.
///
/// Accepts RFC 3339 timestamps like `2023-01-01T12:00:00.000Z`; anything
/// else yields `None`.
pub fn parse_server_time(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
