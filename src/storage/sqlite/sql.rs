//! Column encoding helpers shared by the row modules.
//!
//! Timestamps are stored as RFC 3339 text with nanosecond precision and a
//! `Z` suffix. The fixed width keeps lexical order equal to time order, so
//! `ORDER BY timestamp` and `timestamp <= ?` work on the text column.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Formats a timestamp for storage.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses a stored or user-supplied RFC 3339 / ISO-8601 timestamp.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the string is not a valid timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("invalid timestamp {s:?}: {e}")))
}

/// Parses an optional stored timestamp.
pub fn parse_optional_timestamp(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.filter(|s| !s.is_empty()).map(parse_timestamp).transpose()
}

/// Decodes a JSON object column; empty or `NULL` columns are empty maps.
pub fn parse_json_map(s: Option<&str>) -> Result<Map<String, Value>> {
    match s.map(str::trim) {
        None | Some("") => Ok(Map::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::Parse(format!("invalid metadata JSON: {e}"))),
    }
}

/// Encodes a JSON object for storage.
#[must_use]
pub fn format_json_map(map: &Map<String, Value>) -> String {
    Value::Object(map.clone()).to_string()
}

/// Converts a page size or offset to an `SQLite` integer.
#[must_use]
pub fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Converts an `SQLite` count to `usize`, clamping negatives to zero.
#[must_use]
pub fn from_sql_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}
