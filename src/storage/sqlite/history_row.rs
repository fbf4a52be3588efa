//! Row conversion and queries for the append-only `bookmark_histories` table.
//!
//! There is deliberately no update or delete function here: entries are
//! only ever appended, and removed only by the bookmark's cascade.

use super::sql::{format_timestamp, parse_timestamp};
use crate::models::{BookmarkHistoryEntry, BookmarkId, HistoryAction};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, bookmark_id, action, old_value, new_value, timestamp, user_id";

#[derive(Debug)]
struct HistoryRow {
    id: i64,
    bookmark_id: i64,
    action: String,
    old_value: String,
    new_value: String,
    timestamp: String,
    user_id: Option<String>,
}

fn read(row: &Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        bookmark_id: row.get(1)?,
        action: row.get(2)?,
        old_value: row.get(3)?,
        new_value: row.get(4)?,
        timestamp: row.get(5)?,
        user_id: row.get(6)?,
    })
}

fn into_entry(row: HistoryRow) -> Result<BookmarkHistoryEntry> {
    Ok(BookmarkHistoryEntry {
        id: row.id,
        bookmark_id: BookmarkId(row.bookmark_id),
        action: HistoryAction::parse(&row.action)?,
        old_value: row.old_value,
        new_value: row.new_value,
        timestamp: parse_timestamp(&row.timestamp)?,
        user_id: row.user_id,
    })
}

/// An entry about to be appended.
#[derive(Debug, Clone, Copy)]
pub struct HistoryAppend<'a> {
    /// Owning bookmark.
    pub bookmark_id: BookmarkId,
    /// Action.
    pub action: HistoryAction,
    /// Value before the change.
    pub old_value: &'a str,
    /// Value after the change.
    pub new_value: &'a str,
    /// Time of the change.
    pub timestamp: DateTime<Utc>,
}

/// Appends an entry and returns its id.
pub fn append(conn: &Connection, entry: &HistoryAppend<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO bookmark_histories (bookmark_id, action, old_value, new_value, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.bookmark_id.0,
            entry.action.as_str(),
            entry.old_value,
            entry.new_value,
            format_timestamp(&entry.timestamp),
        ],
    )
    .map_err(|e| Error::store("append_history", e))?;
    Ok(conn.last_insert_rowid())
}

/// Lists a bookmark's entries newest first; ties are broken by id.
pub fn list_desc(conn: &Connection, bookmark_id: BookmarkId) -> Result<Vec<BookmarkHistoryEntry>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM bookmark_histories WHERE bookmark_id = ?1 \
             ORDER BY timestamp DESC, id DESC"
        ))
        .map_err(|e| Error::store("prepare_list_history", e))?;
    let rows = stmt
        .query_map(params![bookmark_id.0], read)
        .map_err(|e| Error::store("list_history", e))?;
    rows.map(|row| into_entry(row.map_err(|e| Error::store("list_history", e))?))
        .collect()
}

/// Returns the most recent entry for a bookmark.
pub fn latest(conn: &Connection, bookmark_id: BookmarkId) -> Result<Option<BookmarkHistoryEntry>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM bookmark_histories WHERE bookmark_id = ?1 \
             ORDER BY timestamp DESC, id DESC LIMIT 1"
        ),
        params![bookmark_id.0],
        read,
    )
    .optional()
    .map_err(|e| Error::store("latest_history", e))?
    .map(into_entry)
    .transpose()
}

/// Actions whose values are learning states.
const STATE_ACTIONS: &str = "'created', 'learning_state_changed', 'state_reverted'";

/// Returns the most recent learning-state entry at or before `at`.
///
/// Only `created`, `learning_state_changed` and `state_reverted` entries
/// carry learning states in their values; other actions are skipped.
pub fn latest_state_entry_at_or_before(
    conn: &Connection,
    bookmark_id: BookmarkId,
    at: DateTime<Utc>,
) -> Result<Option<BookmarkHistoryEntry>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM bookmark_histories \
             WHERE bookmark_id = ?1 AND timestamp <= ?2 AND action IN ({STATE_ACTIONS}) \
             ORDER BY timestamp DESC, id DESC LIMIT 1"
        ),
        params![bookmark_id.0, format_timestamp(&at)],
        read,
    )
    .optional()
    .map_err(|e| Error::store("history_before", e))?
    .map(into_entry)
    .transpose()
}

/// Counts a bookmark's entries.
pub fn count(conn: &Connection, bookmark_id: BookmarkId) -> Result<usize> {
    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookmark_histories WHERE bookmark_id = ?1",
            params![bookmark_id.0],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("count_history", e))?;
    Ok(super::sql::from_sql_count(n))
}
