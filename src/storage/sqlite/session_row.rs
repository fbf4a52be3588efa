//! Row conversion and queries for the `learning_sessions` table.

use super::sql::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::models::LearningSession;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

/// Inserts a running session.
pub fn insert(conn: &Connection, strategy: &str, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO learning_sessions (strategy, started_at) VALUES (?1, ?2)",
        params![strategy, format_timestamp(&now)],
    )
    .map_err(|e| Error::store("insert_session", e))?;
    Ok(conn.last_insert_rowid())
}

/// Fetches a session by id.
pub fn fetch(conn: &Connection, id: i64) -> Result<Option<LearningSession>> {
    let row = conn
        .query_row(
            "SELECT id, strategy, started_at, ended_at, viewed_count, learned_count \
             FROM learning_sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()
        .map_err(|e| Error::store("fetch_session", e))?;

    row.map(
        |(id, strategy, started_at, ended_at, viewed_count, learned_count)| {
            Ok(LearningSession {
                id,
                strategy,
                started_at: parse_timestamp(&started_at)?,
                ended_at: parse_optional_timestamp(ended_at.as_deref())?,
                viewed_count,
                learned_count,
            })
        },
    )
    .transpose()
}

/// Closes a running session. Returns `false` if no running session matched.
pub fn finish(
    conn: &Connection,
    id: i64,
    viewed_count: i64,
    learned_count: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE learning_sessions SET ended_at = ?2, viewed_count = ?3, learned_count = ?4 \
             WHERE id = ?1 AND ended_at IS NULL",
            params![id, format_timestamp(&now), viewed_count, learned_count],
        )
        .map_err(|e| Error::store("finish_session", e))?;
    Ok(updated > 0)
}
