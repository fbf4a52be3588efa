//! Row conversion and queries for the `bookmarks` table.
//!
//! Every function takes a borrowed [`Connection`] so it can run inside the
//! caller's transaction (a [`rusqlite::Transaction`] derefs to one).

use super::sql::{
    format_json_map, format_timestamp, parse_json_map, parse_optional_timestamp, parse_timestamp,
    to_sql_count,
};
use crate::models::{Bookmark, BookmarkId, LearningState};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};

const COLUMNS: &str = "id, global_item_id, item_type, item_id, urn, title, description, \
     learning_state, mastery_level, last_reviewed, next_review, created_at, updated_at, \
     deleted_at, metadata";

/// Internal representation of a bookmark row.
#[derive(Debug)]
struct BookmarkRow {
    id: i64,
    global_item_id: String,
    item_type: String,
    item_id: String,
    urn: String,
    title: String,
    description: String,
    learning_state: String,
    mastery_level: f64,
    last_reviewed: Option<String>,
    next_review: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
    metadata: Option<String>,
}

impl BookmarkRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            global_item_id: row.get(1)?,
            item_type: row.get(2)?,
            item_id: row.get(3)?,
            urn: row.get(4)?,
            title: row.get(5)?,
            description: row.get(6)?,
            learning_state: row.get(7)?,
            mastery_level: row.get(8)?,
            last_reviewed: row.get(9)?,
            next_review: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            deleted_at: row.get(13)?,
            metadata: row.get(14)?,
        })
    }

    fn into_bookmark(self) -> Result<Bookmark> {
        let learning_state = LearningState::parse(&self.learning_state).map_err(|_| {
            Error::Parse(format!(
                "bookmark {} has unknown learning state {:?}",
                self.id, self.learning_state
            ))
        })?;

        Ok(Bookmark {
            id: BookmarkId(self.id),
            global_item_id: self.global_item_id,
            item_type: self.item_type,
            item_id: self.item_id,
            urn: self.urn,
            title: self.title,
            description: self.description,
            learning_state,
            mastery_level: self.mastery_level,
            last_reviewed: parse_optional_timestamp(self.last_reviewed.as_deref())?,
            next_review: parse_optional_timestamp(self.next_review.as_deref())?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            deleted_at: parse_optional_timestamp(self.deleted_at.as_deref())?,
            metadata: parse_json_map(self.metadata.as_deref())?,
        })
    }
}

/// Values written when a bookmark is first inserted.
#[derive(Debug)]
pub struct BookmarkInsert<'a> {
    /// Global item id.
    pub global_item_id: &'a str,
    /// External catalog type.
    pub item_type: &'a str,
    /// External item id.
    pub item_id: &'a str,
    /// Derived URN.
    pub urn: &'a str,
    /// Title.
    pub title: &'a str,
    /// Description.
    pub description: &'a str,
    /// Initial metadata (stats).
    pub metadata: &'a Map<String, Value>,
    /// Creation time.
    pub now: DateTime<Utc>,
}

/// Inserts a bookmark in the `to_review` state with zero mastery.
pub fn insert(conn: &Connection, new: &BookmarkInsert<'_>) -> Result<BookmarkId> {
    let now = format_timestamp(&new.now);
    conn.execute(
        "INSERT INTO bookmarks (global_item_id, item_type, item_id, urn, title, description, \
         learning_state, mastery_level, created_at, updated_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0.0, ?8, ?8, ?9)",
        params![
            new.global_item_id,
            new.item_type,
            new.item_id,
            new.urn,
            new.title,
            new.description,
            LearningState::ToReview.as_str(),
            now,
            format_json_map(new.metadata),
        ],
    )
    .map_err(|e| Error::store("insert_bookmark", e))?;
    Ok(BookmarkId(conn.last_insert_rowid()))
}

/// Fetches a bookmark by id, including soft-deleted ones.
pub fn fetch(conn: &Connection, id: BookmarkId) -> Result<Option<Bookmark>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM bookmarks WHERE id = ?1"),
        params![id.0],
        BookmarkRow::read,
    )
    .optional()
    .map_err(|e| Error::store("fetch_bookmark", e))?
    .map(BookmarkRow::into_bookmark)
    .transpose()
}

/// Fetches a non-deleted bookmark, failing with [`Error::NotFound`] otherwise.
pub fn fetch_active(conn: &Connection, id: BookmarkId) -> Result<Bookmark> {
    fetch(conn, id)?
        .filter(|b| !b.is_deleted())
        .ok_or_else(|| Error::not_found("bookmark", id))
}

/// Finds the non-deleted bookmark with the given composite key.
pub fn find_active_by_key(
    conn: &Connection,
    global_item_id: &str,
    item_type: &str,
    item_id: &str,
) -> Result<Option<Bookmark>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM bookmarks \
             WHERE global_item_id = ?1 AND item_type = ?2 AND item_id = ?3 AND deleted_at IS NULL"
        ),
        params![global_item_id, item_type, item_id],
        BookmarkRow::read,
    )
    .optional()
    .map_err(|e| Error::store("find_bookmark", e))?
    .map(BookmarkRow::into_bookmark)
    .transpose()
}

/// Finds non-deleted bookmark ids by URN.
pub fn active_ids_by_urn(conn: &Connection, urns: &[String]) -> Result<Vec<BookmarkId>> {
    let mut stmt = conn
        .prepare("SELECT id FROM bookmarks WHERE urn = ?1 AND deleted_at IS NULL")
        .map_err(|e| Error::store("prepare_bookmark_by_urn", e))?;

    let mut ids = Vec::new();
    for urn in urns {
        let found = stmt
            .query_map(params![urn], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::store("bookmark_by_urn", e))?;
        for id in found {
            ids.push(BookmarkId(
                id.map_err(|e| Error::store("bookmark_by_urn", e))?,
            ));
        }
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Writes every mutable column of a bookmark.
pub fn save(conn: &Connection, bookmark: &Bookmark) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE bookmarks SET title = ?2, description = ?3, learning_state = ?4, \
             mastery_level = ?5, last_reviewed = ?6, next_review = ?7, updated_at = ?8, \
             metadata = ?9 WHERE id = ?1 AND deleted_at IS NULL",
            params![
                bookmark.id.0,
                bookmark.title,
                bookmark.description,
                bookmark.learning_state.as_str(),
                bookmark.mastery_level,
                bookmark.last_reviewed.as_ref().map(format_timestamp),
                bookmark.next_review.as_ref().map(format_timestamp),
                format_timestamp(&bookmark.updated_at),
                format_json_map(&bookmark.metadata),
            ],
        )
        .map_err(|e| Error::store("save_bookmark", e))?;

    if updated == 0 {
        return Err(Error::not_found("bookmark", bookmark.id));
    }
    Ok(())
}

/// Marks a bookmark deleted.
pub fn soft_delete(conn: &Connection, id: BookmarkId, now: DateTime<Utc>) -> Result<()> {
    let now = format_timestamp(&now);
    let updated = conn
        .execute(
            "UPDATE bookmarks SET deleted_at = ?2, updated_at = ?2 \
             WHERE id = ?1 AND deleted_at IS NULL",
            params![id.0, now],
        )
        .map_err(|e| Error::store("delete_bookmark", e))?;

    if updated == 0 {
        return Err(Error::not_found("bookmark", id));
    }
    Ok(())
}

/// Lists non-deleted bookmarks, newest first.
pub fn list(
    conn: &Connection,
    state: Option<LearningState>,
    offset: usize,
    limit: usize,
) -> Result<Vec<Bookmark>> {
    let state = state.map(|s| s.as_str());
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM bookmarks \
             WHERE deleted_at IS NULL AND (?1 IS NULL OR learning_state = ?1) \
             ORDER BY id DESC LIMIT ?2 OFFSET ?3"
        ))
        .map_err(|e| Error::store("prepare_list_bookmarks", e))?;

    let rows = stmt
        .query_map(
            params![state, to_sql_count(limit), to_sql_count(offset)],
            BookmarkRow::read,
        )
        .map_err(|e| Error::store("list_bookmarks", e))?;

    rows.map(|row| {
        row.map_err(|e| Error::store("list_bookmarks", e))?
            .into_bookmark()
    })
    .collect()
}

/// Counts non-deleted bookmarks.
pub fn count(conn: &Connection, state: Option<LearningState>) -> Result<usize> {
    let state = state.map(|s| s.as_str());
    let total: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookmarks \
             WHERE deleted_at IS NULL AND (?1 IS NULL OR learning_state = ?1)",
            params![state],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("count_bookmarks", e))?;
    Ok(super::sql::from_sql_count(total))
}
