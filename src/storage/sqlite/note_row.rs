//! Row conversion and queries for the `notes` table.

use super::sql::{format_timestamp, parse_timestamp};
use crate::models::{BookmarkId, Note, NoteId, Urn};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str =
    "id, urn, bookmark_id, body, author, is_private, fsm_state, created_at, updated_at";

/// Editorial state assigned to new notes.
pub const DEFAULT_NOTE_STATE: &str = "draft";

fn read(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        urn: row.get(1)?,
        bookmark_id: row.get(2)?,
        body: row.get(3)?,
        author: row.get(4)?,
        is_private: row.get(5)?,
        fsm_state: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[derive(Debug)]
struct NoteRow {
    id: i64,
    urn: String,
    bookmark_id: i64,
    body: String,
    author: Option<String>,
    is_private: bool,
    fsm_state: String,
    created_at: String,
    updated_at: String,
}

impl NoteRow {
    fn into_note(self) -> Result<Note> {
        Ok(Note {
            id: NoteId(self.id),
            urn: self.urn,
            bookmark_id: BookmarkId(self.bookmark_id),
            body: self.body,
            author: self.author,
            is_private: self.is_private,
            fsm_state: self.fsm_state,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Inserts a note and assigns its URN.
pub fn insert(
    conn: &Connection,
    bookmark_id: BookmarkId,
    body: &str,
    author: Option<&str>,
    is_private: bool,
    now: DateTime<Utc>,
) -> Result<NoteId> {
    let now = format_timestamp(&now);
    conn.execute(
        "INSERT INTO notes (urn, bookmark_id, body, author, is_private, fsm_state, created_at, updated_at) \
         VALUES ('', ?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![bookmark_id.0, body, author, is_private, DEFAULT_NOTE_STATE, now],
    )
    .map_err(|e| Error::store("insert_note", e))?;

    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE notes SET urn = ?2 WHERE id = ?1",
        params![id, Urn::for_note(id).to_string()],
    )
    .map_err(|e| Error::store("assign_note_urn", e))?;
    Ok(NoteId(id))
}

/// Fetches a note by id.
pub fn fetch(conn: &Connection, id: NoteId) -> Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM notes WHERE id = ?1"),
        params![id.0],
        read,
    )
    .optional()
    .map_err(|e| Error::store("fetch_note", e))?
    .map(NoteRow::into_note)
    .transpose()
}

/// Fetches a note by URN.
pub fn fetch_by_urn(conn: &Connection, urn: &str) -> Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM notes WHERE urn = ?1"),
        params![urn],
        read,
    )
    .optional()
    .map_err(|e| Error::store("fetch_note_by_urn", e))?
    .map(NoteRow::into_note)
    .transpose()
}

/// Lists a bookmark's notes, oldest first.
pub fn list_by_bookmark(conn: &Connection, bookmark_id: BookmarkId) -> Result<Vec<Note>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM notes WHERE bookmark_id = ?1 ORDER BY id"
        ))
        .map_err(|e| Error::store("prepare_list_notes", e))?;
    let rows = stmt
        .query_map(params![bookmark_id.0], read)
        .map_err(|e| Error::store("list_notes", e))?;
    rows.map(|row| row.map_err(|e| Error::store("list_notes", e))?.into_note())
        .collect()
}

/// Replaces a note's body. Returns `false` if the note does not exist.
pub fn update_body(conn: &Connection, id: NoteId, body: &str, now: DateTime<Utc>) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE notes SET body = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.0, body, format_timestamp(&now)],
        )
        .map_err(|e| Error::store("update_note", e))?;
    Ok(updated > 0)
}

/// Hard-deletes a note. Returns `false` if it did not exist.
pub fn delete(conn: &Connection, id: NoteId) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM notes WHERE id = ?1", params![id.0])
        .map_err(|e| Error::store("delete_note", e))?;
    Ok(deleted > 0)
}
