//! Notes attached to bookmarks.
//!
//! Note bodies are validated rich-text documents; once validated they are
//! stored as an opaque blob.

use crate::cancel::CancellationToken;
use crate::models::{BookmarkId, HistoryAction, Note, NoteId, validate_document};
use crate::storage::Database;
use crate::storage::sqlite::{bookmark_row, history_row, note_row};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;

/// Service for note operations.
pub struct NoteService {
    db: Arc<Database>,
}

impl NoteService {
    /// Creates a note service over `db`.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Attaches a note to a bookmark and appends a `note_added` entry to the
    /// bookmark's history in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] or [`Error::InvalidInput`] for an invalid
    /// body, [`Error::NotFound`] if the bookmark does not exist, or a store
    /// error.
    pub fn create_note(
        &self,
        bookmark_id: BookmarkId,
        body: &str,
        author: Option<&str>,
        is_private: bool,
    ) -> Result<Note> {
        self.create_note_with_cancel(bookmark_id, body, author, is_private, &CancellationToken::new())
    }

    /// [`create_note`](Self::create_note) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`create_note`](Self::create_note); also [`Error::Cancelled`].
    pub fn create_note_with_cancel(
        &self,
        bookmark_id: BookmarkId,
        body: &str,
        author: Option<&str>,
        is_private: bool,
        cancel: &CancellationToken,
    ) -> Result<Note> {
        validate_document(body)?;

        let note = self.db.transaction("create_note", cancel, |tx| {
            bookmark_row::fetch_active(tx, bookmark_id)?;
            let now = Utc::now();
            let id = note_row::insert(tx, bookmark_id, body, author, is_private, now)?;
            let note = note_row::fetch(tx, id)?.ok_or_else(|| Error::not_found("note", id))?;
            history_row::append(
                tx,
                &history_row::HistoryAppend {
                    bookmark_id,
                    action: HistoryAction::NoteAdded,
                    old_value: "",
                    new_value: &note.urn,
                    timestamp: now,
                },
            )?;
            Ok(note)
        })?;

        tracing::info!(note_id = %note.id, bookmark_id = %bookmark_id, "Created note");
        Ok(note)
    }

    /// Fetches a note by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the note does not exist.
    pub fn get_note(&self, id: NoteId) -> Result<Note> {
        self.db.read("get_note", |conn| {
            note_row::fetch(conn, id)?.ok_or_else(|| Error::not_found("note", id))
        })
    }

    /// Fetches a note by URN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no note has that URN.
    pub fn get_note_by_urn(&self, urn: &str) -> Result<Note> {
        self.db.read("get_note_by_urn", |conn| {
            note_row::fetch_by_urn(conn, urn)?.ok_or_else(|| Error::not_found("note", urn))
        })
    }

    /// Lists a bookmark's notes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_notes(&self, bookmark_id: BookmarkId) -> Result<Vec<Note>> {
        self.db
            .read("list_notes", |conn| note_row::list_by_bookmark(conn, bookmark_id))
    }

    /// Replaces a note's body.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid body, [`Error::NotFound`],
    /// or a store error.
    pub fn update_note(&self, id: NoteId, body: &str) -> Result<Note> {
        self.update_note_with_cancel(id, body, &CancellationToken::new())
    }

    /// [`update_note`](Self::update_note) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`update_note`](Self::update_note); also [`Error::Cancelled`].
    pub fn update_note_with_cancel(
        &self,
        id: NoteId,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<Note> {
        validate_document(body)?;
        let note = self
            .db
            .transaction("update_note", cancel, |tx| {
                if !note_row::update_body(tx, id, body, Utc::now())? {
                    return Err(Error::not_found("note", id));
                }
                note_row::fetch(tx, id)?.ok_or_else(|| Error::not_found("note", id))
            })?;
        tracing::info!(note_id = %id, "Updated note");
        Ok(note)
    }

    /// Deletes a note permanently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the note does not exist.
    pub fn delete_note(&self, id: NoteId) -> Result<()> {
        self.delete_note_with_cancel(id, &CancellationToken::new())
    }

    /// [`delete_note`](Self::delete_note) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`delete_note`](Self::delete_note); also [`Error::Cancelled`].
    pub fn delete_note_with_cancel(&self, id: NoteId, cancel: &CancellationToken) -> Result<()> {
        self.db
            .transaction("delete_note", cancel, |tx| {
                if note_row::delete(tx, id)? {
                    Ok(())
                } else {
                    Err(Error::not_found("note", id))
                }
            })?;
        tracing::info!(note_id = %id, "Deleted note");
        Ok(())
    }
}
