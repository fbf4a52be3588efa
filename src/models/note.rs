//! Note models.

use super::bookmark::BookmarkId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rich-text annotation attached to a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note id.
    pub id: NoteId,
    /// `v2e::note::<id>`.
    pub urn: String,
    /// Owning bookmark.
    pub bookmark_id: BookmarkId,
    /// Validated rich-text document (JSON).
    pub body: String,
    /// Author, if any.
    pub author: Option<String>,
    /// Hidden from shared views.
    pub is_private: bool,
    /// Editorial state; `draft` for notes that predate it.
    pub fsm_state: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}
