//! Bookmark history (audit log) models.

use super::bookmark::BookmarkId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of state-relevant change recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Bookmark created.
    Created,
    /// Bookmark fields updated. Declared for completeness; nothing emits it.
    Updated,
    /// Learning state changed.
    LearningStateChanged,
    /// A note was attached.
    NoteAdded,
    /// Bookmark soft-deleted.
    Deleted,
    /// One of the bookmark's cards was reviewed.
    Reviewed,
    /// Learning state restored from an earlier entry.
    StateReverted,
}

impl HistoryAction {
    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::LearningStateChanged => "learning_state_changed",
            Self::NoteAdded => "note_added",
            Self::Deleted => "deleted",
            Self::Reviewed => "reviewed",
            Self::StateReverted => "state_reverted",
        }
    }

    /// Parses a stored action name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "learning_state_changed" => Ok(Self::LearningStateChanged),
            "note_added" => Ok(Self::NoteAdded),
            "deleted" => Ok(Self::Deleted),
            "reviewed" => Ok(Self::Reviewed),
            "state_reverted" => Ok(Self::StateReverted),
            other => Err(Error::Parse(format!("unknown history action: {other:?}"))),
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkHistoryEntry {
    /// Entry id; breaks timestamp ties.
    pub id: i64,
    /// Bookmark the entry belongs to.
    pub bookmark_id: BookmarkId,
    /// What happened.
    pub action: HistoryAction,
    /// Value before the change (empty when not applicable).
    pub old_value: String,
    /// Value after the change.
    pub new_value: String,
    /// When the change was committed.
    pub timestamp: DateTime<Utc>,
    /// Acting user, if known.
    pub user_id: Option<String>,
}
