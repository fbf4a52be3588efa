//! Point-in-time revert over the bookmark history.
//!
//! A revert restores the learning state recorded *before* the most recent
//! state change at or before the target time and logs a `state_reverted`
//! entry. Mastery is left as it is.

use super::bookmark::BookmarkService;
use crate::cancel::CancellationToken;
use crate::models::{Bookmark, BookmarkHistoryEntry, BookmarkId, HistoryAction, LearningState};
use crate::storage::sqlite::{bookmark_row, format_timestamp, history_row, parse_timestamp};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Point in time a revert goes back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTarget {
    /// The most recent history entry: undo one step.
    Latest,
    /// An RFC 3339 / ISO-8601 timestamp string.
    Text(String),
    /// A native timestamp.
    At(DateTime<Utc>),
}

impl From<DateTime<Utc>> for RevertTarget {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

impl From<Option<String>> for RevertTarget {
    fn from(text: Option<String>) -> Self {
        text.map_or(Self::Latest, Self::Text)
    }
}

impl BookmarkService {
    /// Returns a bookmark's history, newest first. Entries of deleted
    /// bookmarks stay readable.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn get_history(&self, id: BookmarkId) -> Result<Vec<BookmarkHistoryEntry>> {
        self.db
            .read("get_history", |conn| history_row::list_desc(conn, id))
    }

    /// Reverts a bookmark's learning state to what it was at `target`.
    ///
    /// The latest state-carrying entry (`created`, `learning_state_changed`
    /// or `state_reverted`) at or before the target time is located and its
    /// old value restored; for a `created` entry, whose old value is empty,
    /// the created state is restored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for an unparseable timestamp,
    /// [`Error::NoHistoryBeforeTimestamp`] if no entry precedes the target,
    /// [`Error::NotFound`] if the bookmark does not exist or was deleted, or
    /// a store error.
    pub fn revert(&self, id: BookmarkId, target: &RevertTarget) -> Result<Bookmark> {
        self.revert_with_cancel(id, target, &CancellationToken::new())
    }

    /// [`revert`](Self::revert) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`revert`](Self::revert); also [`Error::Cancelled`].
    pub fn revert_with_cancel(
        &self,
        id: BookmarkId,
        target: &RevertTarget,
        cancel: &CancellationToken,
    ) -> Result<Bookmark> {
        let explicit = match target {
            RevertTarget::Latest => None,
            RevertTarget::Text(text) => Some(parse_timestamp(text)?),
            RevertTarget::At(at) => Some(*at),
        };

        let (from, bookmark) = self.db.transaction("revert_bookmark", cancel, |tx| {
            let mut bookmark = bookmark_row::fetch_active(tx, id)?;

            let at = match explicit {
                Some(at) => at,
                None => history_row::latest(tx, id)?
                    .map(|entry| entry.timestamp)
                    .ok_or_else(|| no_history(id, "latest"))?,
            };

            let entry = history_row::latest_state_entry_at_or_before(tx, id, at)?
                .ok_or_else(|| no_history(id, &format_timestamp(&at)))?;

            let restored_text = if entry.old_value.is_empty() {
                &entry.new_value
            } else {
                &entry.old_value
            };
            let restored = LearningState::parse(restored_text).map_err(|_| {
                Error::Parse(format!(
                    "history entry {} holds unknown learning state {restored_text:?}",
                    entry.id
                ))
            })?;

            let now = Utc::now();
            let from = bookmark.learning_state;
            bookmark.learning_state = restored;
            bookmark.updated_at = now;
            bookmark_row::save(tx, &bookmark)?;

            history_row::append(
                tx,
                &history_row::HistoryAppend {
                    bookmark_id: id,
                    action: HistoryAction::StateReverted,
                    old_value: &entry.new_value,
                    new_value: restored.as_str(),
                    timestamp: now,
                },
            )?;
            Ok((from, bookmark))
        })?;

        tracing::info!(
            bookmark_id = %id,
            from = %from,
            to = %bookmark.learning_state,
            "Reverted learning state"
        );
        Ok(bookmark)
    }
}

fn no_history(id: BookmarkId, timestamp: &str) -> Error {
    Error::NoHistoryBeforeTimestamp {
        bookmark_id: id.get(),
        timestamp: timestamp.to_string(),
    }
}
