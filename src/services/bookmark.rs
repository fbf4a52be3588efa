//! Bookmark service with its audit history.
//!
//! Every state-relevant change appends a [`BookmarkHistoryEntry`] in the
//! same transaction that writes the bookmark, so the history never records
//! a change that did not commit and a committed change is never missing
//! from the history.
//!
//! [`BookmarkHistoryEntry`]: crate::models::BookmarkHistoryEntry

use crate::cancel::CancellationToken;
use crate::models::{
    Bookmark, BookmarkId, BookmarkPage, BookmarkStats, HistoryAction, LearningState,
    META_FIRST_BOOKMARKED, META_LAST_VIEWED, META_STUDY_SESSIONS, META_VIEW_COUNT, MemoryCard,
    NewBookmark, NewCard, Urn,
};
use crate::storage::Database;
use crate::storage::sqlite::{
    bookmark_row, card_row, format_timestamp, history_row, parse_optional_timestamp,
};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::instrument;

/// Page size used when a caller passes a zero limit.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Result of [`BookmarkService::create_bookmark`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedBookmark {
    /// The new or already existing bookmark.
    pub bookmark: Bookmark,
    /// The auto-generated card; `None` when the bookmark already existed.
    pub card: Option<MemoryCard>,
}

impl CreatedBookmark {
    /// Returns `true` if this call created the bookmark.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.card.is_some()
    }
}

/// Service for bookmark operations.
pub struct BookmarkService {
    pub(super) db: Arc<Database>,
    page_size: usize,
}

impl BookmarkService {
    /// Creates a bookmark service over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size used when [`list_bookmarks`](Self::list_bookmarks)
    /// is called with a zero limit.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Bookmarks an item, or returns the existing bookmark for it.
    ///
    /// A new bookmark starts in `to_review` with zero mastery and fresh
    /// stats, gets a `created` history entry and one auto-generated card
    /// (front = title, back = description). All three writes share one
    /// transaction. If a non-deleted bookmark with the same
    /// `(global_item_id, item_type, item_id)` exists, it is returned with no
    /// card and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the ids are empty or the item type
    /// has no URN mapping, or a store error.
    pub fn create_bookmark(&self, new: &NewBookmark) -> Result<CreatedBookmark> {
        self.create_bookmark_with_cancel(new, &CancellationToken::new())
    }

    /// [`create_bookmark`](Self::create_bookmark) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`create_bookmark`](Self::create_bookmark); also
    /// [`Error::Cancelled`].
    #[instrument(skip(self, new, cancel), fields(item_type = %new.item_type, item_id = %new.item_id))]
    pub fn create_bookmark_with_cancel(
        &self,
        new: &NewBookmark,
        cancel: &CancellationToken,
    ) -> Result<CreatedBookmark> {
        if new.global_item_id.trim().is_empty() {
            return Err(Error::InvalidInput("global_item_id is required".to_string()));
        }
        let urn = Urn::for_item(&new.item_type, &new.item_id, new.source.as_deref())?.to_string();

        let created = self.db.transaction("create_bookmark", cancel, |tx| {
            if let Some(existing) = bookmark_row::find_active_by_key(
                tx,
                &new.global_item_id,
                &new.item_type,
                &new.item_id,
            )? {
                return Ok(CreatedBookmark {
                    bookmark: existing,
                    card: None,
                });
            }

            let now = Utc::now();
            let stamp = format_timestamp(&now);
            let mut metadata = Map::new();
            metadata.insert(META_VIEW_COUNT.to_string(), json!(0));
            metadata.insert(META_STUDY_SESSIONS.to_string(), json!(0));
            metadata.insert(META_LAST_VIEWED.to_string(), json!(stamp));
            metadata.insert(META_FIRST_BOOKMARKED.to_string(), json!(stamp));

            let id = bookmark_row::insert(
                tx,
                &bookmark_row::BookmarkInsert {
                    global_item_id: &new.global_item_id,
                    item_type: &new.item_type,
                    item_id: &new.item_id,
                    urn: &urn,
                    title: &new.title,
                    description: &new.description,
                    metadata: &metadata,
                    now,
                },
            )?;

            history_row::append(
                tx,
                &history_row::HistoryAppend {
                    bookmark_id: id,
                    action: HistoryAction::Created,
                    old_value: "",
                    new_value: LearningState::ToReview.as_str(),
                    timestamp: now,
                },
            )?;

            let card_id = card_row::insert(
                tx,
                &NewCard::new(id, new.title.clone(), new.description.clone()),
                now,
            )?;

            Ok(CreatedBookmark {
                bookmark: bookmark_row::fetch_active(tx, id)?,
                card: card_row::fetch(tx, card_id)?,
            })
        })?;

        if created.is_new() {
            tracing::info!(bookmark_id = %created.bookmark.id, urn = %created.bookmark.urn, "Created bookmark");
        } else {
            tracing::debug!(bookmark_id = %created.bookmark.id, "Bookmark already exists");
        }
        Ok(created)
    }

    /// Fetches a non-deleted bookmark.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist or was deleted.
    pub fn get_bookmark(&self, id: BookmarkId) -> Result<Bookmark> {
        self.db
            .read("get_bookmark", |conn| bookmark_row::fetch_active(conn, id))
    }

    /// Saves a bookmark's mutable fields.
    ///
    /// A changed learning state appends a `learning_state_changed` entry in
    /// the same transaction. `first_bookmarked` is kept from the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or a store error.
    pub fn update_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        self.update_bookmark_with_cancel(bookmark, &CancellationToken::new())
    }

    /// [`update_bookmark`](Self::update_bookmark) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`update_bookmark`](Self::update_bookmark); also
    /// [`Error::Cancelled`].
    pub fn update_bookmark_with_cancel(
        &self,
        bookmark: &Bookmark,
        cancel: &CancellationToken,
    ) -> Result<Bookmark> {
        let saved = self
            .db
            .transaction("update_bookmark", cancel, |tx| {
                let stored = bookmark_row::fetch_active(tx, bookmark.id)?;
                let now = Utc::now();

                let mut next = bookmark.clone();
                next.updated_at = now;
                next.mastery_level = next.mastery_level.clamp(0.0, 1.0);
                match stored.metadata.get(META_FIRST_BOOKMARKED) {
                    Some(first) => {
                        next.metadata
                            .insert(META_FIRST_BOOKMARKED.to_string(), first.clone());
                    },
                    None => {
                        next.metadata.remove(META_FIRST_BOOKMARKED);
                    },
                }
                bookmark_row::save(tx, &next)?;

                if stored.learning_state != next.learning_state {
                    append_state_change(tx, next.id, stored.learning_state, next.learning_state, now)?;
                }
                bookmark_row::fetch_active(tx, next.id)
            })?;

        tracing::info!(bookmark_id = %saved.id, "Updated bookmark");
        Ok(saved)
    }

    /// Sets the learning state, always appending a history entry (also when
    /// the state does not change).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or a store error.
    pub fn update_learning_state(&self, id: BookmarkId, state: LearningState) -> Result<Bookmark> {
        self.update_learning_state_with_cancel(id, state, &CancellationToken::new())
    }

    /// [`update_learning_state`](Self::update_learning_state) with a
    /// cancellation token.
    ///
    /// # Errors
    ///
    /// See [`update_learning_state`](Self::update_learning_state); also
    /// [`Error::Cancelled`].
    pub fn update_learning_state_with_cancel(
        &self,
        id: BookmarkId,
        state: LearningState,
        cancel: &CancellationToken,
    ) -> Result<Bookmark> {
        let (from, bookmark) = self.db.transaction("update_learning_state", cancel, |tx| {
            let mut bookmark = bookmark_row::fetch_active(tx, id)?;
            let now = Utc::now();
            let from = bookmark.learning_state;
            bookmark.learning_state = state;
            bookmark.updated_at = now;
            bookmark_row::save(tx, &bookmark)?;
            append_state_change(tx, id, from, state, now)?;
            Ok((from, bookmark))
        })?;

        tracing::info!(bookmark_id = %id, from = %from, to = %state, "Changed learning state");
        Ok(bookmark)
    }

    /// Soft-deletes a bookmark after appending a `deleted` entry. Its cards,
    /// notes and history stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist or is already deleted.
    pub fn delete_bookmark(&self, id: BookmarkId) -> Result<()> {
        self.delete_bookmark_with_cancel(id, &CancellationToken::new())
    }

    /// [`delete_bookmark`](Self::delete_bookmark) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`delete_bookmark`](Self::delete_bookmark); also
    /// [`Error::Cancelled`].
    pub fn delete_bookmark_with_cancel(
        &self,
        id: BookmarkId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.db
            .transaction("delete_bookmark", cancel, |tx| {
                let bookmark = bookmark_row::fetch_active(tx, id)?;
                let now = Utc::now();
                history_row::append(
                    tx,
                    &history_row::HistoryAppend {
                        bookmark_id: id,
                        action: HistoryAction::Deleted,
                        old_value: bookmark.learning_state.as_str(),
                        new_value: "",
                        timestamp: now,
                    },
                )?;
                bookmark_row::soft_delete(tx, id, now)
            })?;

        tracing::info!(bookmark_id = %id, "Deleted bookmark");
        Ok(())
    }

    /// Adds to the view and study-session counters and refreshes
    /// `last_viewed`, which advances even when both deltas are zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a counter would go negative,
    /// [`Error::NotFound`], or a store error.
    pub fn update_stats(
        &self,
        id: BookmarkId,
        view_delta: i64,
        study_delta: i64,
    ) -> Result<BookmarkStats> {
        self.update_stats_with_cancel(id, view_delta, study_delta, &CancellationToken::new())
    }

    /// [`update_stats`](Self::update_stats) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`update_stats`](Self::update_stats); also [`Error::Cancelled`].
    pub fn update_stats_with_cancel(
        &self,
        id: BookmarkId,
        view_delta: i64,
        study_delta: i64,
        cancel: &CancellationToken,
    ) -> Result<BookmarkStats> {
        let stats = self
            .db
            .transaction("update_stats", cancel, |tx| {
                apply_stats_delta(tx, id, view_delta, study_delta, Utc::now())
            })?;
        tracing::debug!(
            bookmark_id = %id,
            view_count = stats.view_count,
            study_sessions = stats.study_sessions,
            "Updated bookmark stats"
        );
        Ok(stats)
    }

    /// Returns a bookmark's metadata map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or a store error.
    pub fn get_stats(&self, id: BookmarkId) -> Result<Map<String, Value>> {
        Ok(self.get_bookmark(id)?.metadata)
    }

    /// Lists non-deleted bookmarks, newest first, with the total count.
    /// `None` lists every state; a zero `limit` uses the default page size.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_bookmarks(
        &self,
        state: Option<LearningState>,
        offset: usize,
        limit: usize,
    ) -> Result<BookmarkPage> {
        let limit = if limit == 0 { self.page_size } else { limit };
        self.db.read("list_bookmarks", |conn| {
            Ok(BookmarkPage {
                bookmarks: bookmark_row::list(conn, state, offset, limit)?,
                total: bookmark_row::count(conn, state)?,
            })
        })
    }
}

pub(super) fn append_state_change(
    conn: &Connection,
    id: BookmarkId,
    from: LearningState,
    to: LearningState,
    now: DateTime<Utc>,
) -> Result<()> {
    history_row::append(
        conn,
        &history_row::HistoryAppend {
            bookmark_id: id,
            action: HistoryAction::LearningStateChanged,
            old_value: from.as_str(),
            new_value: to.as_str(),
            timestamp: now,
        },
    )?;
    Ok(())
}

/// Read-modify-write of the stats stored in a bookmark's metadata.
pub(super) fn apply_stats_delta(
    conn: &Connection,
    id: BookmarkId,
    view_delta: i64,
    study_delta: i64,
    now: DateTime<Utc>,
) -> Result<BookmarkStats> {
    let mut bookmark = bookmark_row::fetch_active(conn, id)?;
    let stats = bookmark.stats();

    let view_count = checked_counter(META_VIEW_COUNT, stats.view_count, view_delta)?;
    let study_sessions = checked_counter(META_STUDY_SESSIONS, stats.study_sessions, study_delta)?;

    // last_viewed must move forward even when two updates share a clock tick.
    let previous = parse_optional_timestamp(stats.last_viewed.as_deref()).unwrap_or(None);
    let last_viewed = match previous {
        Some(prev) if prev >= now => prev + Duration::nanoseconds(1),
        _ => now,
    };

    let metadata = &mut bookmark.metadata;
    metadata.insert(META_VIEW_COUNT.to_string(), json!(view_count));
    metadata.insert(META_STUDY_SESSIONS.to_string(), json!(study_sessions));
    metadata.insert(
        META_LAST_VIEWED.to_string(),
        json!(format_timestamp(&last_viewed)),
    );
    bookmark.updated_at = now;
    bookmark_row::save(conn, &bookmark)?;

    Ok(bookmark.stats())
}

fn checked_counter(name: &str, current: i64, delta: i64) -> Result<i64> {
    current
        .checked_add(delta)
        .filter(|n| *n >= 0)
        .ok_or_else(|| Error::InvalidInput(format!("{name} cannot become negative")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardStatus;

    fn service() -> BookmarkService {
        BookmarkService::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn cve() -> NewBookmark {
        NewBookmark::new("g", "CVE", "CVE-2024-0001", "T", "D")
    }

    #[test]
    fn test_create_bookmark() {
        let service = service();
        let created = service.create_bookmark(&cve()).unwrap();
        assert!(created.is_new());

        let bookmark = &created.bookmark;
        assert_eq!(bookmark.learning_state, LearningState::ToReview);
        assert_eq!(bookmark.urn, "v2e::nvd::cve::CVE-2024-0001");
        assert!(bookmark.mastery_level.abs() < f64::EPSILON);

        let card = created.card.unwrap();
        assert_eq!(card.front, "T");
        assert_eq!(card.back, "D");
        assert_eq!(card.status, CardStatus::New);
        assert_eq!(card.content, "{}");
        assert_eq!(card.version, 1);

        let stats = bookmark.stats();
        assert_eq!(stats.view_count, 0);
        assert_eq!(stats.study_sessions, 0);
        assert_eq!(stats.last_viewed, stats.first_bookmarked);
    }

    #[test]
    fn test_create_bookmark_is_idempotent() {
        let service = service();
        let first = service.create_bookmark(&cve()).unwrap();
        let second = service.create_bookmark(&cve()).unwrap();
        assert_eq!(first.bookmark.id, second.bookmark.id);
        assert!(second.card.is_none());
        assert_eq!(service.get_history(first.bookmark.id).unwrap().len(), 1);
    }

    #[test]
    fn test_create_bookmark_rejects_unknown_type() {
        let service = service();
        let result = service.create_bookmark(&NewBookmark::new("g", "blog", "x", "T", "D"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(service.list_bookmarks(None, 0, 10).unwrap().total, 0);
    }

    #[test]
    fn test_update_learning_state_always_appends() {
        let service = service();
        let id = service.create_bookmark(&cve()).unwrap().bookmark.id;
        service
            .update_learning_state(id, LearningState::ToReview)
            .unwrap();
        let history = service.get_history(id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::LearningStateChanged);
    }

    #[test]
    fn test_update_bookmark_records_state_change_only() {
        let service = service();
        let mut bookmark = service.create_bookmark(&cve()).unwrap().bookmark;

        bookmark.title = "Renamed".to_string();
        let saved = service.update_bookmark(&bookmark).unwrap();
        assert_eq!(saved.title, "Renamed");
        assert_eq!(service.get_history(bookmark.id).unwrap().len(), 1);

        bookmark.learning_state = LearningState::Learning;
        service.update_bookmark(&bookmark).unwrap();
        let history = service.get_history(bookmark.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].old_value, "to_review");
        assert_eq!(history[0].new_value, "learning");
    }

    #[test]
    fn test_update_bookmark_keeps_first_bookmarked() {
        let service = service();
        let mut bookmark = service.create_bookmark(&cve()).unwrap().bookmark;
        let first = bookmark.stats().first_bookmarked;
        bookmark
            .metadata
            .insert(META_FIRST_BOOKMARKED.to_string(), json!("1999-01-01T00:00:00Z"));
        let saved = service.update_bookmark(&bookmark).unwrap();
        assert_eq!(saved.stats().first_bookmarked, first);
    }

    #[test]
    fn test_update_stats_zero_deltas_advance_last_viewed() {
        let service = service();
        let bookmark = service.create_bookmark(&cve()).unwrap().bookmark;
        let before = bookmark.stats();

        let after = service.update_stats(bookmark.id, 0, 0).unwrap();
        assert_eq!(after.view_count, 0);
        assert_eq!(after.study_sessions, 0);
        assert_eq!(after.first_bookmarked, before.first_bookmarked);
        assert!(after.last_viewed > before.last_viewed);

        let again = service.update_stats(bookmark.id, 2, 1).unwrap();
        assert_eq!(again.view_count, 2);
        assert_eq!(again.study_sessions, 1);
        assert!(again.last_viewed > after.last_viewed);
    }

    #[test]
    fn test_update_stats_rejects_negative_counters() {
        let service = service();
        let id = service.create_bookmark(&cve()).unwrap().bookmark.id;
        assert!(matches!(
            service.update_stats(id, -1, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_delete_bookmark() {
        let service = service();
        let id = service.create_bookmark(&cve()).unwrap().bookmark.id;
        service.delete_bookmark(id).unwrap();

        assert!(matches!(
            service.get_bookmark(id),
            Err(Error::NotFound { .. })
        ));
        let history = service.get_history(id).unwrap();
        assert_eq!(history[0].action, HistoryAction::Deleted);
        assert_eq!(history[0].old_value, "to_review");

        // A deleted bookmark frees its key.
        let again = service.create_bookmark(&cve()).unwrap();
        assert_ne!(again.bookmark.id, id);
        assert!(again.is_new());
    }

    #[test]
    fn test_list_bookmarks() {
        let service = service();
        for i in 0..3 {
            service
                .create_bookmark(&NewBookmark::new("g", "CWE", format!("CWE-{i}"), "T", "D"))
                .unwrap();
        }
        let first = service.list_bookmarks(None, 0, 2).unwrap();
        assert_eq!(first.bookmarks.len(), 2);
        assert_eq!(first.total, 3);

        let id = first.bookmarks[0].id;
        service
            .update_learning_state(id, LearningState::Mastered)
            .unwrap();
        let mastered = service
            .list_bookmarks(Some(LearningState::Mastered), 0, 0)
            .unwrap();
        assert_eq!(mastered.total, 1);
        assert_eq!(mastered.bookmarks[0].id, id);
    }

    #[test]
    fn test_get_stats_returns_metadata() {
        let service = service();
        let id = service.create_bookmark(&cve()).unwrap().bookmark.id;
        let stats = service.get_stats(id).unwrap();
        assert_eq!(stats.get(META_VIEW_COUNT), Some(&json!(0)));
        assert!(stats.contains_key(META_FIRST_BOOKMARKED));
    }
}
