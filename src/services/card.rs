//! Versioned memory card store.
//!
//! Every mutation follows the same check-and-set protocol inside one
//! transaction:
//!
//! 1. Load the card.
//! 2. Compare the caller's expected version, if any.
//! 3. Check the status change against the FSM.
//! 4. `UPDATE ... WHERE id = ? AND version = ?`; zero rows is a conflict.
//! 5. The version is bumped by exactly one.
//!
//! [`CardService::apply_review`] wraps the SM-2 scheduler, the card update,
//! the bookmark history entry and the mastery recompute in one transaction.

use super::scheduler::{self, MasteryThresholds, SchedulingState};
use crate::cancel::CancellationToken;
use crate::models::{
    Bookmark, BookmarkId, CardFilter, CardId, CardPatch, CardStatus, EMPTY_CONTENT,
    HistoryAction, LearningState, MemoryCard, NewCard, Rating, validate_document,
};
use crate::storage::Database;
use crate::storage::sqlite::{bookmark_row, card_row, history_row};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

/// Result of a committed review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    /// The card after the review.
    pub card: MemoryCard,
    /// Status before the review.
    pub previous_status: CardStatus,
    /// Owning bookmark's mastery after the recompute.
    pub mastery_level: f64,
    /// Owning bookmark's learning state after the recompute.
    pub learning_state: LearningState,
}

/// Service for memory card operations.
pub struct CardService {
    db: Arc<Database>,
    thresholds: MasteryThresholds,
}

impl CardService {
    /// Creates a card service over `db` with default mastery thresholds.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            thresholds: MasteryThresholds::default(),
        }
    }

    /// Replaces the mastery thresholds used after reviews.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: MasteryThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Creates a card in the `new` state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the content is not `"{}"` and fails
    /// document validation, [`Error::NotFound`] if the bookmark does not
    /// exist, or a store error.
    pub fn create(&self, card: &NewCard) -> Result<MemoryCard> {
        self.create_with_cancel(card, &CancellationToken::new())
    }

    /// [`create`](Self::create) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create); also [`Error::Cancelled`].
    pub fn create_with_cancel(
        &self,
        card: &NewCard,
        cancel: &CancellationToken,
    ) -> Result<MemoryCard> {
        if card.content.trim() != EMPTY_CONTENT {
            validate_document(&card.content)?;
        }

        let created = self.db.transaction("create_card", cancel, |tx| {
            bookmark_row::fetch_active(tx, card.bookmark_id)?;
            let id = card_row::insert(tx, card, Utc::now())?;
            load(tx, id)
        })?;

        tracing::info!(card_id = %created.id, bookmark_id = %created.bookmark_id, "Created card");
        Ok(created)
    }

    /// Fetches a card by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the card does not exist.
    pub fn get(&self, id: CardId) -> Result<MemoryCard> {
        self.db.read("get_card", |conn| load(conn, id))
    }

    /// Fetches a card by URN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no card has that URN.
    pub fn get_by_urn(&self, urn: &str) -> Result<MemoryCard> {
        self.db.read("get_card_by_urn", |conn| {
            card_row::fetch_by_urn(conn, urn)?.ok_or_else(|| Error::not_found("memory_card", urn))
        })
    }

    /// Lists a bookmark's cards.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_by_bookmark(&self, bookmark_id: BookmarkId) -> Result<Vec<MemoryCard>> {
        self.list(&CardFilter::new().with_bookmark(bookmark_id))
    }

    /// Lists cards matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list(&self, filter: &CardFilter) -> Result<Vec<MemoryCard>> {
        self.db.read("list_cards", |conn| card_row::list(conn, filter))
    }

    /// Returns up to `limit` cards due at `now`, soonest first. Archived and
    /// mastered cards are never due.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn due_cards(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<MemoryCard>> {
        self.db.read("due_cards", |conn| card_row::due(conn, now, limit))
    }

    /// Applies a loose field bag to a card.
    ///
    /// A `status` key goes through the FSM before any other field is
    /// written; all fields land in one versioned update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown keys, wrong value types,
    /// an empty bag or invalid content, [`Error::ConcurrentUpdate`] on a
    /// version mismatch, [`Error::InvalidTransition`] if the FSM denies the
    /// status, or [`Error::NotFound`].
    pub fn update_fields(
        &self,
        id: CardId,
        expected_version: Option<i64>,
        fields: &Map<String, Value>,
    ) -> Result<MemoryCard> {
        self.update_fields_with_cancel(id, expected_version, fields, &CancellationToken::new())
    }

    /// [`update_fields`](Self::update_fields) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`update_fields`](Self::update_fields); also [`Error::Cancelled`].
    pub fn update_fields_with_cancel(
        &self,
        id: CardId,
        expected_version: Option<i64>,
        fields: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<MemoryCard> {
        let patch = CardPatch::from_fields(fields)?;
        if patch.is_empty() {
            return Err(Error::InvalidInput("no card fields to update".to_string()));
        }
        if let Some(content) = patch.content.as_deref().filter(|c| c.trim() != EMPTY_CONTENT) {
            validate_document(content)?;
        }

        let updated = self.db.transaction("update_card_fields", cancel, |tx| {
            let mut card = load(tx, id)?;
            check_expected_version(&card, expected_version)?;
            if let Some(target) = patch.status {
                check_transition(card.status, target)?;
                card.status = target;
            }
            patch.apply_fields(&mut card);
            card.updated_at = Utc::now();
            commit(tx, card)
        })?;

        tracing::info!(card_id = %id, version = updated.version, "Updated card fields");
        Ok(updated)
    }

    /// Moves a card to `target` under the check-and-set protocol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentUpdate`] if `expected_version` is stale or
    /// another writer commits first, [`Error::InvalidTransition`] if the FSM
    /// denies the change, or [`Error::NotFound`].
    pub fn transition_status(
        &self,
        id: CardId,
        expected_version: Option<i64>,
        target: CardStatus,
    ) -> Result<MemoryCard> {
        self.transition_status_with_cancel(id, expected_version, target, &CancellationToken::new())
    }

    /// [`transition_status`](Self::transition_status) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`transition_status`](Self::transition_status); also
    /// [`Error::Cancelled`].
    #[instrument(skip(self, cancel), fields(card_id = %id, target = %target))]
    pub fn transition_status_with_cancel(
        &self,
        id: CardId,
        expected_version: Option<i64>,
        target: CardStatus,
        cancel: &CancellationToken,
    ) -> Result<MemoryCard> {
        let (from, updated) = self.db.transaction("transition_card_status", cancel, |tx| {
            let mut card = load(tx, id)?;
            check_expected_version(&card, expected_version)?;
            let from = card.status;
            check_transition(from, target)?;
            card.status = target;
            card.updated_at = Utc::now();
            Ok((from, commit(tx, card)?))
        })?;

        tracing::info!(
            from = %from,
            to = %updated.status,
            version = updated.version,
            "Transitioned card status"
        );
        Ok(updated)
    }

    /// Rates a card and commits the SM-2 result.
    ///
    /// In one transaction: schedules the review, writes the card with a
    /// bumped version, appends a `reviewed` entry to the owning bookmark's
    /// history, refreshes the bookmark's review timestamps and recomputes
    /// its mastery.
    ///
    /// A proposed status that is not a direct FSM edge is accepted when the
    /// card could reach it through `due`/`reviewed` (a `learning` card rated
    /// into `reviewed` passes through `due`); otherwise the review fails
    /// with [`Error::InvalidTransition`] and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::InvalidTransition`],
    /// [`Error::ConcurrentUpdate`] or a store error.
    pub fn apply_review(&self, id: CardId, rating: Rating) -> Result<ReviewResult> {
        self.apply_review_with_cancel(id, rating, &CancellationToken::new())
    }

    /// [`apply_review`](Self::apply_review) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`apply_review`](Self::apply_review); also [`Error::Cancelled`].
    #[instrument(skip(self, cancel), fields(card_id = %id, rating = %rating))]
    pub fn apply_review_with_cancel(
        &self,
        id: CardId,
        rating: Rating,
        cancel: &CancellationToken,
    ) -> Result<ReviewResult> {
        let result = self.db.transaction("apply_review", cancel, |tx| {
            let now = Utc::now();
            let mut card = load(tx, id)?;
            let previous_status = card.status;

            let outcome = scheduler::schedule(
                &SchedulingState {
                    interval_days: card.interval_days,
                    ease_factor: card.ease_factor,
                    repetition: card.repetition,
                    status: card.status,
                },
                rating,
                now,
            );

            let next_status = outcome.proposed_status;
            if previous_status.review_path(next_status).is_none() {
                return Err(reject_transition(previous_status, next_status));
            }

            card.interval_days = outcome.interval_days;
            card.ease_factor = outcome.ease_factor;
            card.repetition = outcome.repetition;
            card.next_review = Some(outcome.next_review);
            card.status = next_status;
            card.updated_at = now;
            let card = commit(tx, card)?;

            history_row::append(
                tx,
                &history_row::HistoryAppend {
                    bookmark_id: card.bookmark_id,
                    action: HistoryAction::Reviewed,
                    old_value: previous_status.as_str(),
                    new_value: card.status.as_str(),
                    timestamp: now,
                },
            )?;

            let bookmark = refresh_bookmark(tx, &card, &self.thresholds, now)?;
            Ok(ReviewResult {
                previous_status,
                mastery_level: bookmark.mastery_level,
                learning_state: bookmark.learning_state,
                card,
            })
        })?;

        metrics::counter!("card_reviews_total", "rating" => rating.as_str()).increment(1);
        tracing::info!(
            from = %result.previous_status,
            to = %result.card.status,
            interval_days = result.card.interval_days,
            repetition = result.card.repetition,
            mastery = result.mastery_level,
            "Applied review"
        );
        Ok(result)
    }

    /// Deletes a card.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the card does not exist.
    pub fn delete(&self, id: CardId) -> Result<()> {
        self.delete_with_cancel(id, &CancellationToken::new())
    }

    /// [`delete`](Self::delete) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`delete`](Self::delete); also [`Error::Cancelled`].
    pub fn delete_with_cancel(&self, id: CardId, cancel: &CancellationToken) -> Result<()> {
        self.db.transaction("delete_card", cancel, |tx| {
            if card_row::delete(tx, id)? {
                Ok(())
            } else {
                Err(Error::not_found("memory_card", id))
            }
        })?;
        tracing::info!(card_id = %id, "Deleted card");
        Ok(())
    }
}

fn load(conn: &Connection, id: CardId) -> Result<MemoryCard> {
    card_row::fetch(conn, id)?.ok_or_else(|| Error::not_found("memory_card", id))
}

fn check_expected_version(card: &MemoryCard, expected: Option<i64>) -> Result<()> {
    match expected {
        Some(expected) if expected != card.version => Err(conflict(card.id, expected)),
        _ => Ok(()),
    }
}

fn check_transition(from: CardStatus, to: CardStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(reject_transition(from, to))
    }
}

fn reject_transition(from: CardStatus, to: CardStatus) -> Error {
    metrics::counter!("card_transitions_rejected_total").increment(1);
    Error::InvalidTransition { from, to }
}

fn conflict(id: CardId, expected: i64) -> Error {
    metrics::counter!("card_cas_conflicts_total").increment(1);
    Error::ConcurrentUpdate {
        entity: "memory_card",
        id: id.get(),
        expected,
    }
}

/// Writes `card` predicated on its loaded version and returns it with the
/// bumped version.
fn commit(conn: &Connection, mut card: MemoryCard) -> Result<MemoryCard> {
    if !card_row::cas_update(conn, &card, card.version)? {
        return Err(conflict(card.id, card.version));
    }
    card.version += 1;
    Ok(card)
}

/// Refreshes the owning bookmark after a review: review timestamps, mastery
/// and, when the mastery crosses a threshold, the learning state.
fn refresh_bookmark(
    conn: &Connection,
    card: &MemoryCard,
    thresholds: &MasteryThresholds,
    now: DateTime<Utc>,
) -> Result<Bookmark> {
    let mut bookmark = bookmark_row::fetch(conn, card.bookmark_id)?
        .ok_or_else(|| Error::not_found("bookmark", card.bookmark_id))?;
    if bookmark.is_deleted() {
        return Ok(bookmark);
    }

    let previous_state = bookmark.learning_state;
    if let Some(average) = card_row::average_ease(conn, bookmark.id)? {
        bookmark.mastery_level = scheduler::mastery_from_ease(average);
        bookmark.learning_state = thresholds.state_for(bookmark.mastery_level, previous_state);
    }
    bookmark.last_reviewed = Some(now);
    bookmark.next_review = card.next_review;
    bookmark.updated_at = now;
    bookmark_row::save(conn, &bookmark)?;

    if bookmark.learning_state != previous_state {
        history_row::append(
            conn,
            &history_row::HistoryAppend {
                bookmark_id: bookmark.id,
                action: HistoryAction::LearningStateChanged,
                old_value: previous_state.as_str(),
                new_value: bookmark.learning_state.as_str(),
                timestamp: now,
            },
        )?;
    }
    Ok(bookmark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBookmark;
    use crate::services::BookmarkService;
    use serde_json::json;

    fn setup() -> (CardService, MemoryCard) {
        let db = Arc::new(Database::in_memory().unwrap());
        let bookmarks = BookmarkService::new(Arc::clone(&db));
        let created = bookmarks
            .create_bookmark(&NewBookmark::new("g", "CVE", "CVE-2024-0001", "T", "D"))
            .unwrap();
        (CardService::new(db), created.card.unwrap())
    }

    fn bag(value: &Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_and_get_by_urn() {
        let (cards, card) = setup();
        assert_eq!(cards.get(card.id).unwrap(), card);
        assert_eq!(cards.get_by_urn(&card.urn).unwrap().id, card.id);
        assert!(matches!(
            cards.get(CardId(999)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_assigns_urn() {
        let (cards, card) = setup();
        let created = cards
            .create(&NewCard::new(card.bookmark_id, "Q", "A").with_author("alice"))
            .unwrap();
        assert_eq!(created.urn, format!("v2e::card::{}", created.id));
        assert_eq!(created.version, 1);
        assert_eq!(created.status, CardStatus::New);
        assert_eq!(cards.list_by_bookmark(card.bookmark_id).unwrap().len(), 2);
    }

    #[test]
    fn test_create_validates_content() {
        let (cards, card) = setup();
        let bad = NewCard::new(card.bookmark_id, "Q", "A").with_content(r#"{"type":"video"}"#);
        assert!(matches!(cards.create(&bad), Err(Error::InvalidInput(_))));

        let good = NewCard::new(card.bookmark_id, "Q", "A")
            .with_content(r#"{"type":"doc","content":[{"type":"paragraph"}]}"#);
        assert!(cards.create(&good).is_ok());
    }

    #[test]
    fn test_create_for_missing_bookmark() {
        let (cards, _) = setup();
        let result = cards.create(&NewCard::new(BookmarkId(42), "Q", "A"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_transition_bumps_version() {
        let (cards, card) = setup();
        let moved = cards
            .transition_status(card.id, Some(1), CardStatus::Learning)
            .unwrap();
        assert_eq!(moved.status, CardStatus::Learning);
        assert_eq!(moved.version, 2);
        assert_eq!(cards.get(card.id).unwrap().version, 2);
    }

    #[test]
    fn test_same_state_transition_still_bumps_version() {
        let (cards, card) = setup();
        let same = cards
            .transition_status(card.id, None, CardStatus::New)
            .unwrap();
        assert_eq!(same.version, 2);
    }

    #[test]
    fn test_stale_version_is_rejected() {
        let (cards, card) = setup();
        cards
            .transition_status(card.id, Some(1), CardStatus::Learning)
            .unwrap();
        let err = cards
            .transition_status(card.id, Some(1), CardStatus::Archived)
            .unwrap_err();
        assert!(matches!(err, Error::ConcurrentUpdate { expected: 1, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let (cards, card) = setup();
        let err = cards
            .transition_status(card.id, None, CardStatus::Mastered)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: CardStatus::New,
                to: CardStatus::Mastered
            }
        ));
        assert_eq!(cards.get(card.id).unwrap().version, 1);
    }

    #[test]
    fn test_update_fields_routes_status_through_fsm() {
        let (cards, card) = setup();
        let updated = cards
            .update_fields(
                card.id,
                Some(1),
                &bag(&json!({"status": "in-progress", "front": "Q2", "is_private": true})),
            )
            .unwrap();
        assert_eq!(updated.status, CardStatus::Learning);
        assert_eq!(updated.front, "Q2");
        assert!(updated.is_private);
        assert_eq!(updated.version, 2);

        let err = cards
            .update_fields(card.id, None, &bag(&json!({"status": "new", "back": "x"})))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(cards.get(card.id).unwrap().back, "D");
    }

    #[test]
    fn test_update_fields_rejects_empty_and_unknown() {
        let (cards, card) = setup();
        assert!(matches!(
            cards.update_fields(card.id, None, &Map::new()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            cards.update_fields(card.id, None, &bag(&json!({"version": 7}))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_review_updates_card_and_bookmark() {
        let (cards, card) = setup();
        let result = cards.apply_review(card.id, Rating::Good).unwrap();
        assert_eq!(result.previous_status, CardStatus::New);
        assert_eq!(result.card.status, CardStatus::Learning);
        assert_eq!(result.card.repetition, 1);
        assert_eq!(result.card.interval_days, 1);
        assert_eq!(result.card.version, 2);
        assert!(result.card.next_review.is_some());
        assert_eq!(result.learning_state, LearningState::Learning);
        assert!((result.mastery_level - 1.2 / 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_review_of_archived_card_is_rejected() {
        let (cards, card) = setup();
        cards
            .transition_status(card.id, None, CardStatus::Archived)
            .unwrap();
        let err = cards.apply_review(card.id, Rating::Easy).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(cards.get(card.id).unwrap().repetition, 0);
    }

    #[test]
    fn test_due_cards_skip_archived() {
        let (cards, card) = setup();
        cards.apply_review(card.id, Rating::Good).unwrap();
        let later = Utc::now() + chrono::Duration::days(2);
        assert_eq!(cards.due_cards(later, 10).unwrap().len(), 1);
        assert!(cards.due_cards(Utc::now(), 10).unwrap().is_empty());

        let current = cards.get(card.id).unwrap();
        cards
            .transition_status(current.id, None, CardStatus::Archived)
            .unwrap();
        assert!(cards.due_cards(later, 10).unwrap().is_empty());
    }

    #[test]
    fn test_list_with_filters() {
        let (cards, card) = setup();
        cards
            .create(&NewCard::new(card.bookmark_id, "Q", "A").with_author("alice"))
            .unwrap();
        let by_author = cards
            .list(&CardFilter {
                author: Some("alice".to_string()),
                ..CardFilter::default()
            })
            .unwrap();
        assert_eq!(by_author.len(), 1);

        let by_status = cards
            .list(&CardFilter::new().with_status(CardStatus::New).with_page(1, 10))
            .unwrap();
        assert_eq!(by_status.len(), 1);
    }

    #[test]
    fn test_delete() {
        let (cards, card) = setup();
        cards.delete(card.id).unwrap();
        assert!(matches!(cards.get(card.id), Err(Error::NotFound { .. })));
        assert!(matches!(cards.delete(card.id), Err(Error::NotFound { .. })));
    }
}
