//! End-to-end study scenarios.
//!
//! Each test drives the public services against a fresh in-memory store:
//! - Bookmark creation with its auto-created card
//! - SM-2 reviews through to mastery
//! - Revert of the learning state
//! - BFS/DFS navigation handover

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, Utc};
use std::sync::Arc;
use v2e_study::models::{
    CardStatus, HistoryAction, LearningState, NewBookmark, NewCrossReference, Rating,
};
use v2e_study::navigation::{ItemContext, LearningItem, StrategyKind, StrategyManager};
use v2e_study::services::{
    BookmarkService, CardService, CrossReferenceService, NoteService, RevertTarget,
    SessionService,
};
use v2e_study::{Database, Error};

fn services() -> (Arc<Database>, BookmarkService, CardService) {
    let db = Arc::new(Database::in_memory().expect("in-memory database"));
    let bookmarks = BookmarkService::new(Arc::clone(&db));
    let cards = CardService::new(Arc::clone(&db));
    (db, bookmarks, cards)
}

fn cve() -> NewBookmark {
    NewBookmark::new("g", "CVE", "CVE-2024-0001", "T", "D")
}

// ============================================================================
// Bookmarks and cards
// ============================================================================

#[test]
fn test_create_bookmark_with_card() {
    let (_, bookmarks, _) = services();

    let created = bookmarks.create_bookmark(&cve()).unwrap();
    assert!(created.is_new());

    let bookmark = &created.bookmark;
    assert_eq!(bookmark.learning_state, LearningState::ToReview);
    assert_eq!(bookmark.urn, "v2e::nvd::cve::CVE-2024-0001");

    let card = created.card.as_ref().expect("auto-created card");
    assert_eq!(card.front, "T");
    assert_eq!(card.back, "D");
    assert_eq!(card.status, CardStatus::New);
    assert_eq!(card.version, 1);
    assert_eq!(card.bookmark_id, bookmark.id);

    let history = bookmarks.get_history(bookmark.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::Created);
    assert_eq!(history[0].new_value, "to_review");

    let stats = bookmark.stats();
    assert_eq!(stats.view_count, 0);
    assert_eq!(stats.study_sessions, 0);
    assert!(stats.last_viewed.is_some());
    assert_eq!(stats.last_viewed, stats.first_bookmarked);
}

#[test]
fn test_create_bookmark_is_idempotent() {
    let (_, bookmarks, cards) = services();

    let first = bookmarks.create_bookmark(&cve()).unwrap();
    let second = bookmarks.create_bookmark(&cve()).unwrap();

    assert!(!second.is_new());
    assert!(second.card.is_none());
    assert_eq!(first.bookmark.id, second.bookmark.id);
    assert_eq!(cards.list_by_bookmark(first.bookmark.id).unwrap().len(), 1);
    assert_eq!(bookmarks.get_history(first.bookmark.id).unwrap().len(), 1);
}

#[test]
fn test_first_review() {
    let (_, bookmarks, cards) = services();
    let card = bookmarks.create_bookmark(&cve()).unwrap().card.unwrap();

    let before = Utc::now();
    let result = cards.apply_review(card.id, Rating::Good).unwrap();
    let after = Utc::now();

    let reviewed = &result.card;
    assert_eq!(result.previous_status, CardStatus::New);
    assert_eq!(reviewed.repetition, 1);
    assert_eq!(reviewed.interval_days, 1);
    assert!((reviewed.ease_factor - 2.5).abs() < f64::EPSILON);
    assert_eq!(reviewed.status, CardStatus::Learning);
    assert_eq!(reviewed.version, 2);

    let next = reviewed.next_review.expect("next review set");
    assert!(next >= before + Duration::days(1));
    assert!(next <= after + Duration::days(1));
}

#[test]
fn test_five_good_reviews_reach_mastery() {
    let (_, bookmarks, cards) = services();
    let created = bookmarks.create_bookmark(&cve()).unwrap();
    let card = created.card.unwrap();

    let mut intervals = Vec::new();
    let mut statuses = Vec::new();
    for _ in 0..5 {
        let result = cards.apply_review(card.id, Rating::Good).unwrap();
        intervals.push(result.card.interval_days);
        statuses.push(result.card.status);
    }

    assert_eq!(intervals, vec![1, 3, 7, 17, 42]);
    assert_eq!(
        statuses,
        vec![
            CardStatus::Learning,
            CardStatus::Reviewed,
            CardStatus::Learning,
            CardStatus::Reviewed,
            CardStatus::Mastered,
        ]
    );

    let card = cards.get(card.id).unwrap();
    assert_eq!(card.repetition, 5);
    assert_eq!(card.version, 6);

    // Every review is logged on the owning bookmark.
    let reviews = bookmarks
        .get_history(created.bookmark.id)
        .unwrap()
        .into_iter()
        .filter(|entry| entry.action == HistoryAction::Reviewed)
        .count();
    assert_eq!(reviews, 5);
}

#[test]
fn test_review_of_mastered_card_is_rejected() {
    let (_, bookmarks, cards) = services();
    let card = bookmarks.create_bookmark(&cve()).unwrap().card.unwrap();
    for _ in 0..5 {
        cards.apply_review(card.id, Rating::Good).unwrap();
    }

    let err = cards.apply_review(card.id, Rating::Again).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            from: CardStatus::Mastered,
            to: CardStatus::Reviewed,
        }
    ));
    assert_eq!(cards.get(card.id).unwrap().version, 6);
}

#[test]
fn test_archived_card_is_terminal() {
    let (_, bookmarks, cards) = services();
    let card = bookmarks.create_bookmark(&cve()).unwrap().card.unwrap();

    let archived = cards
        .transition_status(card.id, Some(1), CardStatus::Archived)
        .unwrap();
    assert_eq!(archived.version, 2);

    let err = cards
        .transition_status(card.id, None, CardStatus::Learning)
        .unwrap_err();
    assert_eq!(err.kind().as_str(), "invalid_transition");
    assert!(!err.is_retryable());
}

// ============================================================================
// History and revert
// ============================================================================

#[test]
fn test_revert_undoes_last_state_change() {
    let (_, bookmarks, _) = services();
    let id = bookmarks.create_bookmark(&cve()).unwrap().bookmark.id;

    bookmarks
        .update_learning_state(id, LearningState::Learning)
        .unwrap();
    bookmarks
        .update_learning_state(id, LearningState::Mastered)
        .unwrap();

    let reverted = bookmarks.revert(id, &RevertTarget::Latest).unwrap();
    assert_eq!(reverted.learning_state, LearningState::Learning);

    let history = bookmarks.get_history(id).unwrap();
    let steps: Vec<(HistoryAction, &str, &str)> = history
        .iter()
        .map(|e| (e.action, e.old_value.as_str(), e.new_value.as_str()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (HistoryAction::StateReverted, "mastered", "learning"),
            (HistoryAction::LearningStateChanged, "learning", "mastered"),
            (HistoryAction::LearningStateChanged, "to_review", "learning"),
            (HistoryAction::Created, "", "to_review"),
        ]
    );
}

#[test]
fn test_revert_before_history() {
    let (_, bookmarks, _) = services();
    let id = bookmarks.create_bookmark(&cve()).unwrap().bookmark.id;

    let long_ago = Utc::now() - Duration::days(365);
    let err = bookmarks
        .revert(id, &RevertTarget::At(long_ago))
        .unwrap_err();
    assert!(matches!(err, Error::NoHistoryBeforeTimestamp { .. }));

    let err = bookmarks
        .revert(id, &RevertTarget::Text("last tuesday".to_string()))
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_history_survives_soft_delete() {
    let (_, bookmarks, _) = services();
    let id = bookmarks.create_bookmark(&cve()).unwrap().bookmark.id;
    bookmarks.delete_bookmark(id).unwrap();

    assert!(matches!(
        bookmarks.get_bookmark(id),
        Err(Error::NotFound { .. })
    ));
    let history = bookmarks.get_history(id).unwrap();
    assert_eq!(history[0].action, HistoryAction::Deleted);

    // The key is free again once the old bookmark is deleted.
    let again = bookmarks.create_bookmark(&cve()).unwrap();
    assert!(again.is_new());
    assert_ne!(again.bookmark.id, id);
}

#[test]
fn test_note_appends_history() {
    let (db, bookmarks, _) = services();
    let notes = NoteService::new(Arc::clone(&db));
    let id = bookmarks.create_bookmark(&cve()).unwrap().bookmark.id;

    let body = r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"Check the patch"}]}]}"#;
    let note = notes.create_note(id, body, Some("alice"), false).unwrap();
    assert_eq!(note.urn, format!("v2e::note::{}", note.id));
    assert_eq!(note.fsm_state, "draft");

    let history = bookmarks.get_history(id).unwrap();
    assert_eq!(history[0].action, HistoryAction::NoteAdded);

    let bad = r#"{"type":"doc","content":[{"type":"marquee"}]}"#;
    assert!(matches!(
        notes.create_note(id, bad, None, false),
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(notes.list_notes(id).unwrap().len(), 1);
}

// ============================================================================
// Navigation
// ============================================================================

fn abc() -> Vec<LearningItem> {
    vec![
        LearningItem::new("cve", "CVE-2024-0001", "A").unwrap(),
        LearningItem::new("cwe", "CWE-79", "B").unwrap(),
        LearningItem::new("capec", "CAPEC-63", "C").unwrap(),
    ]
}

#[test]
fn test_depth_first_detour_returns_to_breadth_first() {
    let items = abc();
    let (a, b, c) = (&items[0].urn, &items[1].urn, &items[2].urn);
    let manager = StrategyManager::new(items.clone());

    let first = manager.get_next_item().unwrap().unwrap();
    assert_eq!(&first.urn, a);
    assert_eq!(first.context, ItemContext::List);
    manager.mark_viewed(a);

    manager.follow_link(a, b).unwrap();
    assert_eq!(manager.current_strategy(), StrategyKind::Dfs);
    assert_eq!(manager.path_stack(), vec![a.clone()]);

    let deep = manager.get_next_item().unwrap().unwrap();
    assert_eq!(&deep.urn, b);
    assert_eq!(deep.context, ItemContext::DeepDive);

    let back = manager.go_back().unwrap().unwrap();
    assert_eq!(&back.urn, a);
    assert_eq!(back.context, ItemContext::DeepDive);

    let next = manager.get_next_item().unwrap().unwrap();
    assert_eq!(&next.urn, c);
    assert_eq!(manager.current_strategy(), StrategyKind::Bfs);

    manager.mark_viewed(c);
    assert_eq!(manager.get_next_item().unwrap(), None);
}

#[test]
fn test_chained_follows_backtrack_each_origin_once() {
    let items = abc();
    let (a, b, c) = (&items[0].urn, &items[1].urn, &items[2].urn);
    let manager = StrategyManager::new(items.clone());

    manager.follow_link(a, b).unwrap();
    manager.follow_link(b, c).unwrap();
    assert_eq!(manager.path_stack(), vec![a.clone(), b.clone()]);

    let deep = manager.get_next_item().unwrap().unwrap();
    assert_eq!(&deep.urn, c);
    assert_eq!(deep.context, ItemContext::DeepDive);

    let mut trail = Vec::new();
    while let Some(item) = manager.go_back().unwrap() {
        assert_eq!(item.context, ItemContext::DeepDive);
        trail.push(item.urn);
    }
    assert_eq!(trail, vec![b.clone(), a.clone()]);
    assert!(manager.path_stack().is_empty());
    assert_eq!(manager.current_strategy(), StrategyKind::Bfs);
}

#[test]
fn test_go_back_right_after_follow_returns_origin() {
    let items = abc();
    let (a, b) = (&items[0].urn, &items[1].urn);
    let manager = StrategyManager::new(items.clone());

    manager.follow_link(a, b).unwrap();
    let back = manager.go_back().unwrap().unwrap();
    assert_eq!(&back.urn, a);
    assert!(manager.path_stack().is_empty());
    assert_eq!(manager.get_progress().dfs_stack_depth, 0);

    // The abandoned target counts as viewed, so BFS serves A then C.
    assert_eq!(&manager.get_next_item().unwrap().unwrap().urn, a);
    assert_eq!(manager.current_strategy(), StrategyKind::Bfs);
}

#[test]
fn test_navigation_over_stored_cross_references() {
    let db = Arc::new(Database::in_memory().unwrap());
    let xrefs = CrossReferenceService::new(Arc::clone(&db));
    xrefs
        .create(&NewCrossReference::new("cve", "CVE-2024-0001", "capec", "CAPEC-63"))
        .unwrap();

    let items = abc();
    let manager = StrategyManager::with_source(items.clone(), Arc::new(xrefs)).unwrap();
    let related = manager.related_items(&items[0].urn);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].urn, items[2].urn);
}

#[test]
fn test_session_counts_studied_bookmarks() {
    let (db, bookmarks, _) = services();
    let sessions = SessionService::new(Arc::clone(&db));
    let bookmark = bookmarks.create_bookmark(&cve()).unwrap().bookmark;

    let session = sessions.start_session(StrategyKind::Bfs).unwrap();
    assert_eq!(sessions.record_view(&bookmark.urn).unwrap(), 1);
    let ended = sessions
        .end_session(session.id, &[bookmark.urn.clone()], &[])
        .unwrap();
    assert_eq!(ended.viewed_count, 1);
    assert_eq!(ended.learned_count, 0);

    let stats = bookmarks.get_bookmark(bookmark.id).unwrap().stats();
    assert_eq!(stats.view_count, 1);
    assert_eq!(stats.study_sessions, 1);

    assert!(matches!(
        sessions.end_session(session.id, &[], &[]),
        Err(Error::InvalidInput(_))
    ));
}
