//! Concurrency tests for the versioned card store and the navigation manager.
//!
//! Writers race on the same card version; exactly one may commit.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use v2e_study::models::{CardId, CardStatus, NewBookmark};
use v2e_study::navigation::{LearningItem, StrategyManager};
use v2e_study::services::{BookmarkService, CardService};
use v2e_study::{Database, Error, MemoryCard};

fn seed(db: &Arc<Database>) -> MemoryCard {
    BookmarkService::new(Arc::clone(db))
        .create_bookmark(&NewBookmark::new("g", "CVE", "CVE-2024-0001", "T", "D"))
        .unwrap()
        .card
        .unwrap()
}

/// Runs both transitions from version 1 on separate threads.
fn race(
    left: CardService,
    right: CardService,
    id: CardId,
) -> Vec<(CardStatus, v2e_study::Result<MemoryCard>)> {
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [
        (left, CardStatus::Learning),
        (right, CardStatus::Archived),
    ]
    .into_iter()
    .map(|(service, target)| {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            (target, service.transition_status(id, Some(1), target))
        })
    })
    .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_single_winner(
    results: &[(CardStatus, v2e_study::Result<MemoryCard>)],
    final_card: &MemoryCard,
) {
    let winners: Vec<CardStatus> = results
        .iter()
        .filter_map(|(target, result)| result.as_ref().ok().map(|_| *target))
        .collect();
    assert_eq!(winners.len(), 1, "exactly one writer commits");

    let loser = results
        .iter()
        .find_map(|(_, result)| result.as_ref().err())
        .expect("one writer fails");
    assert!(matches!(loser, Error::ConcurrentUpdate { expected: 1, .. }));
    assert!(loser.is_retryable());

    assert_eq!(final_card.status, winners[0]);
    assert_eq!(final_card.version, 2);
}

#[test]
fn test_concurrent_transitions_shared_handle() {
    let db = Arc::new(Database::in_memory().unwrap());
    let card = seed(&db);

    let results = race(
        CardService::new(Arc::clone(&db)),
        CardService::new(Arc::clone(&db)),
        card.id,
    );

    let final_card = CardService::new(db).get(card.id).unwrap();
    assert_single_winner(&results, &final_card);
}

#[test]
fn test_concurrent_transitions_separate_connections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("study.db");

    let first = Arc::new(Database::open(&path).unwrap());
    let second = Arc::new(Database::open(&path).unwrap());
    let card = seed(&first);

    let results = race(
        CardService::new(Arc::clone(&first)),
        CardService::new(Arc::clone(&second)),
        card.id,
    );

    let final_card = CardService::new(second).get(card.id).unwrap();
    assert_single_winner(&results, &final_card);
}

#[test]
fn test_retry_with_refreshed_version() {
    let db = Arc::new(Database::in_memory().unwrap());
    let card = seed(&db);
    let cards = CardService::new(Arc::clone(&db));

    cards
        .transition_status(card.id, Some(1), CardStatus::Learning)
        .unwrap();
    let stale = cards.transition_status(card.id, Some(1), CardStatus::Due);
    assert!(matches!(stale, Err(Error::ConcurrentUpdate { .. })));

    let fresh = cards.get(card.id).unwrap();
    let due = cards
        .transition_status(card.id, Some(fresh.version), CardStatus::Due)
        .unwrap();
    assert_eq!(due.version, 3);
}

#[test]
fn test_manager_shared_across_threads() {
    let items: Vec<LearningItem> = (0..50)
        .map(|i| LearningItem::new("cwe", format!("CWE-{i}"), format!("W{i}")).unwrap())
        .collect();
    let manager = Arc::new(StrategyManager::new(items));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let mut served = Vec::new();
                while let Some(item) = manager.get_next_item().unwrap() {
                    manager.mark_viewed(&item.urn);
                    served.push(item.urn);
                }
                served
            })
        })
        .collect();

    let mut served: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    served.sort();
    served.dedup();
    assert_eq!(served.len(), 50);
    assert_eq!(manager.viewed_items().len(), 50);
    assert_eq!(manager.get_next_item().unwrap(), None);
}
