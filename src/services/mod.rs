//! Business logic services.
//!
//! Services own an `Arc<Database>` and run each operation in one
//! transaction, composing the row modules under `storage::sqlite`.

mod bookmark;
mod card;
mod cross_reference;
mod note;
mod revert;
pub mod scheduler;
mod session;

pub use bookmark::{BookmarkService, CreatedBookmark, DEFAULT_PAGE_SIZE};
pub use card::{CardService, ReviewResult};
pub use cross_reference::CrossReferenceService;
pub use note::NoteService;
pub use revert::RevertTarget;
pub use scheduler::{MasteryThresholds, ReviewOutcome, SchedulingState};
pub use session::SessionService;

use crate::config::StudyConfig;
use crate::storage::Database;
use std::sync::Arc;

/// Every service wired to one database.
pub struct Services {
    /// Bookmarks, history and revert.
    pub bookmarks: BookmarkService,
    /// Memory cards and reviews.
    pub cards: CardService,
    /// Notes.
    pub notes: NoteService,
    /// Cross references.
    pub cross_references: CrossReferenceService,
    /// Learning sessions.
    pub sessions: SessionService,
}

impl Services {
    /// Builds all services over `db` using the thresholds and page size from
    /// `config`.
    #[must_use]
    pub fn new(db: &Arc<Database>, config: &StudyConfig) -> Self {
        Self {
            bookmarks: BookmarkService::new(Arc::clone(db)).with_page_size(config.page_size),
            cards: CardService::new(Arc::clone(db)).with_thresholds(config.mastery),
            notes: NoteService::new(Arc::clone(db)),
            cross_references: CrossReferenceService::new(Arc::clone(db)),
            sessions: SessionService::new(Arc::clone(db)),
        }
    }
}
