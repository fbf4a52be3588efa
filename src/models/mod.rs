//! Data models for the study engine.
//!
//! This module contains the core data structures used throughout the system.

mod bookmark;
mod card;
mod cross_reference;
pub mod document;
mod history;
mod note;
mod session;
mod status;
mod urn;

pub use bookmark::{
    Bookmark, BookmarkId, BookmarkPage, BookmarkStats, LearningState, META_FIRST_BOOKMARKED,
    META_LAST_VIEWED, META_STUDY_SESSIONS, META_VIEW_COUNT, NewBookmark,
};
pub use card::{
    CardClassification, CardFilter, CardId, CardPatch, DEFAULT_EASE_FACTOR, EMPTY_CONTENT,
    MAX_EASE_FACTOR, MIN_EASE_FACTOR, MemoryCard, NewCard, Rating,
};
pub use cross_reference::{CrossReference, NewCrossReference, RelationshipType};
pub use document::{DocumentNode, validate_document};
pub use history::{BookmarkHistoryEntry, HistoryAction};
pub use note::{Note, NoteId};
pub use session::LearningSession;
pub use status::CardStatus;
pub use urn::{Provider, ResourceType, Urn};
