//! # v2e-study
//!
//! Bookmarks, notes, and spaced-repetition study over a cybersecurity
//! knowledge graph (CVE, CWE, CAPEC, ATT&CK).
//!
//! The crate is built around three subsystems:
//!
//! - A versioned memory-card store whose status changes follow a lifecycle
//!   state machine and are committed with optimistic concurrency, fed by an
//!   SM-2 review scheduler ([`services::CardService`]).
//! - Bookmarks with an append-only history log and point-in-time revert
//!   ([`services::BookmarkService`]).
//! - A navigation engine that alternates between a breadth-first walk over
//!   the catalog and a depth-first walk over item links
//!   ([`navigation::StrategyManager`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use v2e_study::models::{NewBookmark, Rating};
//! use v2e_study::services::{BookmarkService, CardService};
//! use v2e_study::storage::Database;
//!
//! let db = Arc::new(Database::in_memory()?);
//! let bookmarks = BookmarkService::new(Arc::clone(&db));
//! let cards = CardService::new(db);
//!
//! let created = bookmarks.create_bookmark(&NewBookmark::new("g", "CVE", "CVE-2024-0001", "T", "D"))?;
//! let card = created.card.expect("first bookmark creates a card");
//! let reviewed = cards.apply_review(card.id, Rating::Good)?;
//! assert_eq!(reviewed.card.version, 2);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cancel;
pub mod cli;
pub mod config;
pub mod models;
pub mod navigation;
pub mod observability;
pub mod services;
pub mod storage;

pub use cancel::CancellationToken;
pub use config::StudyConfig;
pub use models::{
    Bookmark, BookmarkId, CardId, CardStatus, HistoryAction, LearningState, MemoryCard, Rating,
    Urn,
};
pub use navigation::{LearningItem, NavigationError, StrategyManager};
pub use services::{BookmarkService, CardService, NoteService};
pub use storage::Database;

/// Error type for study engine operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | Bookmark, card, note, or session lookup by id or URN misses |
/// | `InvalidTransition` | The card lifecycle does not permit the requested status |
/// | `ConcurrentUpdate` | The expected version no longer matches the stored row |
/// | `InvalidInput` | Malformed URN, unknown status, bad document node, missing field |
/// | `Parse` | Timestamps, JSON bodies, or URN grammar violations |
/// | `NoHistoryBeforeTimestamp` | A revert target precedes the audit log |
/// | `Cancelled` | The caller's cancellation token fired before commit |
/// | `OperationFailed` | Any unclassified failure from the `SQLite` store |
#[derive(Debug, ThisError)]
pub enum Error {
    /// An entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity (`bookmark`, `card`, ...).
        entity: &'static str,
        /// Identifier or URN that was looked up.
        key: String,
    },

    /// The card lifecycle denies a status change.
    ///
    /// Terminal for the caller; retrying with the same target fails again.
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Current status.
        from: models::CardStatus,
        /// Requested status.
        to: models::CardStatus,
    },

    /// The optimistic version check failed.
    ///
    /// Raised when:
    /// - The caller's expected version differs from the stored version
    /// - The `id = ? AND version = ?` update touched no rows
    #[error("concurrent update of {entity} {id}: expected version {expected}")]
    ConcurrentUpdate {
        /// Kind of entity.
        entity: &'static str,
        /// Entity id.
        id: i64,
        /// Version the writer expected to replace.
        expected: i64,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A timestamp, JSON body, or URN could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// No history entry exists at or before the revert target.
    #[error("no history for bookmark {bookmark_id} at or before {timestamp}")]
    NoHistoryBeforeTimestamp {
        /// Bookmark being reverted.
        bookmark_id: i64,
        /// Requested point in time (RFC 3339).
        timestamp: String,
    },

    /// The operation was cancelled and its transaction rolled back.
    #[error("operation '{0}' cancelled")]
    Cancelled(String),

    /// An operation against the store failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Stable error kind names exposed on the operations surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Entity missing.
    NotFound,
    /// Lifecycle denial.
    InvalidTransition,
    /// Version mismatch.
    ConcurrentUpdate,
    /// Bad argument.
    InvalidArgument,
    /// Unparseable input.
    ParseError,
    /// Revert target before the log.
    NoHistoryBeforeTimestamp,
    /// Cancelled by the caller.
    Cancelled,
    /// Unclassified store failure.
    StoreError,
}

impl ErrorKind {
    /// Returns the kind as a snake-case string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidTransition => "invalid_transition",
            Self::ConcurrentUpdate => "concurrent_update",
            Self::InvalidArgument => "invalid_argument",
            Self::ParseError => "parse_error",
            Self::NoHistoryBeforeTimestamp => "no_history_before_timestamp",
            Self::Cancelled => "cancelled",
            Self::StoreError => "store_error",
        }
    }
}

impl Error {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ConcurrentUpdate { .. } => ErrorKind::ConcurrentUpdate,
            Self::InvalidInput(_) => ErrorKind::InvalidArgument,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::NoHistoryBeforeTimestamp { .. } => ErrorKind::NoHistoryBeforeTimestamp,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::OperationFailed { .. } => ErrorKind::StoreError,
        }
    }

    /// Returns `true` if the caller may retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentUpdate { .. } | Self::OperationFailed { .. }
        )
    }

    /// Builds a store failure for `operation`.
    pub(crate) fn store(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Result type alias for study engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::InvalidTransition {
            from: models::CardStatus::Archived,
            to: models::CardStatus::New,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition from 'archived' to 'new'"
        );
    }

    #[test]
    fn test_error_kinds() {
        let err = Error::ConcurrentUpdate {
            entity: "card",
            id: 7,
            expected: 1,
        };
        assert_eq!(err.kind(), ErrorKind::ConcurrentUpdate);
        assert_eq!(err.kind().as_str(), "concurrent_update");
        assert!(err.is_retryable());

        let err = Error::not_found("bookmark", 3);
        assert_eq!(err.kind().as_str(), "not_found");
        assert_eq!(err.to_string(), "bookmark not found: 3");
        assert!(!err.is_retryable());

        assert!(Error::store("open", "disk full").is_retryable());
        assert_eq!(
            Error::Parse("bad".to_string()).kind(),
            ErrorKind::ParseError
        );
    }
}
