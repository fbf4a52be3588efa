//! Bookmark models.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Metadata key: number of times the item was viewed.
pub const META_VIEW_COUNT: &str = "view_count";
/// Metadata key: number of study sessions that touched the item.
pub const META_STUDY_SESSIONS: &str = "study_sessions";
/// Metadata key: last view time (RFC 3339).
pub const META_LAST_VIEWED: &str = "last_viewed";
/// Metadata key: creation time of the bookmark (RFC 3339), never rewritten.
pub const META_FIRST_BOOKMARKED: &str = "first_bookmarked";

/// Numeric identifier of a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub i64);

impl BookmarkId {
    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Learning state of a bookmarked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningState {
    /// Saved, not yet studied.
    #[default]
    ToReview,
    /// Being studied.
    Learning,
    /// Mastered.
    Mastered,
    /// Put aside.
    Archived,
}

impl LearningState {
    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ToReview => "to_review",
            Self::Learning => "learning",
            Self::Mastered => "mastered",
            Self::Archived => "archived",
        }
    }

    /// Parses a learning state. Accepts `to-review` and `to_review`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown states.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "to_review" | "to-review" => Ok(Self::ToReview),
            "learning" => Ok(Self::Learning),
            "mastered" => Ok(Self::Mastered),
            "archived" => Ok(Self::Archived),
            other => Err(Error::InvalidInput(format!(
                "unknown learning state: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for LearningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's saved interest in one external catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Bookmark id.
    pub id: BookmarkId,
    /// Global item id.
    pub global_item_id: String,
    /// Catalog type (`CVE`, `CWE`, `CAPEC`, `ATTACK`).
    pub item_type: String,
    /// Item id within the catalog.
    pub item_id: String,
    /// URN of the item.
    pub urn: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Learning state.
    pub learning_state: LearningState,
    /// Mastery in `[0.0, 1.0]`.
    pub mastery_level: f64,
    /// Last review of any of its cards.
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Next due review of its cards.
    pub next_review: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete time.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Open-ended metadata, holding at least the view/study statistics.
    pub metadata: Map<String, Value>,
}

impl Bookmark {
    /// Returns `true` if the bookmark is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Reads the view/study statistics out of the metadata.
    #[must_use]
    pub fn stats(&self) -> BookmarkStats {
        BookmarkStats::from_metadata(&self.metadata)
    }
}

/// Input for `create-bookmark`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    /// Global item id.
    pub global_item_id: String,
    /// Catalog type.
    pub item_type: String,
    /// Item id within the catalog.
    pub item_id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Provider override for the URN (e.g. `ssg`).
    #[serde(default)]
    pub source: Option<String>,
}

impl NewBookmark {
    /// Creates the input for a bookmark.
    #[must_use]
    pub fn new(
        global_item_id: impl Into<String>,
        item_type: impl Into<String>,
        item_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            global_item_id: global_item_id.into(),
            item_type: item_type.into(),
            item_id: item_id.into(),
            title: title.into(),
            description: description.into(),
            source: None,
        }
    }

    /// Sets the URN provider override.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// View and study counters kept in a bookmark's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkStats {
    /// Number of views.
    pub view_count: i64,
    /// Number of study sessions.
    pub study_sessions: i64,
    /// Last view (RFC 3339), if recorded.
    pub last_viewed: Option<String>,
    /// Creation time (RFC 3339), if recorded.
    pub first_bookmarked: Option<String>,
}

impl BookmarkStats {
    /// Extracts the counters, treating missing or malformed keys as zero/absent.
    #[must_use]
    pub fn from_metadata(metadata: &Map<String, Value>) -> Self {
        Self {
            view_count: metadata
                .get(META_VIEW_COUNT)
                .and_then(Value::as_i64)
                .unwrap_or(0),
            study_sessions: metadata
                .get(META_STUDY_SESSIONS)
                .and_then(Value::as_i64)
                .unwrap_or(0),
            last_viewed: metadata
                .get(META_LAST_VIEWED)
                .and_then(Value::as_str)
                .map(str::to_string),
            first_bookmarked: metadata
                .get(META_FIRST_BOOKMARKED)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// One page of a bookmark listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkPage {
    /// Bookmarks on this page.
    pub bookmarks: Vec<Bookmark>,
    /// Matching bookmarks across all pages.
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_learning_state_parse() {
        assert_eq!(
            LearningState::parse("to-review").unwrap(),
            LearningState::ToReview
        );
        assert_eq!(
            LearningState::parse("TO_REVIEW").unwrap(),
            LearningState::ToReview
        );
        assert_eq!(
            LearningState::parse("mastered").unwrap(),
            LearningState::Mastered
        );
        assert!(LearningState::parse("forgotten").is_err());
    }

    #[test]
    fn test_stats_from_metadata() {
        let metadata = json!({
            "view_count": 4,
            "study_sessions": 2,
            "last_viewed": "2024-01-01T00:00:00Z",
            "extra": true,
        });
        let stats = BookmarkStats::from_metadata(metadata.as_object().unwrap());
        assert_eq!(stats.view_count, 4);
        assert_eq!(stats.study_sessions, 2);
        assert_eq!(stats.last_viewed.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(stats.first_bookmarked.is_none());
    }

    #[test]
    fn test_stats_defaults() {
        let stats = BookmarkStats::from_metadata(&Map::new());
        assert_eq!(stats.view_count, 0);
        assert_eq!(stats.study_sessions, 0);
    }
}
