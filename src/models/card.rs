//! Memory card (flashcard) models.

use super::CardStatus;
use super::bookmark::BookmarkId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Default SM-2 ease factor.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Lower bound of the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Upper bound of the ease factor.
pub const MAX_EASE_FACTOR: f64 = 3.0;

/// Content blob of a card without a structured body.
pub const EMPTY_CONTENT: &str = "{}";

/// Numeric identifier of a memory card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl CardId {
    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Weight of a card within its bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardClassification {
    /// Core fact of the item.
    #[default]
    Major,
    /// Supporting detail.
    Minor,
}

impl CardClassification {
    /// Returns the classification as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }

    /// Parses a classification (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            _ => None,
        }
    }
}

/// Recall quality reported for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Failed to recall.
    Again,
    /// Recalled with serious difficulty.
    Hard,
    /// Recalled correctly.
    Good,
    /// Recalled effortlessly.
    Easy,
}

impl Rating {
    /// Returns the rating as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }

    /// Parses a rating by name or by its 1-4 button number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for anything else.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "again" | "1" => Ok(Self::Again),
            "hard" | "2" => Ok(Self::Hard),
            "good" | "3" => Ok(Self::Good),
            "easy" | "4" => Ok(Self::Easy),
            other => Err(Error::InvalidInput(format!("unknown rating: {other:?}"))),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A flashcard owned by exactly one bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCard {
    /// Card id.
    pub id: CardId,
    /// `v2e::card::<id>`.
    pub urn: String,
    /// Owning bookmark.
    pub bookmark_id: BookmarkId,
    /// Prompt side.
    pub front: String,
    /// Answer side.
    pub back: String,
    /// Structured rich-text body (JSON), `{}` when absent.
    pub content: String,
    /// Major or minor card.
    pub classification: CardClassification,
    /// Lifecycle status.
    pub status: CardStatus,
    /// Monotonic row version, starting at 1.
    pub version: i64,
    /// SM-2 ease factor in `[1.3, 3.0]`.
    pub ease_factor: f64,
    /// Current interval in whole days, at least 1.
    pub interval_days: i64,
    /// Consecutive successful repetitions.
    pub repetition: i64,
    /// When the card is next due.
    pub next_review: Option<DateTime<Utc>>,
    /// Free-form card type (`basic`, `cloze`, ...).
    pub card_type: String,
    /// Author, if any.
    pub author: Option<String>,
    /// Hidden from shared views.
    pub is_private: bool,
    /// Open-ended metadata.
    pub metadata: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    /// Owning bookmark.
    pub bookmark_id: BookmarkId,
    /// Prompt side.
    pub front: String,
    /// Answer side.
    pub back: String,
    /// Structured body, `{}` when absent.
    pub content: String,
    /// Major or minor.
    pub classification: CardClassification,
    /// Card type.
    pub card_type: String,
    /// Author.
    pub author: Option<String>,
    /// Private flag.
    pub is_private: bool,
}

impl NewCard {
    /// Creates a basic card with an empty body.
    #[must_use]
    pub fn new(
        bookmark_id: BookmarkId,
        front: impl Into<String>,
        back: impl Into<String>,
    ) -> Self {
        Self {
            bookmark_id,
            front: front.into(),
            back: back.into(),
            content: EMPTY_CONTENT.to_string(),
            classification: CardClassification::Major,
            card_type: "basic".to_string(),
            author: None,
            is_private: false,
        }
    }

    /// Sets the structured body.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the classification.
    #[must_use]
    pub const fn with_classification(mut self, classification: CardClassification) -> Self {
        self.classification = classification;
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Filter for listing cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    /// Only cards of this bookmark.
    pub bookmark_id: Option<BookmarkId>,
    /// Only cards in this status.
    pub status: Option<CardStatus>,
    /// Only cards due at or before this time.
    pub due_before: Option<DateTime<Utc>>,
    /// Only cards by this author.
    pub author: Option<String>,
    /// Rows to skip.
    pub offset: usize,
    /// Maximum rows; `None` for all.
    pub limit: Option<usize>,
}

impl CardFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one bookmark.
    #[must_use]
    pub const fn with_bookmark(mut self, bookmark_id: BookmarkId) -> Self {
        self.bookmark_id = Some(bookmark_id);
        self
    }

    /// Restricts to one status.
    #[must_use]
    pub const fn with_status(mut self, status: CardStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to cards due at or before `at`.
    #[must_use]
    pub const fn due_before(mut self, at: DateTime<Utc>) -> Self {
        self.due_before = Some(at);
        self
    }

    /// Sets the page.
    #[must_use]
    pub const fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// Typed form of the attribute bag accepted by `update-fields`.
///
/// Only the keys present in the bag are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    /// New status (routed through the lifecycle check).
    pub status: Option<CardStatus>,
    /// New front.
    pub front: Option<String>,
    /// New back.
    pub back: Option<String>,
    /// New structured body.
    pub content: Option<String>,
    /// New classification.
    pub classification: Option<CardClassification>,
    /// New card type.
    pub card_type: Option<String>,
    /// New author; `Some(None)` clears it.
    pub author: Option<Option<String>>,
    /// New private flag.
    pub is_private: Option<bool>,
    /// Replacement metadata.
    pub metadata: Option<Map<String, Value>>,
}

impl CardPatch {
    /// Parses a loose attribute bag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown keys, values of the wrong
    /// JSON type, or an unknown status/classification.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut patch = Self::default();
        for (key, value) in fields {
            match key.as_str() {
                "status" => patch.status = Some(CardStatus::parse(expect_str(key, value)?)?),
                "front" => patch.front = Some(expect_str(key, value)?.to_string()),
                "back" => patch.back = Some(expect_str(key, value)?.to_string()),
                "content" => {
                    patch.content = Some(match value {
                        Value::String(s) => s.clone(),
                        Value::Object(_) => value.to_string(),
                        _ => return Err(wrong_type(key, "string or object")),
                    });
                },
                "classification" => {
                    let raw = expect_str(key, value)?;
                    patch.classification = Some(CardClassification::parse(raw).ok_or_else(
                        || Error::InvalidInput(format!("unknown classification: {raw:?}")),
                    )?);
                },
                "card_type" => patch.card_type = Some(expect_str(key, value)?.to_string()),
                "author" => {
                    patch.author = Some(match value {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        _ => return Err(wrong_type(key, "string or null")),
                    });
                },
                "is_private" => {
                    patch.is_private =
                        Some(value.as_bool().ok_or_else(|| wrong_type(key, "bool"))?);
                },
                "metadata" => {
                    patch.metadata = Some(
                        value
                            .as_object()
                            .cloned()
                            .ok_or_else(|| wrong_type(key, "object"))?,
                    );
                },
                other => {
                    return Err(Error::InvalidInput(format!(
                        "unknown card field: {other:?}"
                    )));
                },
            }
        }
        Ok(patch)
    }

    /// Returns `true` if the patch sets no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies every field except `status` to `card`.
    pub fn apply_fields(&self, card: &mut MemoryCard) {
        if let Some(front) = &self.front {
            card.front.clone_from(front);
        }
        if let Some(back) = &self.back {
            card.back.clone_from(back);
        }
        if let Some(content) = &self.content {
            card.content.clone_from(content);
        }
        if let Some(classification) = self.classification {
            card.classification = classification;
        }
        if let Some(card_type) = &self.card_type {
            card.card_type.clone_from(card_type);
        }
        if let Some(author) = &self.author {
            card.author.clone_from(author);
        }
        if let Some(is_private) = self.is_private {
            card.is_private = is_private;
        }
        if let Some(metadata) = &self.metadata {
            card.metadata.clone_from(metadata);
        }
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| wrong_type(key, "string"))
}

fn wrong_type(key: &str, expected: &str) -> Error {
    Error::InvalidInput(format!("field {key:?} must be a {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: &Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rating_parse() {
        assert_eq!(Rating::parse("GOOD").unwrap(), Rating::Good);
        assert_eq!(Rating::parse("1").unwrap(), Rating::Again);
        assert_eq!(Rating::parse(" easy ").unwrap(), Rating::Easy);
        assert!(Rating::parse("5").is_err());
    }

    #[test]
    fn test_patch_from_fields() {
        let patch = CardPatch::from_fields(&bag(&json!({
            "status": "in-progress",
            "front": "Q",
            "author": null,
            "is_private": true,
            "content": {"type": "doc", "content": []},
        })))
        .unwrap();

        assert_eq!(patch.status, Some(CardStatus::Learning));
        assert_eq!(patch.front.as_deref(), Some("Q"));
        assert_eq!(patch.author, Some(None));
        assert_eq!(patch.is_private, Some(true));
        assert_eq!(
            patch.content.as_deref(),
            Some(r#"{"content":[],"type":"doc"}"#)
        );
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_patch_rejects_unknown_key() {
        let err = CardPatch::from_fields(&bag(&json!({"version": 9}))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("version")));
    }

    #[test]
    fn test_patch_rejects_wrong_type() {
        assert!(CardPatch::from_fields(&bag(&json!({"front": 3}))).is_err());
        assert!(CardPatch::from_fields(&bag(&json!({"status": "bogus"}))).is_err());
        assert!(CardPatch::from_fields(&bag(&json!({"classification": "huge"}))).is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(CardPatch::from_fields(&Map::new()).unwrap().is_empty());
    }
}
