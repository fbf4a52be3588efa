//! Cross references between external catalog items.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of relationship between two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    /// Generic association.
    RelatedTo,
    /// Source exploits target.
    Exploits,
    /// Source mitigates target.
    Mitigates,
    /// Items describe similar things.
    SimilarTo,
    /// Source is part of target.
    PartOf,
    /// Source is caused by target.
    CausedBy,
}

impl RelationshipType {
    /// Returns the kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RelatedTo => "related-to",
            Self::Exploits => "exploits",
            Self::Mitigates => "mitigates",
            Self::SimilarTo => "similar-to",
            Self::PartOf => "part-of",
            Self::CausedBy => "caused-by",
        }
    }

    /// Parses a relationship type; `_` is accepted in place of `-`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "related-to" => Ok(Self::RelatedTo),
            "exploits" => Ok(Self::Exploits),
            "mitigates" => Ok(Self::Mitigates),
            "similar-to" => Ok(Self::SimilarTo),
            "part-of" => Ok(Self::PartOf),
            "caused-by" => Ok(Self::CausedBy),
            other => Err(Error::InvalidInput(format!(
                "unknown relationship type: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directed, typed edge between two external items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    /// Row id.
    pub id: i64,
    /// Source item id (e.g. `CVE-2024-0001`).
    pub source_item_id: String,
    /// Target item id.
    pub target_item_id: String,
    /// Source catalog type.
    pub source_type: String,
    /// Target catalog type.
    pub target_type: String,
    /// Relationship kind.
    pub relationship: RelationshipType,
    /// Strength in `[0.0, 1.0]`.
    pub strength: f64,
    /// Optional description.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a cross reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCrossReference {
    /// Source item id.
    pub source_item_id: String,
    /// Target item id.
    pub target_item_id: String,
    /// Source catalog type.
    pub source_type: String,
    /// Target catalog type.
    pub target_type: String,
    /// Relationship kind.
    pub relationship: RelationshipType,
    /// Strength in `[0.0, 1.0]`.
    pub strength: f64,
    /// Optional description.
    pub description: Option<String>,
}

impl NewCrossReference {
    /// Creates a `related-to` edge of full strength.
    #[must_use]
    pub fn new(
        source_type: impl Into<String>,
        source_item_id: impl Into<String>,
        target_type: impl Into<String>,
        target_item_id: impl Into<String>,
    ) -> Self {
        Self {
            source_item_id: source_item_id.into(),
            target_item_id: target_item_id.into(),
            source_type: source_type.into(),
            target_type: target_type.into(),
            relationship: RelationshipType::RelatedTo,
            strength: 1.0,
            description: None,
        }
    }

    /// Sets the relationship kind.
    #[must_use]
    pub const fn with_relationship(mut self, relationship: RelationshipType) -> Self {
        self.relationship = relationship;
        self
    }

    /// Sets the strength.
    #[must_use]
    pub const fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_parse() {
        assert_eq!(
            RelationshipType::parse("related-to").unwrap(),
            RelationshipType::RelatedTo
        );
        assert_eq!(
            RelationshipType::parse("CAUSED_BY").unwrap(),
            RelationshipType::CausedBy
        );
        assert!(RelationshipType::parse("befriends").is_err());
    }
}
