//! Memory card lifecycle.
//!
//! ```text
//! new ──▶ learning ──▶ due ──▶ reviewed ──▶ mastered
//!            ▲                    │
//!            └────────────────────┘        (any) ──▶ archived
//! ```
//!
//! Staying in the same status is always permitted. `archived` is terminal.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Status of a memory card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Never reviewed.
    #[default]
    New,
    /// In the initial learning phase.
    Learning,
    /// Scheduled review time has arrived.
    Due,
    /// Reviewed at least once past the learning phase.
    Reviewed,
    /// Reached the mastery repetition count.
    Mastered,
    /// Retired; no further transitions.
    Archived,
}

impl CardStatus {
    /// All statuses in lifecycle order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::New,
            Self::Learning,
            Self::Due,
            Self::Reviewed,
            Self::Mastered,
            Self::Archived,
        ]
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Due => "due",
            Self::Reviewed => "reviewed",
            Self::Mastered => "mastered",
            Self::Archived => "archived",
        }
    }

    /// Parses a status from user input.
    ///
    /// Case-insensitive and whitespace-trimmed. Accepts `in-progress` for
    /// `learning` and `archive` for `archived`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for any other string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "learning" | "in-progress" => Ok(Self::Learning),
            "due" => Ok(Self::Due),
            "reviewed" => Ok(Self::Reviewed),
            "mastered" => Ok(Self::Mastered),
            "archived" | "archive" => Ok(Self::Archived),
            other => Err(Error::InvalidInput(format!("unknown card status: {other:?}"))),
        }
    }

    /// Maps a status string found on a legacy row to its canonical status.
    ///
    /// Legacy rows used `active`/`in-progress` for learning, `archive` for
    /// archived, and `to_review` for cards that were never studied.
    #[must_use]
    pub fn normalize_legacy(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" | "in-progress" | "in_progress" => Some(Self::Learning),
            "archive" => Some(Self::Archived),
            "to_review" | "to-review" => Some(Self::New),
            other => Self::parse(other).ok(),
        }
    }

    /// Returns `true` if a card may move from `self` to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        if self as u8 == target as u8 {
            return true;
        }
        matches!(
            (self, target),
            (Self::New, Self::Learning | Self::Archived)
                | (Self::Learning, Self::Due | Self::Archived)
                | (Self::Due, Self::Reviewed | Self::Archived)
                | (Self::Reviewed, Self::Learning | Self::Mastered | Self::Archived)
                | (Self::Mastered, Self::Archived)
        )
    }

    /// Fails with [`Error::InvalidTransition`] unless `self → target` is an edge.
    pub fn validate_transition(self, target: Self) -> Result<()> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }

    /// Shortest path of single edges from `self` to `target` that only passes
    /// through the review cycle (`due`, `reviewed`).
    ///
    /// Returns the statuses after `self`, ending with `target`; an empty path
    /// means `self == target`. A review of a `learning` card passes through
    /// `due` before it lands on `reviewed`, so a review proposal is committed
    /// when such a path exists.
    #[must_use]
    pub fn review_path(self, target: Self) -> Option<Vec<Self>> {
        if self == target {
            return Some(Vec::new());
        }

        let mut queue = VecDeque::from([(self, Vec::new())]);
        let mut seen = vec![self];
        while let Some((status, path)) = queue.pop_front() {
            for next in Self::all() {
                if next == status || seen.contains(&next) || !status.can_transition_to(next) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(next);
                if next == target {
                    return Some(next_path);
                }
                if matches!(next, Self::Due | Self::Reviewed) {
                    seen.push(next);
                    queue.push_back((next, next_path));
                }
            }
        }
        None
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CardStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
