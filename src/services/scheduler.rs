//! SM-2 spaced-repetition scheduling.
//!
//! The scheduler is pure: given a card's scheduling state and a rating it
//! returns the next state and a proposed status. Committing the proposal
//! (and checking it against the status FSM) is the card service's job.
//!
//! | Rating | Repetition | Ease | Interval (R=0 / R=1 / R≥2) |
//! |--------|-----------|------|-----------------------------|
//! | again  | 0         | E−0.2, floor 1.3 | 1 |
//! | hard   | R+1       | E    | 1 / 2 / ⌊max(1, I·E·0.8)⌋ |
//! | good   | R+1       | E    | 1 / 3 / ⌊I·E⌋ |
//! | easy   | R+1       | E+0.15, cap 3.0 | 4 / 6 / ⌊I·E·1.3⌋ |

use crate::models::{CardStatus, LearningState, MAX_EASE_FACTOR, MIN_EASE_FACTOR, Rating};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Repetitions after which a card is proposed as mastered.
pub const MASTERY_REPETITIONS: i64 = 5;

/// Scheduling inputs taken from a card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingState {
    /// Current interval in days.
    pub interval_days: i64,
    /// Current ease factor.
    pub ease_factor: f64,
    /// Consecutive successful repetitions.
    pub repetition: i64,
    /// Current status.
    pub status: CardStatus,
}

/// Result of scheduling one review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewOutcome {
    /// New interval in days (always ≥ 1).
    pub interval_days: i64,
    /// New ease factor, within `[1.3, 3.0]`.
    pub ease_factor: f64,
    /// New repetition count.
    pub repetition: i64,
    /// `now + interval_days` whole days.
    pub next_review: DateTime<Utc>,
    /// Status the card should move to.
    pub proposed_status: CardStatus,
}

/// Computes the next scheduling state for `rating` at `now`.
///
/// Out-of-range stored values (interval below 1, ease outside the bounds)
/// are clamped before the rules apply.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn schedule(state: &SchedulingState, rating: Rating, now: DateTime<Utc>) -> ReviewOutcome {
    let interval = state.interval_days.max(1);
    let ease = state.ease_factor.clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR);
    let repetition = state.repetition.max(0);

    let (interval_days, ease_factor, repetition) = match rating {
        Rating::Again => (1, (ease - 0.2).max(MIN_EASE_FACTOR), 0),
        Rating::Hard => {
            let next = match repetition {
                0 => 1,
                1 => 2,
                _ => floor_days((interval as f64 * ease * 0.8).max(1.0)),
            };
            (next, ease, repetition + 1)
        },
        Rating::Good => {
            let next = match repetition {
                0 => 1,
                1 => 3,
                _ => floor_days(interval as f64 * ease),
            };
            (next, ease, repetition + 1)
        },
        Rating::Easy => {
            let next = match repetition {
                0 => 4,
                1 => 6,
                _ => floor_days(interval as f64 * ease * 1.3),
            };
            (next, (ease + 0.15).min(MAX_EASE_FACTOR), repetition + 1)
        },
    };

    ReviewOutcome {
        interval_days,
        ease_factor,
        repetition,
        next_review: now + Duration::days(interval_days),
        proposed_status: propose_status(state.status, repetition),
    }
}

/// Proposes the next status from the current one and the new repetition.
#[must_use]
pub const fn propose_status(current: CardStatus, repetition: i64) -> CardStatus {
    let mastered = repetition >= MASTERY_REPETITIONS;
    match current {
        CardStatus::New => CardStatus::Learning,
        CardStatus::Reviewed if !mastered => CardStatus::Learning,
        _ if mastered => CardStatus::Mastered,
        _ => CardStatus::Reviewed,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn floor_days(days: f64) -> i64 {
    (days.floor() as i64).max(1)
}

/// Mastery thresholds mapping a mastery level to a learning state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryThresholds {
    /// Mastery at or above which the bookmark is `mastered`.
    pub mastered: f64,
    /// Mastery at or above which the bookmark is `learning`.
    pub learning: f64,
}

impl Default for MasteryThresholds {
    fn default() -> Self {
        Self {
            mastered: 0.9,
            learning: 0.7,
        }
    }
}

impl MasteryThresholds {
    /// Returns the learning state for `mastery`; below both thresholds the
    /// current state is kept.
    #[must_use]
    pub fn state_for(&self, mastery: f64, current: LearningState) -> LearningState {
        if mastery >= self.mastered {
            LearningState::Mastered
        } else if mastery >= self.learning {
            LearningState::Learning
        } else {
            current
        }
    }
}

/// Maps an average ease factor to a mastery level in `[0.0, 1.0]`.
#[must_use]
pub fn mastery_from_ease(average_ease: f64) -> f64 {
    ((average_ease - MIN_EASE_FACTOR) / (MAX_EASE_FACTOR - MIN_EASE_FACTOR)).clamp(0.0, 1.0)
}
