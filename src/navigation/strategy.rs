//! The capability set shared by navigation strategies.

use super::{LearningItem, NavResult};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Breadth-first over the item list.
    #[default]
    Bfs,
    /// Depth-first along followed links.
    Dfs,
}

impl StrategyKind {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bfs => "bfs",
            Self::Dfs => "dfs",
        }
    }

    /// Parses a strategy name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for anything but `bfs` or `dfs`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bfs" => Ok(Self::Bfs),
            "dfs" => Ok(Self::Dfs),
            other => Err(Error::InvalidInput(format!(
                "unknown navigation strategy: {other}"
            ))),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A way of walking learning items.
///
/// Implementations guard their whole state with one lock, taken for the
/// duration of each call.
pub trait NavigationStrategy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Human-readable name.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Serves the next item.
    ///
    /// # Errors
    ///
    /// [`NavigationError::SwitchStrategy`](super::NavigationError::SwitchStrategy)
    /// when the strategy cannot serve, or
    /// [`NavigationError::NoMoreItems`](super::NavigationError::NoMoreItems)
    /// when everything has been served.
    fn next_item(&self) -> NavResult<LearningItem>;

    /// Records that the learner viewed `urn`.
    fn on_view(&self, urn: &str);

    /// Reacts to the learner following a link.
    ///
    /// # Errors
    ///
    /// Strategies that do not follow links return
    /// [`NavigationError::SwitchStrategy`](super::NavigationError::SwitchStrategy).
    fn on_follow_link(&self, from: &str, to: &str) -> NavResult<()>;

    /// Steps back to the previous item.
    ///
    /// # Errors
    ///
    /// Strategy-specific; see the implementations.
    fn on_go_back(&self) -> NavResult<LearningItem>;

    /// Forgets all traversal state.
    fn reset(&self);
}
