//! Learner navigation over bookmarked catalog items.
//!
//! Two strategies walk the items:
//!
//! - [`BfsStrategy`]: the catalog list in order, skipping viewed items
//! - [`DfsStrategy`]: a stack of followed links with backtracking
//!
//! The [`StrategyManager`] owns one of each, routes user events to the
//! active one and switches between them: following a link activates DFS,
//! and when DFS runs dry it signals [`NavigationError::SwitchStrategy`] and
//! the manager falls back to BFS.
//!
//! ```text
//!       follow-link               switch-strategy
//!  BFS ─────────────▶ DFS ─────────────────────▶ BFS
//! ```
//!
//! Lock order is manager → strategy; strategy locks are leaves.

mod bfs;
mod dfs;
mod graph;
mod manager;
mod strategy;

pub use bfs::BfsStrategy;
pub use dfs::DfsStrategy;
pub use graph::{FALLBACK_FAN_OUT, ItemGraph};
pub use manager::{NavigationProgress, StrategyManager};
pub use strategy::{NavigationStrategy, StrategyKind};

use crate::Result;
use crate::models::{Bookmark, Urn};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error as ThisError;

/// Navigation outcomes other than an item.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum NavigationError {
    /// The active strategy cannot serve the request; the manager switches
    /// to BFS. Never returned by [`StrategyManager`].
    #[error("strategy exhausted, switch strategy")]
    SwitchStrategy,

    /// Every item has been served.
    #[error("no more items")]
    NoMoreItems,

    /// A URN on the stack does not name a known item.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// The strategy does not support the operation.
    #[error("operation not supported by {strategy}: {operation}")]
    Unsupported {
        /// Strategy name.
        strategy: &'static str,
        /// Operation name.
        operation: &'static str,
    },
}

/// Result type for navigation operations.
pub type NavResult<T> = std::result::Result<T, NavigationError>;

impl From<NavigationError> for crate::Error {
    fn from(err: NavigationError) -> Self {
        match err {
            NavigationError::ItemNotFound(urn) => Self::not_found("item", urn),
            NavigationError::Unsupported { .. } => Self::InvalidInput(err.to_string()),
            NavigationError::SwitchStrategy | NavigationError::NoMoreItems => {
                Self::store("navigate", err)
            },
        }
    }
}

/// How an item was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemContext {
    /// Served from the catalog list.
    #[default]
    List,
    /// Reached by following links.
    DeepDive,
}

/// An item the learner can navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningItem {
    /// Item URN; the navigation key.
    pub urn: String,
    /// Catalog type (`cve`, `cwe`, ...).
    pub item_type: String,
    /// Catalog id.
    pub item_id: String,
    /// Display title.
    pub title: String,
    /// How the item was reached.
    pub context: ItemContext,
}

impl LearningItem {
    /// Creates an item, deriving its URN.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the type has no URN mapping.
    pub fn new(
        item_type: impl Into<String>,
        item_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self> {
        let item_type = item_type.into();
        let item_id = item_id.into();
        let urn = Urn::for_item(&item_type, &item_id, None)?.to_string();
        Ok(Self {
            urn,
            item_type,
            item_id,
            title: title.into(),
            context: ItemContext::List,
        })
    }

    /// Creates an item for a bookmark.
    #[must_use]
    pub fn from_bookmark(bookmark: &Bookmark) -> Self {
        Self {
            urn: bookmark.urn.clone(),
            item_type: bookmark.item_type.clone(),
            item_id: bookmark.item_id.clone(),
            title: bookmark.title.clone(),
            context: ItemContext::List,
        }
    }

    /// Returns a copy tagged with `context`.
    #[must_use]
    pub fn with_context(mut self, context: ItemContext) -> Self {
        self.context = context;
        self
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("Navigation lock was poisoned, recovering");
        metrics::counter!("navigation_lock_poison_recovery_total").increment(1);
        PoisonError::into_inner(poisoned)
    })
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Navigation lock was poisoned, recovering");
        metrics::counter!("navigation_lock_poison_recovery_total").increment(1);
        PoisonError::into_inner(poisoned)
    })
}
