//! Breadth-first navigation over the catalog list.

use super::{
    ItemContext, LearningItem, NavResult, NavigationError, NavigationStrategy, StrategyKind,
    read_lock, write_lock,
};
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct BfsState {
    items: Vec<LearningItem>,
    cursor: usize,
    viewed: HashSet<String>,
}

/// Serves items in list order, skipping the ones already viewed.
#[derive(Debug, Default)]
pub struct BfsStrategy {
    state: RwLock<BfsState>,
}

impl BfsStrategy {
    /// Creates a strategy over `items`.
    #[must_use]
    pub fn new(items: Vec<LearningItem>) -> Self {
        Self {
            state: RwLock::new(BfsState {
                items,
                ..BfsState::default()
            }),
        }
    }

    /// Percentage of items viewed, in `[0, 100]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let state = read_lock(&self.state);
        if state.items.is_empty() {
            return 0.0;
        }
        let viewed = state
            .items
            .iter()
            .filter(|item| state.viewed.contains(&item.urn))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let pct = 100.0 * viewed as f64 / state.items.len() as f64;
        pct
    }

    /// Number of distinct URNs viewed.
    #[must_use]
    pub fn viewed_count(&self) -> usize {
        read_lock(&self.state).viewed.len()
    }

    /// Number of items in the list.
    #[must_use]
    pub fn item_count(&self) -> usize {
        read_lock(&self.state).items.len()
    }
}

impl NavigationStrategy for BfsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Bfs
    }

    fn next_item(&self) -> NavResult<LearningItem> {
        let mut state = write_lock(&self.state);
        let start = state.cursor;
        let found = state
            .items
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, item)| !state.viewed.contains(&item.urn))
            .map(|(index, item)| (index, item.clone()));

        let (index, item) = found.ok_or(NavigationError::NoMoreItems)?;
        state.cursor = index;
        Ok(item.with_context(ItemContext::List))
    }

    fn on_view(&self, urn: &str) {
        write_lock(&self.state).viewed.insert(urn.to_string());
    }

    fn on_follow_link(&self, _from: &str, _to: &str) -> NavResult<()> {
        Err(NavigationError::SwitchStrategy)
    }

    fn on_go_back(&self) -> NavResult<LearningItem> {
        Err(NavigationError::Unsupported {
            strategy: "bfs",
            operation: "go_back",
        })
    }

    fn reset(&self) {
        let mut state = write_lock(&self.state);
        state.cursor = 0;
        state.viewed.clear();
    }
}
