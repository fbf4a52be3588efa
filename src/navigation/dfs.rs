//! Depth-first navigation along followed links.

use super::{
    ItemContext, ItemGraph, LearningItem, NavResult, NavigationError, NavigationStrategy,
    StrategyKind, read_lock, write_lock,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct DfsState {
    pending: Option<String>,
    stack: Vec<String>,
    viewed: HashSet<String>,
    items: HashMap<String, LearningItem>,
}

impl DfsState {
    fn resolve(&self, urn: String) -> NavResult<LearningItem> {
        self.items
            .get(&urn)
            .cloned()
            .map(|item| item.with_context(ItemContext::DeepDive))
            .ok_or(NavigationError::ItemNotFound(urn))
    }
}

/// Walks a stack of followed links.
///
/// Following `A → B` pushes the origin `A` and holds `B` as the pending
/// target; [`next_item`](NavigationStrategy::next_item) serves `B` first,
/// then pops origins. Going back pops the origin and drops an unserved
/// target. An empty stack with nothing pending signals
/// [`NavigationError::SwitchStrategy`].
#[derive(Debug)]
pub struct DfsStrategy {
    state: RwLock<DfsState>,
    graph: Arc<ItemGraph>,
}

impl DfsStrategy {
    /// Creates a strategy resolving URNs against `items` and reading links
    /// from `graph`.
    #[must_use]
    pub fn new(items: &[LearningItem], graph: Arc<ItemGraph>) -> Self {
        let items = items
            .iter()
            .map(|item| (item.urn.clone(), item.clone()))
            .collect();
        Self {
            state: RwLock::new(DfsState {
                items,
                ..DfsState::default()
            }),
            graph,
        }
    }

    /// Number of origins on the backtrack stack.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        read_lock(&self.state).stack.len()
    }

    /// Whether a followed target is waiting to be served.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        read_lock(&self.state).pending.is_some()
    }

    /// Number of distinct URNs viewed.
    #[must_use]
    pub fn viewed_count(&self) -> usize {
        read_lock(&self.state).viewed.len()
    }

    /// Outgoing links of `urn` in the shared graph.
    #[must_use]
    pub fn links_from(&self, urn: &str) -> Vec<String> {
        self.graph.get_links(urn)
    }
}

impl NavigationStrategy for DfsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dfs
    }

    fn next_item(&self) -> NavResult<LearningItem> {
        let mut state = write_lock(&self.state);
        let urn = match state.pending.take() {
            Some(urn) => urn,
            None => state.stack.pop().ok_or(NavigationError::SwitchStrategy)?,
        };
        state.viewed.insert(urn.clone());
        state.resolve(urn)
    }

    fn on_view(&self, urn: &str) {
        write_lock(&self.state).viewed.insert(urn.to_string());
    }

    fn on_follow_link(&self, from: &str, to: &str) -> NavResult<()> {
        let mut state = write_lock(&self.state);
        if !from.is_empty() {
            state.stack.push(from.to_string());
        }
        state.pending = Some(to.to_string());
        state.viewed.insert(to.to_string());
        Ok(())
    }

    fn on_go_back(&self) -> NavResult<LearningItem> {
        let mut state = write_lock(&self.state);
        state.pending = None;
        let urn = state.stack.pop().ok_or(NavigationError::SwitchStrategy)?;
        state.resolve(urn)
    }

    fn reset(&self) {
        let mut state = write_lock(&self.state);
        state.pending = None;
        state.stack.clear();
        state.viewed.clear();
    }
}
