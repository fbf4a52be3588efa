//! Routes learner events to the active strategy and switches between them.

use super::{
    BfsStrategy, DfsStrategy, ItemContext, ItemGraph, LearningItem, NavResult, NavigationError,
    NavigationStrategy, StrategyKind, read_lock, write_lock,
};
use crate::Result;
use crate::storage::CrossReferenceSource;
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Snapshot of a manager's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationProgress {
    /// Active strategy.
    pub strategy: StrategyKind,
    /// Distinct items marked viewed.
    pub viewed_count: usize,
    /// Distinct items marked learned.
    pub completed_count: usize,
    /// Items available.
    pub total_items: usize,
    /// BFS completion percentage.
    pub bfs_progress: f64,
    /// Depth of the DFS stack.
    pub dfs_stack_depth: usize,
}

struct ManagerState {
    items: Vec<LearningItem>,
    current: StrategyKind,
    bfs: BfsStrategy,
    dfs: DfsStrategy,
    viewed_items: Vec<String>,
    completed_items: Vec<String>,
    path_stack: Vec<String>,
}

impl ManagerState {
    fn new(items: Vec<LearningItem>, graph: ItemGraph) -> Self {
        Self {
            bfs: BfsStrategy::new(items.clone()),
            dfs: DfsStrategy::new(&items, Arc::new(graph)),
            items,
            current: StrategyKind::Bfs,
            viewed_items: Vec::new(),
            completed_items: Vec::new(),
            path_stack: Vec::new(),
        }
    }

    fn active(&self) -> &dyn NavigationStrategy {
        match self.current {
            StrategyKind::Bfs => &self.bfs,
            StrategyKind::Dfs => &self.dfs,
        }
    }

    /// Activates BFS, telling it about everything viewed while DFS was active.
    fn fall_back_to_bfs(&mut self) {
        if self.current == StrategyKind::Bfs {
            return;
        }
        self.current = StrategyKind::Bfs;
        for urn in &self.viewed_items {
            self.bfs.on_view(urn);
        }
        metrics::counter!("navigation_strategy_switches_total", "to" => "bfs").increment(1);
        tracing::debug!("DFS exhausted, switched to BFS");
    }

    fn find(&self, urn: &str) -> Option<&LearningItem> {
        self.items.iter().find(|item| item.urn == urn)
    }
}

fn push_unique(list: &mut Vec<String>, urn: &str) {
    if !list.iter().any(|existing| existing == urn) {
        list.push(urn.to_string());
    }
}

/// One learner's navigation session.
///
/// Holds a BFS and a DFS strategy over the same items. Following a link
/// activates DFS; when DFS has nothing left, BFS takes over. Every public
/// method holds the manager lock for its whole duration.
///
/// ```
/// use v2e_study::navigation::{LearningItem, StrategyKind, StrategyManager};
///
/// let items = vec![
///     LearningItem::new("cve", "CVE-2024-0001", "A")?,
///     LearningItem::new("cwe", "CWE-79", "B")?,
/// ];
/// let manager = StrategyManager::new(items.clone());
///
/// let first = manager.get_next_item()?.expect("item");
/// assert_eq!(first.urn, items[0].urn);
///
/// manager.follow_link(&items[0].urn, &items[1].urn)?;
/// assert_eq!(manager.current_strategy(), StrategyKind::Dfs);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct StrategyManager {
    state: RwLock<ManagerState>,
    source: Option<Arc<dyn CrossReferenceSource>>,
}

impl StrategyManager {
    /// Creates a manager whose item graph uses the fallback type fan-out.
    #[must_use]
    pub fn new(items: Vec<LearningItem>) -> Self {
        let graph = ItemGraph::new();
        graph.add_fallback_links(&items);
        Self {
            state: RwLock::new(ManagerState::new(items, graph)),
            source: None,
        }
    }

    /// Creates a manager whose item graph is built from `source`'s cross
    /// references.
    ///
    /// # Errors
    ///
    /// Returns the source's error.
    pub fn with_source(
        items: Vec<LearningItem>,
        source: Arc<dyn CrossReferenceSource>,
    ) -> Result<Self> {
        let graph = ItemGraph::build(&items, Some(source.as_ref()))?;
        Ok(Self {
            state: RwLock::new(ManagerState::new(items, graph)),
            source: Some(source),
        })
    }

    /// Serves the next item, falling back to BFS once if DFS is exhausted.
    ///
    /// Returns `Ok(None)` when every item has been served.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::ItemNotFound`] if a stacked URN does not
    /// name a known item.
    pub fn get_next_item(&self) -> NavResult<Option<LearningItem>> {
        let mut state = write_lock(&self.state);
        let depth = state.dfs.stack_depth();
        let first = state.active().next_item();
        if state.dfs.stack_depth() < depth {
            state.path_stack.pop();
        }
        let result = match first {
            Err(NavigationError::SwitchStrategy) => {
                state.fall_back_to_bfs();
                state.bfs.next_item()
            }
            other => other,
        };
        finish(result)
    }

    /// Records a view.
    pub fn mark_viewed(&self, urn: &str) {
        let mut state = write_lock(&self.state);
        push_unique(&mut state.viewed_items, urn);
        state.active().on_view(urn);
    }

    /// Records that an item was learned.
    pub fn mark_learned(&self, urn: &str) {
        let mut state = write_lock(&self.state);
        push_unique(&mut state.completed_items, urn);
    }

    /// Follows a link from `from` to `to`, activating DFS.
    ///
    /// An empty `from` follows a link without an origin.
    ///
    /// # Errors
    ///
    /// Propagates a DFS refusal; none is expected.
    pub fn follow_link(&self, from: &str, to: &str) -> NavResult<()> {
        let mut state = write_lock(&self.state);
        state.current = StrategyKind::Dfs;
        if !from.is_empty() {
            state.path_stack.push(from.to_string());
        }
        push_unique(&mut state.viewed_items, to);
        state.dfs.on_follow_link(from, to)?;
        tracing::debug!(from, to, "Followed link");
        Ok(())
    }

    /// Steps back to the origin of the most recent follow.
    ///
    /// An unserved follow target is dropped. Returns `Ok(None)` when there is nothing to go back to.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::ItemNotFound`] if the previous URN does
    /// not name a known item.
    pub fn go_back(&self) -> NavResult<Option<LearningItem>> {
        let mut state = write_lock(&self.state);
        if state.current == StrategyKind::Dfs {
            let popped = state.dfs.on_go_back();
            match popped {
                Ok(item) => {
                    state.path_stack.pop();
                    return Ok(Some(item));
                }
                Err(NavigationError::SwitchStrategy) => state.fall_back_to_bfs(),
                Err(err) => return Err(err),
            }
        }

        let Some(urn) = state.path_stack.pop() else {
            return Ok(None);
        };
        state
            .find(&urn)
            .cloned()
            .map(|item| Some(item.with_context(ItemContext::DeepDive)))
            .ok_or(NavigationError::ItemNotFound(urn))
    }

    /// Replaces the item list, rebuilding both strategies and the graph.
    ///
    /// The active strategy and the viewed, learned and path lists are kept;
    /// BFS is told about the viewed items again. The rebuilt DFS starts
    /// empty, so [`go_back`](Self::go_back) resolves origins from the path
    /// list.
    ///
    /// # Errors
    ///
    /// Returns the cross reference source's error; the manager is left
    /// unchanged in that case.
    pub fn update_items(&self, items: Vec<LearningItem>) -> Result<()> {
        let graph = match &self.source {
            Some(source) => ItemGraph::build(&items, Some(source.as_ref()))?,
            None => {
                let graph = ItemGraph::new();
                graph.add_fallback_links(&items);
                graph
            }
        };

        let links = graph.link_count();
        let mut state = write_lock(&self.state);
        state.bfs = BfsStrategy::new(items.clone());
        for urn in &state.viewed_items {
            state.bfs.on_view(urn);
        }
        state.dfs = DfsStrategy::new(&items, Arc::new(graph));
        state.items = items;
        tracing::debug!(items = state.items.len(), links, "Updated navigation items");
        Ok(())
    }

    /// Clears all traversal state. The active strategy is kept.
    pub fn reset(&self) {
        let mut state = write_lock(&self.state);
        state.bfs.reset();
        state.dfs.reset();
        state.viewed_items.clear();
        state.completed_items.clear();
        state.path_stack.clear();
    }

    /// Returns a progress snapshot.
    #[must_use]
    pub fn get_progress(&self) -> NavigationProgress {
        let state = read_lock(&self.state);
        NavigationProgress {
            strategy: state.current,
            viewed_count: state.viewed_items.len(),
            completed_count: state.completed_items.len(),
            total_items: state.items.len(),
            bfs_progress: state.bfs.progress(),
            dfs_stack_depth: state.dfs.stack_depth(),
        }
    }

    /// The active strategy.
    #[must_use]
    pub fn current_strategy(&self) -> StrategyKind {
        read_lock(&self.state).current
    }

    /// Known items linked from `urn`, in link order.
    #[must_use]
    pub fn related_items(&self, urn: &str) -> Vec<LearningItem> {
        let state = read_lock(&self.state);
        state
            .dfs
            .links_from(urn)
            .iter()
            .filter_map(|target| state.find(target).cloned())
            .collect()
    }

    /// URNs marked viewed, in first-view order.
    #[must_use]
    pub fn viewed_items(&self) -> Vec<String> {
        read_lock(&self.state).viewed_items.clone()
    }

    /// URNs marked learned.
    #[must_use]
    pub fn completed_items(&self) -> Vec<String> {
        read_lock(&self.state).completed_items.clone()
    }

    /// Origins of followed links, oldest first.
    #[must_use]
    pub fn path_stack(&self) -> Vec<String> {
        read_lock(&self.state).path_stack.clone()
    }

    /// The items being navigated.
    #[must_use]
    pub fn items(&self) -> Vec<LearningItem> {
        read_lock(&self.state).items.clone()
    }
}

impl std::fmt::Debug for StrategyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = read_lock(&self.state);
        f.debug_struct("StrategyManager")
            .field("current", &state.current)
            .field("items", &state.items.len())
            .field("has_source", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

fn finish(result: NavResult<LearningItem>) -> NavResult<Option<LearningItem>> {
    match result {
        Ok(item) => Ok(Some(item)),
        Err(NavigationError::NoMoreItems | NavigationError::SwitchStrategy) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrossReference, RelationshipType};
    use chrono::Utc;

    fn abc() -> Vec<LearningItem> {
        vec![
            LearningItem::new("cve", "CVE-2024-0001", "A").unwrap(),
            LearningItem::new("cwe", "CWE-79", "B").unwrap(),
            LearningItem::new("capec", "CAPEC-63", "C").unwrap(),
        ]
    }

    #[test]
    fn test_follow_link_then_back_then_bfs() {
        let items = abc();
        let (a, b, c) = (&items[0].urn, &items[1].urn, &items[2].urn);
        let manager = StrategyManager::new(items.clone());

        assert_eq!(&manager.get_next_item().unwrap().unwrap().urn, a);
        manager.mark_viewed(a);

        manager.follow_link(a, b).unwrap();
        assert_eq!(manager.current_strategy(), StrategyKind::Dfs);
        assert_eq!(manager.path_stack(), vec![a.clone()]);

        let next = manager.get_next_item().unwrap().unwrap();
        assert_eq!(&next.urn, b);
        assert_eq!(next.context, ItemContext::DeepDive);

        let back = manager.go_back().unwrap().unwrap();
        assert_eq!(&back.urn, a);
        assert_eq!(back.context, ItemContext::DeepDive);
        assert!(manager.path_stack().is_empty());

        let next = manager.get_next_item().unwrap().unwrap();
        assert_eq!(&next.urn, c);
        assert_eq!(next.context, ItemContext::List);
        assert_eq!(manager.current_strategy(), StrategyKind::Bfs);
    }

    #[test]
    fn test_exhaustion_is_none() {
        let items = abc();
        let manager = StrategyManager::new(items.clone());
        for item in &items {
            manager.mark_viewed(&item.urn);
        }
        assert_eq!(manager.get_next_item().unwrap(), None);
        assert_eq!(manager.go_back().unwrap(), None);
    }

    #[test]
    fn test_go_back_falls_back_to_path_stack() {
        let items = abc();
        let manager = StrategyManager::new(items.clone());
        manager.follow_link(&items[0].urn, &items[1].urn).unwrap();
        // The rebuilt DFS has no stack; the manager still remembers A.
        manager.update_items(items.clone()).unwrap();

        let back = manager.go_back().unwrap().unwrap();
        assert_eq!(back.urn, items[0].urn);
        assert_eq!(back.context, ItemContext::DeepDive);
        assert_eq!(manager.current_strategy(), StrategyKind::Bfs);
        assert_eq!(manager.go_back().unwrap(), None);
    }

    #[test]
    fn test_draining_dfs_pops_path_stack() {
        let items = abc();
        let manager = StrategyManager::new(items.clone());
        manager.follow_link(&items[0].urn, &items[1].urn).unwrap();

        assert_eq!(manager.get_next_item().unwrap().unwrap().urn, items[1].urn);
        assert_eq!(manager.path_stack(), vec![items[0].urn.clone()]);
        assert_eq!(manager.get_next_item().unwrap().unwrap().urn, items[0].urn);
        assert!(manager.path_stack().is_empty());
        assert_eq!(manager.go_back().unwrap(), None);
    }

    #[test]
    fn test_marks_are_unique() {
        let items = abc();
        let manager = StrategyManager::new(items.clone());
        manager.mark_viewed(&items[0].urn);
        manager.mark_viewed(&items[0].urn);
        manager.mark_learned(&items[0].urn);
        manager.mark_learned(&items[0].urn);

        let progress = manager.get_progress();
        assert_eq!(progress.viewed_count, 1);
        assert_eq!(progress.completed_count, 1);
        assert_eq!(progress.total_items, 3);
        assert_eq!(progress.strategy, StrategyKind::Bfs);
        assert!((progress.bfs_progress - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_keeps_strategy() {
        let items = abc();
        let manager = StrategyManager::new(items.clone());
        manager.follow_link(&items[0].urn, &items[1].urn).unwrap();
        manager.mark_learned(&items[1].urn);
        manager.reset();

        let progress = manager.get_progress();
        assert_eq!(progress.strategy, StrategyKind::Dfs);
        assert_eq!(progress.viewed_count, 0);
        assert_eq!(progress.completed_count, 0);
        assert_eq!(progress.dfs_stack_depth, 0);
        assert!(manager.path_stack().is_empty());
    }

    #[test]
    fn test_update_items_preserves_strategy() {
        let items = abc();
        let manager = StrategyManager::new(items[..1].to_vec());
        manager.follow_link("", &items[0].urn).unwrap();
        manager.update_items(items.clone()).unwrap();

        assert_eq!(manager.current_strategy(), StrategyKind::Dfs);
        assert_eq!(manager.items().len(), 3);
        assert_eq!(manager.get_progress().dfs_stack_depth, 0);
        // The viewed item is skipped by the rebuilt BFS.
        assert_eq!(
            manager.get_next_item().unwrap().unwrap().urn,
            items[1].urn
        );
    }

    #[test]
    fn test_related_items_from_fallback_graph() {
        let items = abc();
        let manager = StrategyManager::new(items.clone());
        let related = manager.related_items(&items[0].urn);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].urn, items[1].urn);
    }

    struct OneLink;

    impl CrossReferenceSource for OneLink {
        fn cross_references_from(&self, _ids: &[String]) -> Result<Vec<CrossReference>> {
            Ok(vec![CrossReference {
                id: 1,
                source_item_id: "CVE-2024-0001".to_string(),
                target_item_id: "CAPEC-63".to_string(),
                source_type: "cve".to_string(),
                target_type: "capec".to_string(),
                relationship: RelationshipType::Exploits,
                strength: 0.8,
                description: None,
                created_at: Utc::now(),
            }])
        }
    }

    #[test]
    fn test_with_source_uses_cross_references() {
        let items = abc();
        let manager = StrategyManager::with_source(items.clone(), Arc::new(OneLink)).unwrap();
        let related = manager.related_items(&items[0].urn);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].urn, items[2].urn);
    }

    #[test]
    fn test_concurrent_marks() {
        let items = abc();
        let manager = Arc::new(StrategyManager::new(items.clone()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let urn = items[i % items.len()].urn.clone();
                std::thread::spawn(move || {
                    manager.mark_viewed(&urn);
                    manager.get_progress()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manager.get_progress().viewed_count, 3);
    }
}
