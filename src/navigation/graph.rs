//! Directed item graph keyed by URN.

use super::{LearningItem, read_lock, write_lock};
use crate::Result;
use crate::models::{ResourceType, Urn};
use crate::storage::CrossReferenceSource;
use std::collections::HashMap;
use std::sync::RwLock;

/// Maximum downstream targets per item when no cross references are
/// available.
pub const FALLBACK_FAN_OUT: usize = 3;

/// Thread-safe directed multigraph of URN → URN links.
///
/// Links are kept in insertion order and duplicates are kept.
#[derive(Debug, Default)]
pub struct ItemGraph {
    links: RwLock<HashMap<String, Vec<String>>>,
}

impl ItemGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph for `items`.
    ///
    /// With a source, every cross reference leaving one of the items becomes
    /// a link. Without one, [`fallback_links`](Self::add_fallback_links)
    /// are generated.
    ///
    /// # Errors
    ///
    /// Returns the source's error.
    pub fn build(items: &[LearningItem], source: Option<&dyn CrossReferenceSource>) -> Result<Self> {
        let graph = Self::new();
        match source {
            Some(source) => graph.add_cross_reference_links(items, source)?,
            None => graph.add_fallback_links(items),
        }
        Ok(graph)
    }

    /// Adds a link. Duplicates are kept.
    pub fn add_link(&self, from: &str, to: &str) {
        write_lock(&self.links)
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
    }

    /// Returns the outgoing links of `from`.
    #[must_use]
    pub fn get_links(&self, from: &str) -> Vec<String> {
        read_lock(&self.links)
            .get(from)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        read_lock(&self.links).values().map(Vec::len).sum()
    }

    fn add_cross_reference_links(
        &self,
        items: &[LearningItem],
        source: &dyn CrossReferenceSource,
    ) -> Result<()> {
        let ids: Vec<String> = items.iter().map(|i| i.item_id.clone()).collect();
        let by_id: HashMap<&str, &LearningItem> =
            items.iter().map(|i| (i.item_id.as_str(), i)).collect();

        let mut added = 0usize;
        for reference in source.cross_references_from(&ids)? {
            let Some(from) = by_id.get(reference.source_item_id.as_str()) else {
                continue;
            };
            // Targets outside the known catalogs have no URN and are skipped.
            let Ok(to) = Urn::for_item(&reference.target_type, &reference.target_item_id, None)
            else {
                continue;
            };
            self.add_link(&from.urn, &to.to_string());
            added += 1;
        }

        tracing::debug!(items = items.len(), links = added, "Built item graph from cross references");
        Ok(())
    }

    /// Links each item to up to [`FALLBACK_FAN_OUT`] items of the downstream
    /// type (cve → cwe → capec → attack) and chains items of the same type in
    /// list order.
    pub fn add_fallback_links(&self, items: &[LearningItem]) {
        let mut by_type: HashMap<ResourceType, Vec<&LearningItem>> = HashMap::new();
        for item in items {
            if let Some(kind) = ResourceType::from_catalog(&item.item_type) {
                by_type.entry(kind).or_default().push(item);
            }
        }

        for kind in ResourceType::all() {
            let Some(group) = by_type.get(&kind) else {
                continue;
            };
            let downstream = kind.downstream().and_then(|d| by_type.get(&d));

            for (i, item) in group.iter().enumerate() {
                if let Some(targets) = downstream {
                    for target in targets.iter().take(FALLBACK_FAN_OUT) {
                        self.add_link(&item.urn, &target.urn);
                    }
                }
                if let Some(next) = group.get(i + 1) {
                    self.add_link(&item.urn, &next.urn);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrossReference, RelationshipType};
    use chrono::Utc;

    fn item(kind: &str, id: &str) -> LearningItem {
        LearningItem::new(kind, id, id).unwrap()
    }

    struct FixedSource(Vec<CrossReference>);

    impl CrossReferenceSource for FixedSource {
        fn cross_references_from(&self, ids: &[String]) -> Result<Vec<CrossReference>> {
            Ok(self
                .0
                .iter()
                .filter(|r| ids.contains(&r.source_item_id))
                .cloned()
                .collect())
        }
    }

    fn reference(id: i64, source: &str, target_type: &str, target: &str) -> CrossReference {
        CrossReference {
            id,
            source_item_id: source.to_string(),
            target_item_id: target.to_string(),
            source_type: "cve".to_string(),
            target_type: target_type.to_string(),
            relationship: RelationshipType::RelatedTo,
            strength: 1.0,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_link_keeps_duplicates() {
        let graph = ItemGraph::new();
        graph.add_link("a", "b");
        graph.add_link("a", "b");
        graph.add_link("a", "c");
        assert_eq!(graph.get_links("a"), vec!["b", "b", "c"]);
        assert_eq!(graph.link_count(), 3);
        assert!(graph.get_links("z").is_empty());
    }

    #[test]
    fn test_get_links_returns_copy() {
        let graph = ItemGraph::new();
        graph.add_link("a", "b");
        let mut links = graph.get_links("a");
        links.push("x".to_string());
        assert_eq!(graph.get_links("a"), vec!["b"]);
    }

    #[test]
    fn test_fallback_fan_out_and_chaining() {
        let items = vec![
            item("cve", "CVE-1"),
            item("cve", "CVE-2"),
            item("cwe", "CWE-1"),
            item("cwe", "CWE-2"),
            item("cwe", "CWE-3"),
            item("cwe", "CWE-4"),
            item("capec", "CAPEC-1"),
        ];
        let graph = ItemGraph::build(&items, None).unwrap();

        // Three cwe targets, then the next cve.
        assert_eq!(
            graph.get_links(&items[0].urn),
            vec![
                items[2].urn.clone(),
                items[3].urn.clone(),
                items[4].urn.clone(),
                items[1].urn.clone(),
            ]
        );
        // The last cwe links to capec only.
        assert_eq!(graph.get_links(&items[5].urn), vec![items[6].urn.clone()]);
        // capec has no downstream items and no successor.
        assert!(graph.get_links(&items[6].urn).is_empty());
    }

    #[test]
    fn test_build_from_cross_references() {
        let items = vec![item("cve", "CVE-1"), item("cwe", "CWE-79")];
        let source = FixedSource(vec![
            reference(1, "CVE-1", "cwe", "CWE-79"),
            reference(2, "CVE-1", "blog", "post-1"),
            reference(3, "CVE-9", "cwe", "CWE-1"),
        ]);
        let graph = ItemGraph::build(&items, Some(&source)).unwrap();
        assert_eq!(graph.get_links(&items[0].urn), vec![items[1].urn.clone()]);
        assert_eq!(graph.link_count(), 1);
    }
}
