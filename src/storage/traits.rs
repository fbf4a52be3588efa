//! Storage seams consumed outside the store.

use crate::Result;
use crate::models::CrossReference;

/// Source of persisted cross references for building the item graph.
///
/// Implementations must be `Send + Sync` so a navigation manager can be
/// shared across threads.
pub trait CrossReferenceSource: Send + Sync {
    /// Returns every cross reference whose source is one of `source_item_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn cross_references_from(&self, source_item_ids: &[String]) -> Result<Vec<CrossReference>>;
}
