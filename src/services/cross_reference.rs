//! Cross references between external catalog items.

use crate::cancel::CancellationToken;
use crate::models::{CrossReference, NewCrossReference};
use crate::storage::sqlite::cross_reference_row;
use crate::storage::{CrossReferenceSource, Database};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;

/// Service for cross reference operations.
pub struct CrossReferenceService {
    db: Arc<Database>,
}

impl CrossReferenceService {
    /// Creates a cross reference service over `db`.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Stores a new cross reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an id or type is empty or the
    /// strength is outside `[0.0, 1.0]`, or a store error.
    pub fn create(&self, new: &NewCrossReference) -> Result<CrossReference> {
        self.create_with_cancel(new, &CancellationToken::new())
    }

    /// [`create`](Self::create) with a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create); also [`Error::Cancelled`].
    pub fn create_with_cancel(
        &self,
        new: &NewCrossReference,
        cancel: &CancellationToken,
    ) -> Result<CrossReference> {
        for (field, value) in [
            ("source_item_id", &new.source_item_id),
            ("target_item_id", &new.target_item_id),
            ("source_type", &new.source_type),
            ("target_type", &new.target_type),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!("{field} is required")));
            }
        }
        if !(0.0..=1.0).contains(&new.strength) {
            return Err(Error::InvalidInput(format!(
                "strength must be within [0, 1], got {}",
                new.strength
            )));
        }

        let now = Utc::now();
        let id = self
            .db
            .transaction("create_cross_reference", cancel, |tx| {
                cross_reference_row::insert(tx, new, now)
            })?;

        tracing::info!(
            source = %new.source_item_id,
            target = %new.target_item_id,
            relationship = %new.relationship,
            "Created cross reference"
        );
        Ok(CrossReference {
            id,
            source_item_id: new.source_item_id.clone(),
            target_item_id: new.target_item_id.clone(),
            source_type: new.source_type.clone(),
            target_type: new.target_type.clone(),
            relationship: new.relationship,
            strength: new.strength,
            description: new.description.clone(),
            created_at: now,
        })
    }

    /// Lists references leaving `item_id`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_by_source(&self, item_id: &str) -> Result<Vec<CrossReference>> {
        self.db.read("list_cross_references_by_source", |conn| {
            cross_reference_row::list_by_source(conn, item_id)
        })
    }

    /// Lists references arriving at `item_id`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn list_by_target(&self, item_id: &str) -> Result<Vec<CrossReference>> {
        self.db.read("list_cross_references_by_target", |conn| {
            cross_reference_row::list_by_target(conn, item_id)
        })
    }
}

impl CrossReferenceSource for CrossReferenceService {
    fn cross_references_from(&self, source_item_ids: &[String]) -> Result<Vec<CrossReference>> {
        self.db.read("cross_references_from", |conn| {
            let mut all = Vec::new();
            for id in source_item_ids {
                all.extend(cross_reference_row::list_by_source(conn, id)?);
            }
            Ok(all)
        })
    }
}
