//! Row conversion and queries for the `cross_references` table.

use super::sql::{format_timestamp, parse_timestamp};
use crate::models::{CrossReference, NewCrossReference, RelationshipType};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

const COLUMNS: &str = "id, source_item_id, target_item_id, source_type, target_type, \
     relationship_type, strength, description, created_at";

#[derive(Debug)]
struct CrossReferenceRow {
    id: i64,
    source_item_id: String,
    target_item_id: String,
    source_type: String,
    target_type: String,
    relationship: String,
    strength: f64,
    description: Option<String>,
    created_at: String,
}

impl CrossReferenceRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_item_id: row.get(1)?,
            target_item_id: row.get(2)?,
            source_type: row.get(3)?,
            target_type: row.get(4)?,
            relationship: row.get(5)?,
            strength: row.get(6)?,
            description: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_cross_reference(self) -> Result<CrossReference> {
        Ok(CrossReference {
            id: self.id,
            source_item_id: self.source_item_id,
            target_item_id: self.target_item_id,
            source_type: self.source_type,
            target_type: self.target_type,
            relationship: RelationshipType::parse(&self.relationship)
                .map_err(|e| Error::Parse(e.to_string()))?,
            strength: self.strength,
            description: self.description,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Inserts a cross reference and returns its id.
pub fn insert(conn: &Connection, new: &NewCrossReference, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO cross_references (source_item_id, target_item_id, source_type, target_type, \
         relationship_type, strength, description, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.source_item_id,
            new.target_item_id,
            new.source_type,
            new.target_type,
            new.relationship.as_str(),
            new.strength,
            new.description,
            format_timestamp(&now),
        ],
    )
    .map_err(|e| Error::store("insert_cross_reference", e))?;
    Ok(conn.last_insert_rowid())
}

fn list_where(conn: &Connection, column: &str, item_id: &str) -> Result<Vec<CrossReference>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM cross_references WHERE {column} = ?1 ORDER BY id"
        ))
        .map_err(|e| Error::store("prepare_list_cross_references", e))?;
    let rows = stmt
        .query_map(params![item_id], CrossReferenceRow::read)
        .map_err(|e| Error::store("list_cross_references", e))?;
    rows.map(|row| {
        row.map_err(|e| Error::store("list_cross_references", e))?
            .into_cross_reference()
    })
    .collect()
}

/// Lists references leaving `item_id`.
pub fn list_by_source(conn: &Connection, item_id: &str) -> Result<Vec<CrossReference>> {
    list_where(conn, "source_item_id", item_id)
}

/// Lists references arriving at `item_id`.
pub fn list_by_target(conn: &Connection, item_id: &str) -> Result<Vec<CrossReference>> {
    list_where(conn, "target_item_id", item_id)
}
