//! Row conversion and queries for the `memory_cards` table.

use super::sql::{
    format_json_map, format_timestamp, parse_json_map, parse_optional_timestamp, parse_timestamp,
    to_sql_count,
};
use crate::models::{
    BookmarkId, CardClassification, CardFilter, CardId, CardStatus, MemoryCard, NewCard, Urn,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const COLUMNS: &str = "id, urn, bookmark_id, front, back, content, classification, status, \
     version, ease_factor, interval_days, repetition, next_review, card_type, author, \
     is_private, metadata, created_at, updated_at";

/// Internal representation of a memory card row.
#[derive(Debug)]
struct CardRow {
    id: i64,
    urn: Option<String>,
    bookmark_id: i64,
    front: String,
    back: String,
    content: String,
    classification: String,
    status: String,
    version: i64,
    ease_factor: f64,
    interval_days: i64,
    repetition: i64,
    next_review: Option<String>,
    card_type: String,
    author: Option<String>,
    is_private: bool,
    metadata: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CardRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            urn: row.get(1)?,
            bookmark_id: row.get(2)?,
            front: row.get(3)?,
            back: row.get(4)?,
            content: row.get(5)?,
            classification: row.get(6)?,
            status: row.get(7)?,
            version: row.get(8)?,
            ease_factor: row.get(9)?,
            interval_days: row.get(10)?,
            repetition: row.get(11)?,
            next_review: row.get(12)?,
            card_type: row.get(13)?,
            author: row.get(14)?,
            is_private: row.get(15)?,
            metadata: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }

    fn into_card(self) -> Result<MemoryCard> {
        let status = CardStatus::normalize_legacy(&self.status).ok_or_else(|| {
            Error::Parse(format!(
                "card {} has unknown status {:?}",
                self.id, self.status
            ))
        })?;

        Ok(MemoryCard {
            id: CardId(self.id),
            urn: self
                .urn
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| Urn::for_card(self.id).to_string()),
            bookmark_id: BookmarkId(self.bookmark_id),
            front: self.front,
            back: self.back,
            content: self.content,
            classification: CardClassification::parse(&self.classification).unwrap_or_default(),
            status,
            version: self.version,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            repetition: self.repetition,
            next_review: parse_optional_timestamp(self.next_review.as_deref())?,
            card_type: self.card_type,
            author: self.author,
            is_private: self.is_private,
            metadata: parse_json_map(self.metadata.as_deref())?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<CardRow>>,
    operation: &str,
) -> Result<Vec<MemoryCard>> {
    rows.map(|row| row.map_err(|e| Error::store(operation, e))?.into_card())
        .collect()
}

/// Inserts a card with default scheduling state and assigns its URN.
///
/// The URN embeds the row id, so the row is inserted first and the URN
/// written by a second statement in the same transaction.
pub fn insert(conn: &Connection, card: &NewCard, now: DateTime<Utc>) -> Result<CardId> {
    let now = format_timestamp(&now);
    conn.execute(
        "INSERT INTO memory_cards (urn, bookmark_id, front, back, content, classification, \
         status, version, ease_factor, interval_days, repetition, card_type, author, \
         is_private, metadata, created_at, updated_at) \
         VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, 1, 0, ?8, ?9, ?10, '{}', ?11, ?11)",
        params![
            card.bookmark_id.0,
            card.front,
            card.back,
            card.content,
            card.classification.as_str(),
            CardStatus::New.as_str(),
            crate::models::DEFAULT_EASE_FACTOR,
            card.card_type,
            card.author,
            card.is_private,
            now,
        ],
    )
    .map_err(|e| Error::store("insert_card", e))?;

    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE memory_cards SET urn = ?2 WHERE id = ?1",
        params![id, Urn::for_card(id).to_string()],
    )
    .map_err(|e| Error::store("assign_card_urn", e))?;

    Ok(CardId(id))
}

/// Fetches a card by id.
pub fn fetch(conn: &Connection, id: CardId) -> Result<Option<MemoryCard>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM memory_cards WHERE id = ?1"),
        params![id.0],
        CardRow::read,
    )
    .optional()
    .map_err(|e| Error::store("fetch_card", e))?
    .map(CardRow::into_card)
    .transpose()
}

/// Fetches a card by URN.
pub fn fetch_by_urn(conn: &Connection, urn: &str) -> Result<Option<MemoryCard>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM memory_cards WHERE urn = ?1"),
        params![urn],
        CardRow::read,
    )
    .optional()
    .map_err(|e| Error::store("fetch_card_by_urn", e))?
    .map(CardRow::into_card)
    .transpose()
}

/// Lists cards matching a filter, ordered by id.
pub fn list(conn: &Connection, filter: &CardFilter) -> Result<Vec<MemoryCard>> {
    let mut clauses = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();

    if let Some(bookmark_id) = filter.bookmark_id {
        values.push(SqlValue::Integer(bookmark_id.0));
        clauses.push(format!("bookmark_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(SqlValue::Text(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(due_before) = filter.due_before {
        values.push(SqlValue::Text(format_timestamp(&due_before)));
        clauses.push(format!(
            "next_review IS NOT NULL AND next_review <= ?{}",
            values.len()
        ));
    }
    if let Some(author) = &filter.author {
        values.push(SqlValue::Text(author.clone()));
        clauses.push(format!("author = ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    // LIMIT -1 is SQLite's "no limit".
    values.push(SqlValue::Integer(filter.limit.map_or(-1, to_sql_count)));
    let limit_param = values.len();
    values.push(SqlValue::Integer(to_sql_count(filter.offset)));
    let offset_param = values.len();

    let sql = format!(
        "SELECT {COLUMNS} FROM memory_cards {where_clause} \
         ORDER BY id LIMIT ?{limit_param} OFFSET ?{offset_param}"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::store("prepare_list_cards", e))?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), CardRow::read)
        .map_err(|e| Error::store("list_cards", e))?;
    collect(rows, "list_cards")
}

/// Lists cards due at `now`, soonest first, skipping archived and mastered.
pub fn due(conn: &Connection, now: DateTime<Utc>, limit: usize) -> Result<Vec<MemoryCard>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM memory_cards \
             WHERE next_review IS NOT NULL AND next_review <= ?1 \
             AND status NOT IN ('archived', 'mastered') \
             ORDER BY next_review, id LIMIT ?2"
        ))
        .map_err(|e| Error::store("prepare_due_cards", e))?;
    let rows = stmt
        .query_map(
            params![format_timestamp(&now), to_sql_count(limit)],
            CardRow::read,
        )
        .map_err(|e| Error::store("due_cards", e))?;
    collect(rows, "due_cards")
}

/// Writes every mutable column of `card` if the stored version still equals
/// `expected_version`, bumping the version by one.
///
/// Returns `false` when no row matched, which means either the card is gone
/// or another writer committed first.
pub fn cas_update(conn: &Connection, card: &MemoryCard, expected_version: i64) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE memory_cards SET front = ?3, back = ?4, content = ?5, classification = ?6, \
             status = ?7, ease_factor = ?8, interval_days = ?9, repetition = ?10, \
             next_review = ?11, card_type = ?12, author = ?13, is_private = ?14, \
             metadata = ?15, updated_at = ?16, version = version + 1 \
             WHERE id = ?1 AND version = ?2",
            params![
                card.id.0,
                expected_version,
                card.front,
                card.back,
                card.content,
                card.classification.as_str(),
                card.status.as_str(),
                card.ease_factor,
                card.interval_days,
                card.repetition,
                card.next_review.as_ref().map(format_timestamp),
                card.card_type,
                card.author,
                card.is_private,
                format_json_map(&card.metadata),
                format_timestamp(&card.updated_at),
            ],
        )
        .map_err(|e| Error::store("update_card", e))?;
    Ok(updated == 1)
}

/// Hard-deletes a card. Returns `false` if it did not exist.
pub fn delete(conn: &Connection, id: CardId) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM memory_cards WHERE id = ?1", params![id.0])
        .map_err(|e| Error::store("delete_card", e))?;
    Ok(deleted > 0)
}

/// Mean ease factor across a bookmark's cards, `None` if it has none.
pub fn average_ease(conn: &Connection, bookmark_id: BookmarkId) -> Result<Option<f64>> {
    conn.query_row(
        "SELECT AVG(ease_factor) FROM memory_cards WHERE bookmark_id = ?1",
        params![bookmark_id.0],
        |row| row.get(0),
    )
    .map_err(|e| Error::store("average_ease", e))
}
