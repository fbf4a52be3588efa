//! `SQLite` migration system for schema management.
//!
//! Migrations are embedded at compile time and applied in order when the
//! database is opened. Each migration runs in its own transaction together
//! with its `schema_migrations` record, so a failed migration leaves no
//! partial schema behind.
//!
//! After the versioned DDL, [`repair_legacy_rows`] runs on every open: it
//! back-fills URNs and FSM states on rows written before those columns were
//! populated and rewrites legacy status strings to their canonical names.
//! The repair statements only touch rows that need them, so running them
//! again is a no-op.

use super::sqlite::format_timestamp;
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// SQL to apply (may contain multiple statements separated by semicolons).
    pub sql: &'static str,
}

/// Schema of the study store.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Bookmarks, history, notes and memory cards",
        sql: r"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                global_item_id TEXT NOT NULL,
                item_type TEXT NOT NULL,
                item_id TEXT NOT NULL,
                urn TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                learning_state TEXT NOT NULL DEFAULT 'to_review',
                mastery_level REAL NOT NULL DEFAULT 0.0,
                last_reviewed TEXT,
                next_review TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_bookmarks_global_item_id ON bookmarks(global_item_id);
            CREATE INDEX IF NOT EXISTS idx_bookmarks_item_type ON bookmarks(item_type);
            CREATE INDEX IF NOT EXISTS idx_bookmarks_deleted_at ON bookmarks(deleted_at)
                WHERE deleted_at IS NOT NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bookmarks_active_key
                ON bookmarks(item_type, item_id, global_item_id) WHERE deleted_at IS NULL;

            CREATE TABLE IF NOT EXISTS bookmark_histories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
                action TEXT NOT NULL,
                old_value TEXT NOT NULL DEFAULT '',
                new_value TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                user_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_bookmark_histories_bookmark_ts
                ON bookmark_histories(bookmark_id, timestamp);

            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                urn TEXT NOT NULL DEFAULT '',
                bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
                body TEXT NOT NULL,
                author TEXT,
                is_private INTEGER NOT NULL DEFAULT 0,
                fsm_state TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notes_bookmark_id ON notes(bookmark_id);

            CREATE TABLE IF NOT EXISTS memory_cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                urn TEXT,
                bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
                front TEXT NOT NULL DEFAULT '',
                back TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '{}',
                classification TEXT NOT NULL DEFAULT 'major',
                status TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL DEFAULT 1,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 1,
                repetition INTEGER NOT NULL DEFAULT 0,
                next_review TEXT,
                card_type TEXT NOT NULL DEFAULT 'basic',
                author TEXT,
                is_private INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_cards_bookmark_id ON memory_cards(bookmark_id);
            CREATE INDEX IF NOT EXISTS idx_memory_cards_next_review ON memory_cards(next_review);
        ",
    },
    Migration {
        version: 2,
        description: "Learning sessions and cross references",
        sql: r"
            CREATE TABLE IF NOT EXISTS learning_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                strategy TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                viewed_count INTEGER NOT NULL DEFAULT 0,
                learned_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS cross_references (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_item_id TEXT NOT NULL,
                target_item_id TEXT NOT NULL,
                source_type TEXT NOT NULL,
                target_type TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                strength REAL NOT NULL DEFAULT 1.0,
                description TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cross_references_source ON cross_references(source_item_id);
            CREATE INDEX IF NOT EXISTS idx_cross_references_target ON cross_references(target_item_id);
        ",
    },
    Migration {
        version: 3,
        description: "Global item registry and URN link index",
        sql: r"
            CREATE TABLE IF NOT EXISTS global_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_type TEXT NOT NULL,
                item_id TEXT NOT NULL,
                urn TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS urn_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_urn TEXT NOT NULL,
                source_type TEXT NOT NULL,
                target_urn TEXT NOT NULL,
                target_type TEXT NOT NULL,
                relationship TEXT NOT NULL DEFAULT 'related-to',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_urn_links_source ON urn_links(source_urn, source_type);
            CREATE INDEX IF NOT EXISTS idx_urn_links_target ON urn_links(target_urn);
        ",
    },
];

/// Statements that bring legacy rows up to the current conventions.
///
/// The unique URN index on `memory_cards` is created last, once every card
/// has a URN derived from its own id.
const REPAIR_SQL: &str = r"
    UPDATE bookmarks SET learning_state = 'to_review'
        WHERE learning_state IN ('', 'to-review', 'new');
    UPDATE notes SET urn = 'v2e::note::' || id WHERE urn IS NULL OR urn = '';
    UPDATE notes SET fsm_state = 'draft' WHERE fsm_state IS NULL OR fsm_state = '';
    UPDATE memory_cards SET urn = 'v2e::card::' || id WHERE urn IS NULL OR urn = '';
    UPDATE memory_cards SET status = 'new' WHERE status IS NULL OR status = '';
    UPDATE memory_cards SET status = 'learning'
        WHERE lower(status) IN ('active', 'in-progress', 'in_progress');
    UPDATE memory_cards SET status = 'archived' WHERE lower(status) = 'archive';
    UPDATE memory_cards SET status = 'new' WHERE lower(status) IN ('to_review', 'to-review');
    CREATE UNIQUE INDEX IF NOT EXISTS idx_memory_cards_urn ON memory_cards(urn);
";

/// Runs migrations against a `SQLite` connection.
pub struct MigrationRunner<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a new migration runner.
    #[must_use]
    pub const fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub fn run(&mut self, migrations: &[Migration]) -> Result<()> {
        self.ensure_migrations_table()?;
        let current_version = self.current_version()?;

        for migration in migrations {
            if migration.version > current_version {
                self.apply_migration(migration)?;
            }
        }

        Ok(())
    }

    /// Returns the current schema version, `0` for an empty database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn current_version(&self) -> Result<i32> {
        current_version(self.conn)
    }

    fn ensure_migrations_table(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TEXT NOT NULL
                )
                ",
            )
            .map_err(|e| Error::store("create_migrations_table", e))
    }

    fn apply_migration(&mut self, migration: &Migration) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::store("migration_begin_transaction", e))?;

        tx.execute_batch(migration.sql).map_err(|e| Error::OperationFailed {
            operation: format!("migration_v{}", migration.version),
            cause: e.to_string(),
        })?;

        tx.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.description,
                format_timestamp(&Utc::now())
            ],
        )
        .map_err(|e| Error::store("record_migration", e))?;

        tx.commit()
            .map_err(|e| Error::store("migration_commit", e))?;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "Applied migration"
        );
        Ok(())
    }
}

/// Reads the highest applied migration version.
///
/// # Errors
///
/// Returns an error if the database cannot be queried.
pub fn current_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("check_migrations_table", e))?;
    if !exists {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::store("read_schema_version", e))
}

/// Back-fills URNs and FSM states and normalizes legacy status strings.
///
/// # Errors
///
/// Returns an error if any repair statement fails; the repair is rolled back.
pub fn repair_legacy_rows(conn: &mut Connection) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::store("repair_begin_transaction", e))?;
    tx.execute_batch(REPAIR_SQL)
        .map_err(|e| Error::store("repair_legacy_rows", e))?;
    tx.commit().map_err(|e| Error::store("repair_commit", e))
}

/// Maximum version across a set of migrations.
#[must_use]
pub fn max_version(migrations: &[Migration]) -> i32 {
    migrations.iter().map(|m| m.version).max().unwrap_or(0)
}
