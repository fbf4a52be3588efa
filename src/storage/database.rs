//! The study store handle.
//!
//! A [`Database`] owns one `SQLite` connection behind a mutex. Services
//! borrow it for the duration of one transaction; nothing is held open
//! between operations.

use super::migrations::{self, MIGRATIONS, MigrationRunner};
use super::sqlite::{acquire_lock, configure_connection, record_operation_metrics};
use crate::cancel::CancellationToken;
use crate::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

/// Handle to the persistent study store.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and migrates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be opened or a
    /// migration fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::store("create_database_dir", e))?;
        }

        let conn = Connection::open(path).map_err(|e| Error::store("open_database", e))?;
        let db = Self::from_connection(conn, Some(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "Opened study database");
        Ok(db)
    }

    /// Opens a private in-memory database (for tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::store("open_database", e))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn)?;
        MigrationRunner::new(&mut conn).run(MIGRATIONS)?;
        migrations::repair_legacy_rows(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Returns the database file path, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the applied schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version table cannot be read.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = acquire_lock(&self.conn);
        migrations::current_version(&conn)
    }

    /// Runs `f` inside one immediate-mode transaction.
    ///
    /// The transaction commits only if `f` returns `Ok` and `cancel` has not
    /// fired; any error, cancellation or panic rolls it back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fired before the transaction
    /// opened or before commit, the error from `f`, or
    /// [`Error::OperationFailed`] if the transaction cannot be opened or
    /// committed.
    pub fn transaction<T>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = self.run_transaction(operation, cancel, f);
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(operation, start, status);
        result
    }

    fn run_transaction<T>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        cancel.check(operation)?;

        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::store(operation, e))?;

        // Dropping `tx` on any early return rolls back.
        let value = f(&tx)?;
        cancel.check(operation)?;

        tx.commit().map_err(|e| Error::store(operation, e))?;
        Ok(value)
    }

    /// Runs a read-only closure against the connection.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`.
    pub fn read<T>(&self, operation: &'static str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = f(&conn);
        drop(conn);
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(operation, start, status);
        result
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn count_rows(db: &Database) -> i64 {
        db.read("count", |conn| {
            conn.query_row("SELECT COUNT(*) FROM learning_sessions", [], |row| row.get(0))
                .map_err(|e| Error::store("count", e))
        })
        .unwrap()
    }

    fn insert_session(tx: &Transaction<'_>) -> Result<()> {
        tx.execute(
            "INSERT INTO learning_sessions (strategy, started_at) VALUES ('bfs', ?1)",
            params!["2024-01-01T00:00:00.000000000Z"],
        )
        .map_err(|e| Error::store("insert", e))?;
        Ok(())
    }

    #[test]
    fn test_in_memory_is_migrated() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 3);
        assert!(db.path().is_none());
    }

    #[test]
    fn test_transaction_commits() {
        let db = Database::in_memory().unwrap();
        db.transaction("insert", &CancellationToken::new(), insert_session)
            .unwrap();
        assert_eq!(count_rows(&db), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<()> = db.transaction("insert", &CancellationToken::new(), |tx| {
            insert_session(tx)?;
            Err(Error::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn test_cancelled_before_commit_rolls_back() {
        let db = Database::in_memory().unwrap();
        let cancel = CancellationToken::new();
        let result = db.transaction("insert", &cancel, |tx| {
            insert_session(tx)?;
            cancel.cancel();
            Ok(())
        });
        assert!(matches!(result, Err(Error::Cancelled(_))));
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn test_cancelled_before_open() {
        let db = Database::in_memory().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ran = false;
        let result = db.transaction("insert", &cancel, |_| {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Cancelled(_))));
        assert!(!ran);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("study.db");
        let db = Database::open(&path).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
    }
}
