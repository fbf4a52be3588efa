//! Connection handling for the `SQLite` store.
//!
//! Utilities for mutex acquisition with poison recovery and for connection
//! configuration.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (a previous critical section panicked), the inner
/// value is recovered and a warning logged. A panic inside a transaction
/// drops the transaction first, so the connection is rolled back and usable.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for the study store.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds on lock contention
/// - **`foreign_keys`**: enforces note/card ownership by bookmarks
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the busy timeout or foreign keys
/// cannot be set.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns the resulting mode as a row, so the result of the
    // pragma itself is ignored; in-memory databases stay in "memory" mode.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");

    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| Error::store("set_busy_timeout", e))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::store("enable_foreign_keys", e))?;

    Ok(())
}
