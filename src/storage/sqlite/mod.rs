//! `SQLite` row modules and shared helpers.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition with poison recovery, pragmas
//! - [`sql`]: timestamp and JSON column encoding
//! - [`metrics`]: per-operation metrics
//! - one `*_row` module per table, holding its row struct and queries
//!
//! Row functions take a borrowed [`rusqlite::Connection`] and never open
//! transactions themselves; the service layer composes them inside
//! [`crate::storage::Database::transaction`].

mod connection;
mod metrics;
mod sql;

pub mod bookmark_row;
pub mod card_row;
pub mod cross_reference_row;
pub mod history_row;
pub mod note_row;
pub mod session_row;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use sql::{
    format_timestamp, from_sql_count, parse_optional_timestamp, parse_timestamp, to_sql_count,
};
