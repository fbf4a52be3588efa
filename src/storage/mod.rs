//! Persistent storage for the study engine.
//!
//! The store is a single `SQLite` database:
//!
//! - [`Database`]: connection handle and transaction scope
//! - [`migrations`]: versioned schema plus legacy row repair
//! - [`sqlite`]: per-table row modules used by the services
//! - [`CrossReferenceSource`]: seam read by the navigation item graph

mod database;
pub mod migrations;
pub mod sqlite;
mod traits;

pub use database::Database;
pub use traits::CrossReferenceSource;
