//! CLI command implementations.
//!
//! The binary parses arguments with `clap` and hands each subcommand to one
//! of the modules here. Commands write to any [`Write`] so they can be
//! exercised without a terminal.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bookmark` | Create, list, inspect, and revert bookmarks |
//! | `card` | List, review, and transition memory cards |
//! | `note` | Attach rich-text notes to bookmarks |
//! | `xref` | Record cross references between catalog items |
//! | `migrate` | Bring the database schema up to date |
//! | `navigate` | Walk bookmarked items with the navigation engine |
//!
//! # Example Usage
//!
//! ```bash
//! v2e-study bookmark add --global g-1 --type CVE --id CVE-2024-0001 --title "Heap overflow"
//! v2e-study card review 1 good
//! v2e-study bookmark revert 1
//! v2e-study --format json navigate --steps 10 --follow
//! ```

mod bookmark;
mod card;
mod navigate;
mod note;
mod xref;

pub use bookmark::{BookmarkCommand, run as run_bookmark};
pub use card::{CardCommand, run as run_card};
pub use navigate::{NavigateArgs, run as run_navigate};
pub use note::{NoteCommand, run as run_note};
pub use xref::{XrefCommand, run as run_xref};

use crate::config::StudyConfig;
use crate::services::Services;
use crate::storage::Database;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Everything a command needs: the database, the services over it, and
/// where and how to print.
pub struct CommandContext<'a> {
    /// Open database.
    pub db: Arc<Database>,
    /// Services wired to `db`.
    pub services: Services,
    /// Output format.
    pub format: OutputFormat,
    /// Output sink.
    pub out: &'a mut dyn Write,
}

impl<'a> CommandContext<'a> {
    /// Builds a context over `db` using `config` for service settings.
    pub fn new(
        db: Arc<Database>,
        config: &StudyConfig,
        format: OutputFormat,
        out: &'a mut dyn Write,
    ) -> Self {
        let services = Services::new(&db, config);
        Self {
            db,
            services,
            format,
            out,
        }
    }

    /// Prints `value` as JSON, or through `text` in text mode.
    pub(crate) fn emit<T: Serialize>(
        &mut self,
        value: &T,
        text: impl FnOnce(&T, &mut dyn Write) -> std::io::Result<()>,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value)
                    .map_err(|e| Error::store("serialize_output", e))?;
                writeln!(self.out, "{json}").map_err(output_error)
            },
            OutputFormat::Text => text(value, &mut *self.out).map_err(output_error),
        }
    }
}

/// Reports the schema version after opening (and thereby migrating) the
/// database.
///
/// # Errors
///
/// Returns a store error or an output error.
pub fn run_migrate(ctx: &mut CommandContext<'_>) -> Result<()> {
    #[derive(Serialize)]
    struct MigrateReport {
        schema_version: i32,
        path: Option<String>,
    }

    let report = MigrateReport {
        schema_version: ctx.db.schema_version()?,
        path: ctx.db.path().map(|p| p.display().to_string()),
    };
    ctx.emit(&report, |r, out| {
        writeln!(
            out,
            "Schema at version {} ({})",
            r.schema_version,
            r.path.as_deref().unwrap_or(":memory:")
        )
    })
}

#[allow(clippy::needless_pass_by_value)]
fn output_error(e: std::io::Error) -> Error {
    Error::store("write_output", e)
}

fn fmt_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn run<F>(format: OutputFormat, db: &Arc<Database>, f: F) -> (Result<()>, String)
    where
        F: FnOnce(&mut CommandContext<'_>) -> Result<()>,
    {
        let mut buf = Vec::new();
        let result = {
            let mut ctx =
                CommandContext::new(Arc::clone(db), &StudyConfig::default(), format, &mut buf);
            f(&mut ctx)
        };
        (result, String::from_utf8(buf).unwrap())
    }
}
