//! Binary entry point for v2e-study.
//!
//! This binary provides the CLI interface for the study engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use v2e_study::cli::{
    BookmarkCommand, CardCommand, CommandContext, NavigateArgs, NoteCommand, OutputFormat,
    XrefCommand, run_bookmark, run_card, run_migrate, run_navigate, run_note, run_xref,
};
use v2e_study::config::StudyConfig;
use v2e_study::observability::{self, LoggingConfig};
use v2e_study::storage::Database;

/// v2e-study - Bookmarks, notes, and spaced-repetition study for CVE, CWE,
/// CAPEC and ATT&CK items.
#[derive(Parser)]
#[command(name = "v2e-study")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides the configuration).
    #[arg(long, global = true, env = "V2E_STUDY_DB")]
    db: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage bookmarks.
    Bookmark {
        /// Bookmark subcommand.
        #[command(subcommand)]
        action: BookmarkCommand,
    },

    /// Review and manage memory cards.
    Card {
        /// Card subcommand.
        #[command(subcommand)]
        action: CardCommand,
    },

    /// Manage notes.
    Note {
        /// Note subcommand.
        #[command(subcommand)]
        action: NoteCommand,
    },

    /// Manage cross references.
    Xref {
        /// Cross reference subcommand.
        #[command(subcommand)]
        action: XrefCommand,
    },

    /// Apply schema migrations and report the version.
    Migrate,

    /// Walk bookmarked items and record a learning session.
    Navigate(NavigateArgs),
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match StudyConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &StudyConfig) -> anyhow::Result<()> {
    let path = cli.db.unwrap_or_else(|| config.database_path.clone());
    let db = Database::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut ctx = CommandContext::new(Arc::new(db), config, cli.format, &mut out);

    match cli.command {
        Commands::Bookmark { action } => run_bookmark(action, &mut ctx)?,
        Commands::Card { action } => run_card(action, &mut ctx)?,
        Commands::Note { action } => run_note(action, &mut ctx)?,
        Commands::Xref { action } => run_xref(action, &mut ctx)?,
        Commands::Migrate => run_migrate(&mut ctx)?,
        Commands::Navigate(args) => run_navigate(&args, &mut ctx)?,
    }
    Ok(())
}
