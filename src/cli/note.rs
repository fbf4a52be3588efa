//! `note` subcommands.

use super::CommandContext;
use crate::Result;
use crate::models::{BookmarkId, Note};
use clap::Subcommand;
use std::io::Write;

/// Note subcommands.
#[derive(Debug, Subcommand)]
pub enum NoteCommand {
    /// Attach a note to a bookmark.
    Add {
        /// Bookmark id.
        bookmark: i64,
        /// Rich-text document (JSON).
        body: String,
        /// Author.
        #[arg(long)]
        author: Option<String>,
        /// Hide from shared views.
        #[arg(long)]
        private: bool,
    },

    /// List a bookmark's notes.
    List {
        /// Bookmark id.
        bookmark: i64,
    },
}

/// Runs a note subcommand.
///
/// # Errors
///
/// Returns the service error or an output error.
pub fn run(cmd: NoteCommand, ctx: &mut CommandContext<'_>) -> Result<()> {
    match cmd {
        NoteCommand::Add {
            bookmark,
            body,
            author,
            private,
        } => {
            let note = ctx.services.notes.create_note(
                BookmarkId(bookmark),
                &body,
                author.as_deref(),
                private,
            )?;
            ctx.emit(&note, |n, out| {
                writeln!(out, "Created note {} ({})", n.id, n.urn)
            })
        },
        NoteCommand::List { bookmark } => {
            let notes = ctx.services.notes.list_notes(BookmarkId(bookmark))?;
            ctx.emit(&notes, |notes: &Vec<Note>, out| {
                for note in notes {
                    writeln!(
                        out,
                        "{:>5}  {:<6} {:<12} {}",
                        note.id.0,
                        note.fsm_state,
                        note.author.as_deref().unwrap_or("-"),
                        note.created_at.to_rfc3339()
                    )?;
                }
                Ok(())
            })
        },
    }
}
