//! `bookmark` subcommands.

use super::{CommandContext, fmt_time};
use crate::Result;
use crate::models::{Bookmark, BookmarkId, LearningState, NewBookmark};
use crate::services::RevertTarget;
use clap::Subcommand;
use std::io::Write;

/// Bookmark subcommands.
#[derive(Debug, Subcommand)]
pub enum BookmarkCommand {
    /// Bookmark a catalog item (idempotent per item).
    Add {
        /// Global item id.
        #[arg(long)]
        global: String,
        /// Catalog type (CVE, CWE, CAPEC, ATTACK).
        #[arg(long = "type")]
        item_type: String,
        /// Item id within the catalog.
        #[arg(long)]
        id: String,
        /// Title; also the front of the auto-created card.
        #[arg(long)]
        title: String,
        /// Description; also the back of the auto-created card.
        #[arg(long, default_value = "")]
        description: String,
        /// URN provider override (e.g. ssg).
        #[arg(long)]
        source: Option<String>,
    },

    /// List bookmarks, newest first.
    List {
        /// Only bookmarks in this learning state.
        #[arg(long)]
        state: Option<String>,
        /// Rows to skip.
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Page size (0 uses the configured default).
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Show one bookmark.
    Show {
        /// Bookmark id.
        id: i64,
    },

    /// Show or adjust view/study statistics.
    Stats {
        /// Bookmark id.
        id: i64,
        /// Views to add.
        #[arg(long, allow_hyphen_values = true)]
        views: Option<i64>,
        /// Study sessions to add.
        #[arg(long, allow_hyphen_values = true)]
        sessions: Option<i64>,
    },

    /// Set the learning state.
    State {
        /// Bookmark id.
        id: i64,
        /// New state (to_review, learning, mastered, archived).
        state: String,
    },

    /// Soft-delete a bookmark.
    Delete {
        /// Bookmark id.
        id: i64,
    },

    /// Show the history log, newest first.
    History {
        /// Bookmark id.
        id: i64,
    },

    /// Revert the learning state to a point in time (default: one step).
    Revert {
        /// Bookmark id.
        id: i64,
        /// RFC 3339 timestamp to revert to.
        #[arg(long)]
        at: Option<String>,
    },
}

/// Runs a bookmark subcommand.
///
/// # Errors
///
/// Returns the service error or an output error.
pub fn run(cmd: BookmarkCommand, ctx: &mut CommandContext<'_>) -> Result<()> {
    match cmd {
        BookmarkCommand::Add {
            global,
            item_type,
            id,
            title,
            description,
            source,
        } => {
            let mut new = NewBookmark::new(global, item_type, id, title, description);
            if let Some(source) = source {
                new = new.with_source(source);
            }
            let created = ctx.services.bookmarks.create_bookmark(&new)?;
            ctx.emit(&created, |c, out| {
                let verb = if c.is_new() { "Created" } else { "Exists" };
                writeln!(out, "{verb}: bookmark {} ({})", c.bookmark.id, c.bookmark.urn)?;
                if let Some(card) = &c.card {
                    writeln!(out, "  card {} ({})", card.id, card.urn)?;
                }
                Ok(())
            })
        },
        BookmarkCommand::List {
            state,
            offset,
            limit,
        } => {
            let state = state.as_deref().map(LearningState::parse).transpose()?;
            let page = ctx
                .services
                .bookmarks
                .list_bookmarks(state, offset, limit)?;
            ctx.emit(&page, |p, out| {
                writeln!(out, "{} of {} bookmarks", p.bookmarks.len(), p.total)?;
                for bookmark in &p.bookmarks {
                    write_summary(bookmark, out)?;
                }
                Ok(())
            })
        },
        BookmarkCommand::Show { id } => {
            let bookmark = ctx.services.bookmarks.get_bookmark(BookmarkId(id))?;
            ctx.emit(&bookmark, write_detail)
        },
        BookmarkCommand::Stats {
            id,
            views,
            sessions,
        } => {
            let id = BookmarkId(id);
            let stats = if views.is_some() || sessions.is_some() {
                ctx.services.bookmarks.update_stats(
                    id,
                    views.unwrap_or(0),
                    sessions.unwrap_or(0),
                )?
            } else {
                ctx.services.bookmarks.get_bookmark(id)?.stats()
            };
            ctx.emit(&stats, |s, out| {
                writeln!(out, "views:          {}", s.view_count)?;
                writeln!(out, "study sessions: {}", s.study_sessions)?;
                writeln!(
                    out,
                    "last viewed:    {}",
                    s.last_viewed.as_deref().unwrap_or("-")
                )?;
                writeln!(
                    out,
                    "bookmarked:     {}",
                    s.first_bookmarked.as_deref().unwrap_or("-")
                )
            })
        },
        BookmarkCommand::State { id, state } => {
            let state = LearningState::parse(&state)?;
            let bookmark = ctx
                .services
                .bookmarks
                .update_learning_state(BookmarkId(id), state)?;
            ctx.emit(&bookmark, write_summary)
        },
        BookmarkCommand::Delete { id } => {
            ctx.services.bookmarks.delete_bookmark(BookmarkId(id))?;
            ctx.emit(&serde_json::json!({ "deleted": id }), |_, out| {
                writeln!(out, "Deleted bookmark {id}")
            })
        },
        BookmarkCommand::History { id } => {
            let history = ctx.services.bookmarks.get_history(BookmarkId(id))?;
            ctx.emit(&history, |entries, out| {
                for entry in entries {
                    writeln!(
                        out,
                        "{}  {:<22} {} -> {}",
                        entry.timestamp.to_rfc3339(),
                        entry.action.as_str(),
                        display_value(&entry.old_value),
                        display_value(&entry.new_value)
                    )?;
                }
                Ok(())
            })
        },
        BookmarkCommand::Revert { id, at } => {
            let bookmark = ctx
                .services
                .bookmarks
                .revert(BookmarkId(id), &RevertTarget::from(at))?;
            ctx.emit(&bookmark, write_summary)
        },
    }
}

fn write_summary(bookmark: &Bookmark, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        out,
        "{:>5}  {:<10} {:<9} {:.2}  {}",
        bookmark.id.get(),
        bookmark.learning_state.as_str(),
        bookmark.item_type,
        bookmark.mastery_level,
        bookmark.title
    )
}

fn write_detail(bookmark: &Bookmark, out: &mut dyn Write) -> std::io::Result<()> {
    let stats = bookmark.stats();
    writeln!(out, "Bookmark {}", bookmark.id)?;
    writeln!(out, "  URN:          {}", bookmark.urn)?;
    writeln!(out, "  Item:         {} {}", bookmark.item_type, bookmark.item_id)?;
    writeln!(out, "  Title:        {}", bookmark.title)?;
    writeln!(out, "  State:        {}", bookmark.learning_state)?;
    writeln!(out, "  Mastery:      {:.2}", bookmark.mastery_level)?;
    writeln!(out, "  Last review:  {}", fmt_time(bookmark.last_reviewed))?;
    writeln!(out, "  Next review:  {}", fmt_time(bookmark.next_review))?;
    writeln!(
        out,
        "  Views:        {} ({} study sessions)",
        stats.view_count, stats.study_sessions
    )
}

fn display_value(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
