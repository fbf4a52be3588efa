//! `card` subcommands.

use super::{CommandContext, fmt_time};
use crate::Result;
use crate::models::{BookmarkId, CardFilter, CardId, CardStatus, MemoryCard, Rating};
use crate::storage::sqlite::parse_timestamp;
use chrono::Utc;
use clap::Subcommand;
use std::io::Write;

/// Card subcommands.
#[derive(Debug, Subcommand)]
pub enum CardCommand {
    /// List cards.
    List {
        /// Only cards of this bookmark.
        #[arg(long)]
        bookmark: Option<i64>,
        /// Only cards in this status.
        #[arg(long)]
        status: Option<String>,
        /// Only cards due at or before this RFC 3339 time.
        #[arg(long)]
        due_before: Option<String>,
        /// Only cards by this author.
        #[arg(long)]
        author: Option<String>,
        /// Rows to skip.
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Maximum rows.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a review (again, hard, good, easy or 1-4).
    Review {
        /// Card id.
        id: i64,
        /// Recall quality.
        rating: String,
    },

    /// Move a card to another status.
    Transition {
        /// Card id.
        id: i64,
        /// Target status.
        status: String,
        /// Fail unless the card is at this version.
        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// List cards due now.
    Due {
        /// Maximum rows.
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Runs a card subcommand.
///
/// # Errors
///
/// Returns the service error or an output error.
pub fn run(cmd: CardCommand, ctx: &mut CommandContext<'_>) -> Result<()> {
    match cmd {
        CardCommand::List {
            bookmark,
            status,
            due_before,
            author,
            offset,
            limit,
        } => {
            let filter = CardFilter {
                bookmark_id: bookmark.map(BookmarkId),
                status: status.as_deref().map(CardStatus::parse).transpose()?,
                due_before: due_before.as_deref().map(parse_timestamp).transpose()?,
                author,
                offset,
                limit,
            };
            let cards = ctx.services.cards.list(&filter)?;
            ctx.emit(&cards, write_cards)
        },
        CardCommand::Review { id, rating } => {
            let rating = Rating::parse(&rating)?;
            let result = ctx.services.cards.apply_review(CardId(id), rating)?;
            ctx.emit(&result, |r, out| {
                writeln!(
                    out,
                    "Card {}: {} -> {} (version {})",
                    r.card.id, r.previous_status, r.card.status, r.card.version
                )?;
                writeln!(
                    out,
                    "  interval {}d, ease {:.2}, repetition {}, next review {}",
                    r.card.interval_days,
                    r.card.ease_factor,
                    r.card.repetition,
                    fmt_time(r.card.next_review)
                )?;
                writeln!(
                    out,
                    "  bookmark mastery {:.2} ({})",
                    r.mastery_level, r.learning_state
                )
            })
        },
        CardCommand::Transition {
            id,
            status,
            expected_version,
        } => {
            let target = CardStatus::parse(&status)?;
            let card = ctx
                .services
                .cards
                .transition_status(CardId(id), expected_version, target)?;
            ctx.emit(&card, |c, out| {
                writeln!(out, "Card {} is {} (version {})", c.id, c.status, c.version)
            })
        },
        CardCommand::Due { limit } => {
            let cards = ctx.services.cards.due_cards(Utc::now(), limit)?;
            ctx.emit(&cards, write_cards)
        },
    }
}

#[allow(clippy::ptr_arg)]
fn write_cards(cards: &Vec<MemoryCard>, out: &mut dyn Write) -> std::io::Result<()> {
    for card in cards {
        writeln!(
            out,
            "{:>5}  {:<9} v{:<3} {:>4}d  {}  {}",
            card.id.get(),
            card.status.as_str(),
            card.version,
            card.interval_days,
            fmt_time(card.next_review),
            card.front
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::cli::test_support::run as run_cli;
    use crate::models::NewBookmark;
    use crate::services::BookmarkService;
    use crate::storage::Database;
    use std::sync::Arc;

    fn setup() -> Arc<Database> {
        let db = Arc::new(Database::in_memory().unwrap());
        BookmarkService::new(Arc::clone(&db))
            .create_bookmark(&NewBookmark::new("g", "CWE", "CWE-79", "XSS", "Escaping"))
            .unwrap();
        db
    }

    #[test]
    fn test_review_json() {
        let db = setup();
        let (result, out) = run_cli(OutputFormat::Json, &db, |ctx| {
            run(
                CardCommand::Review {
                    id: 1,
                    rating: "good".to_string(),
                },
                ctx,
            )
        });
        result.unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["card"]["version"], 2);
        assert_eq!(json["card"]["status"], "learning");
        assert_eq!(json["previous_status"], "new");
    }

    #[test]
    fn test_transition_with_stale_version() {
        let db = setup();
        let (result, _) = run_cli(OutputFormat::Text, &db, |ctx| {
            run(
                CardCommand::Transition {
                    id: 1,
                    status: "archived".to_string(),
                    expected_version: Some(7),
                },
                ctx,
            )
        });
        assert!(matches!(
            result,
            Err(crate::Error::ConcurrentUpdate { .. })
        ));
    }

    #[test]
    fn test_list_filters_by_status() {
        let db = setup();
        let (result, out) = run_cli(OutputFormat::Text, &db, |ctx| {
            run(
                CardCommand::List {
                    bookmark: Some(1),
                    status: Some("new".to_string()),
                    due_before: None,
                    author: None,
                    offset: 0,
                    limit: None,
                },
                ctx,
            )
        });
        result.unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("XSS"));

        let (result, _) = run_cli(OutputFormat::Text, &db, |ctx| {
            run(
                CardCommand::List {
                    bookmark: None,
                    status: None,
                    due_before: Some("yesterday".to_string()),
                    author: None,
                    offset: 0,
                    limit: None,
                },
                ctx,
            )
        });
        assert!(matches!(result, Err(crate::Error::Parse(_))));
    }
}
