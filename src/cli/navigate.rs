//! `navigate` command: walks bookmarked items with the strategy manager and
//! records the walk as a learning session.

use super::CommandContext;
use crate::Result;
use crate::models::{LearningState, Urn};
use crate::navigation::{
    ItemContext, LearningItem, NavigationProgress, StrategyKind, StrategyManager,
};
use crate::services::CrossReferenceService;
use clap::Args;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

/// Arguments of the `navigate` command.
#[derive(Debug, Args)]
pub struct NavigateArgs {
    /// Only bookmarks in this learning state.
    #[arg(long)]
    pub state: Option<String>,
    /// Maximum number of items to serve.
    #[arg(long, default_value = "20")]
    pub steps: usize,
    /// Follow the first unseen related item after each step.
    #[arg(long)]
    pub follow: bool,
    /// Link items by catalog type instead of stored cross references.
    #[arg(long)]
    pub type_links: bool,
}

/// One served item.
#[derive(Debug, Serialize)]
struct Step {
    step: usize,
    strategy: StrategyKind,
    context: ItemContext,
    urn: String,
    title: String,
}

#[derive(Debug, Serialize)]
struct NavigateReport {
    session_id: i64,
    steps: Vec<Step>,
    progress: NavigationProgress,
}

/// Runs the `navigate` command.
///
/// # Errors
///
/// Returns a store error, a navigation error, or an output error.
pub fn run(args: &NavigateArgs, ctx: &mut CommandContext<'_>) -> Result<()> {
    let state = args.state.as_deref().map(LearningState::parse).transpose()?;
    let bookmarks = load_all(ctx, state)?;
    let items: Vec<LearningItem> = bookmarks.iter().map(|(item, _)| item.clone()).collect();

    let manager = if args.type_links {
        StrategyManager::new(items)
    } else {
        let source = Arc::new(CrossReferenceService::new(Arc::clone(&ctx.db)));
        StrategyManager::with_source(items, source)?
    };
    for (item, state) in &bookmarks {
        if *state == LearningState::Mastered {
            manager.mark_learned(&item.urn);
        }
    }

    let session = ctx.services.sessions.start_session(StrategyKind::Bfs)?;
    let mut seen: Vec<String> = Vec::new();
    let mut seen_set: HashSet<String> = HashSet::new();
    let mut steps = Vec::new();

    while steps.len() < args.steps {
        let Some(item) = manager.get_next_item()? else {
            break;
        };
        manager.mark_viewed(&item.urn);
        if seen_set.insert(item.urn.clone()) {
            ctx.services.sessions.record_view(&item.urn)?;
            seen.push(item.urn.clone());
        }

        if args.follow {
            let next = manager
                .related_items(&item.urn)
                .into_iter()
                .find(|related| !seen_set.contains(&related.urn));
            if let Some(next) = next {
                manager.follow_link(&item.urn, &next.urn)?;
            }
        }

        steps.push(Step {
            step: steps.len() + 1,
            strategy: manager.current_strategy(),
            context: item.context,
            urn: item.urn,
            title: item.title,
        });
    }

    let learned = manager.completed_items();
    let session = ctx
        .services
        .sessions
        .end_session(session.id, &seen, &learned)?;

    let report = NavigateReport {
        session_id: session.id,
        steps,
        progress: manager.get_progress(),
    };
    ctx.emit(&report, |r, out| {
        for step in &r.steps {
            let context = match step.context {
                ItemContext::List => "list",
                ItemContext::DeepDive => "deep",
            };
            writeln!(
                out,
                "{:>3}. [{} {}] {}  {}",
                step.step,
                step.strategy.as_str(),
                context,
                step.urn,
                step.title
            )?;
        }
        writeln!(
            out,
            "Session {}: {} of {} items viewed ({:.0}%)",
            r.session_id,
            r.progress.viewed_count,
            r.progress.total_items,
            r.progress.bfs_progress
        )
    })
}

/// Loads every matching bookmark as a navigation item, oldest first.
/// Bookmarks whose URN does not parse are skipped.
fn load_all(
    ctx: &CommandContext<'_>,
    state: Option<LearningState>,
) -> Result<Vec<(LearningItem, LearningState)>> {
    let mut all = Vec::new();
    let mut offset = 0;
    loop {
        let page = ctx.services.bookmarks.list_bookmarks(state, offset, 0)?;
        if page.bookmarks.is_empty() {
            break;
        }
        offset += page.bookmarks.len();
        all.extend(
            page.bookmarks
                .iter()
                .filter(|b| Urn::try_parse(&b.urn).is_some())
                .map(|b| (LearningItem::from_bookmark(b), b.learning_state)),
        );
        if offset >= page.total {
            break;
        }
    }
    all.reverse();
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::cli::test_support::run as run_cli;
    use crate::models::{NewBookmark, NewCrossReference};
    use crate::services::BookmarkService;
    use crate::storage::Database;

    fn setup() -> Arc<Database> {
        let db = Arc::new(Database::in_memory().unwrap());
        let bookmarks = BookmarkService::new(Arc::clone(&db));
        for (kind, id) in [("CVE", "CVE-2024-0001"), ("CWE", "CWE-79"), ("CAPEC", "CAPEC-63")] {
            bookmarks
                .create_bookmark(&NewBookmark::new("g", kind, id, id, ""))
                .unwrap();
        }
        db
    }

    fn args(follow: bool, type_links: bool) -> NavigateArgs {
        NavigateArgs {
            state: None,
            steps: 10,
            follow,
            type_links,
        }
    }

    #[test]
    fn test_breadth_first_walk() {
        let db = setup();
        let (result, out) = run_cli(OutputFormat::Json, &db, |ctx| run(&args(false, false), ctx));
        result.unwrap();
        let report: serde_json::Value = serde_json::from_str(&out).unwrap();
        let urns: Vec<&str> = report["steps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["urn"].as_str().unwrap())
            .collect();
        assert_eq!(
            urns,
            vec![
                "v2e::nvd::cve::CVE-2024-0001",
                "v2e::mitre::cwe::CWE-79",
                "v2e::mitre::capec::CAPEC-63",
            ]
        );
        assert_eq!(report["progress"]["viewed_count"], 3);

        let bookmark = BookmarkService::new(Arc::clone(&db))
            .get_bookmark(crate::models::BookmarkId(1))
            .unwrap();
        assert_eq!(bookmark.stats().view_count, 1);
        assert_eq!(bookmark.stats().study_sessions, 1);
    }

    #[test]
    fn test_follow_uses_cross_references() {
        let db = setup();
        CrossReferenceService::new(Arc::clone(&db))
            .create(&NewCrossReference::new("cve", "CVE-2024-0001", "capec", "CAPEC-63"))
            .unwrap();

        let (result, out) = run_cli(OutputFormat::Json, &db, |ctx| run(&args(true, false), ctx));
        result.unwrap();
        let report: serde_json::Value = serde_json::from_str(&out).unwrap();
        let steps = report["steps"].as_array().unwrap();
        assert_eq!(steps[0]["urn"], "v2e::nvd::cve::CVE-2024-0001");
        assert_eq!(steps[1]["urn"], "v2e::mitre::capec::CAPEC-63");
        assert_eq!(steps[1]["context"], "deep_dive");
        assert!(steps.iter().any(|s| s["urn"] == "v2e::mitre::cwe::CWE-79"));
    }

    #[test]
    fn test_text_output() {
        let db = setup();
        let (result, out) = run_cli(OutputFormat::Text, &db, |ctx| run(&args(true, true), ctx));
        result.unwrap();
        assert!(out.lines().last().unwrap().contains("3 of 3 items viewed"));
    }
}
