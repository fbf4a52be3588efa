//! `xref` subcommands.

use super::CommandContext;
use crate::Result;
use crate::models::{NewCrossReference, RelationshipType};
use clap::Subcommand;
use std::io::Write;

/// Cross reference subcommands.
#[derive(Debug, Subcommand)]
pub enum XrefCommand {
    /// Record a directed cross reference.
    Add {
        /// Source catalog type.
        source_type: String,
        /// Source item id.
        source_id: String,
        /// Target catalog type.
        target_type: String,
        /// Target item id.
        target_id: String,
        /// Relationship (related-to, exploits, mitigates, similar-to,
        /// part-of, caused-by).
        #[arg(long, default_value = "related-to")]
        relationship: String,
        /// Strength in [0, 1].
        #[arg(long, default_value = "1.0")]
        strength: f64,
        /// Free-form description.
        #[arg(long)]
        description: Option<String>,
    },

    /// List references leaving an item.
    From {
        /// Source item id.
        item_id: String,
    },

    /// List references arriving at an item.
    To {
        /// Target item id.
        item_id: String,
    },
}

/// Runs a cross reference subcommand.
///
/// # Errors
///
/// Returns the service error or an output error.
pub fn run(cmd: XrefCommand, ctx: &mut CommandContext<'_>) -> Result<()> {
    let refs = match cmd {
        XrefCommand::Add {
            source_type,
            source_id,
            target_type,
            target_id,
            relationship,
            strength,
            description,
        } => {
            let mut new = NewCrossReference::new(source_type, source_id, target_type, target_id)
                .with_relationship(RelationshipType::parse(&relationship)?)
                .with_strength(strength);
            new.description = description;
            vec![ctx.services.cross_references.create(&new)?]
        },
        XrefCommand::From { item_id } => ctx.services.cross_references.list_by_source(&item_id)?,
        XrefCommand::To { item_id } => ctx.services.cross_references.list_by_target(&item_id)?,
    };

    ctx.emit(&refs, |refs, out| {
        for r in refs {
            writeln!(
                out,
                "{} {} -[{} {:.2}]-> {} {}",
                r.source_type,
                r.source_item_id,
                r.relationship.as_str(),
                r.strength,
                r.target_type,
                r.target_item_id
            )?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::cli::test_support::run as run_cli;
    use crate::storage::Database;
    use std::sync::Arc;

    fn add(relationship: &str, strength: f64) -> XrefCommand {
        XrefCommand::Add {
            source_type: "cve".to_string(),
            source_id: "CVE-2024-0001".to_string(),
            target_type: "cwe".to_string(),
            target_id: "CWE-79".to_string(),
            relationship: relationship.to_string(),
            strength,
            description: None,
        }
    }

    #[test]
    fn test_add_then_list() {
        let db = Arc::new(Database::in_memory().unwrap());
        let (result, out) = run_cli(OutputFormat::Text, &db, |ctx| run(add("exploits", 0.5), ctx));
        result.unwrap();
        assert_eq!(out.trim(), "cve CVE-2024-0001 -[exploits 0.50]-> cwe CWE-79");

        let (result, out) = run_cli(OutputFormat::Json, &db, |ctx| {
            run(
                XrefCommand::To {
                    item_id: "CWE-79".to_string(),
                },
                ctx,
            )
        });
        result.unwrap();
        let refs: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_add_rejects_bad_input() {
        let db = Arc::new(Database::in_memory().unwrap());
        let (result, _) = run_cli(OutputFormat::Text, &db, |ctx| run(add("befriends", 0.5), ctx));
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
        let (result, _) = run_cli(OutputFormat::Text, &db, |ctx| run(add("exploits", 1.5), ctx));
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }
}
