//! Rich-text document validation for note and card bodies.
//!
//! Bodies are JSON documents in the editor's node format:
//!
//! ```json
//! {"type": "doc", "content": [
//!   {"type": "paragraph", "content": [
//!     {"type": "text", "text": "Use ", "marks": []},
//!     {"type": "text", "text": "parameterized queries", "marks": [{"type": "bold"}]}
//!   ]}
//! ]}
//! ```
//!
//! The store treats the body as an opaque blob once it passes
//! [`validate_document`]. Validation walks every node: unknown node or mark
//! types, text nodes without text, images without a `src`, and links
//! without an `href` are rejected.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node types accepted in a document.
pub const NODE_TYPES: &[&str] = &[
    "doc",
    "paragraph",
    "heading",
    "codeBlock",
    "blockquote",
    "listItem",
    "bulletList",
    "orderedList",
    "text",
    "hardBreak",
    "taskList",
    "taskItem",
    "image",
    "horizontalRule",
];

/// Mark types accepted on text nodes.
pub const MARK_TYPES: &[&str] = &["bold", "italic", "strike", "code", "link"];

/// One node of a rich-text document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Node type.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Child nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<DocumentNode>>,
    /// Text of a `text` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks applied to a `text` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<DocumentMark>>,
    /// Node attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

/// A mark (inline formatting) on a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMark {
    /// Mark type.
    #[serde(rename = "type")]
    pub mark_type: String,
    /// Mark attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

/// A structural problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the node, e.g. `doc.content[0].content[2]`.
    pub path: String,
    /// Description of the issue.
    pub message: String,
}

/// Parses and validates a document body.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the body is not a JSON document node, and
/// [`Error::InvalidInput`] listing every structural issue otherwise.
pub fn validate_document(body: &str) -> Result<DocumentNode> {
    let node: DocumentNode = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("document body is not a valid node: {e}")))?;

    let issues = collect_issues(&node);
    if issues.is_empty() {
        return Ok(node);
    }

    let summary = issues
        .iter()
        .map(|issue| format!("{}: {}", issue.path, issue.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(Error::InvalidInput(format!("invalid document: {summary}")))
}

/// Returns every structural issue in a parsed document.
#[must_use]
pub fn collect_issues(root: &DocumentNode) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if root.node_type != "doc" {
        issues.push(ValidationIssue {
            path: "$".to_string(),
            message: format!("root node must be 'doc', found {:?}", root.node_type),
        });
    }
    check_node(root, &root.node_type, &mut issues);
    issues
}

fn check_node(node: &DocumentNode, path: &str, issues: &mut Vec<ValidationIssue>) {
    let mut issue = |message: String| {
        issues.push(ValidationIssue {
            path: path.to_string(),
            message,
        });
    };

    if !NODE_TYPES.contains(&node.node_type.as_str()) {
        issue(format!("unknown node type {:?}", node.node_type));
    }

    match node.node_type.as_str() {
        "text" => {
            if node.text.as_deref().is_none_or(str::is_empty) {
                issue("text node without text".to_string());
            }
            if node.content.is_some() {
                issue("text node cannot have content".to_string());
            }
        },
        "image" => {
            let has_src = node
                .attrs
                .as_ref()
                .and_then(|a| a.get("src"))
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !has_src {
                issue("image without attrs.src".to_string());
            }
        },
        "heading" => {
            let level = node
                .attrs
                .as_ref()
                .and_then(|a| a.get("level"))
                .and_then(Value::as_u64);
            if level.is_some_and(|l| !(1..=6).contains(&l)) {
                issue("heading level must be 1-6".to_string());
            }
        },
        _ => {
            if node.text.is_some() {
                issue(format!("{:?} node cannot carry text", node.node_type));
            }
        },
    }

    for (i, mark) in node.marks.iter().flatten().enumerate() {
        let mark_path = format!("{path}.marks[{i}]");
        if !MARK_TYPES.contains(&mark.mark_type.as_str()) {
            issues.push(ValidationIssue {
                path: mark_path,
                message: format!("unknown mark type {:?}", mark.mark_type),
            });
        } else if mark.mark_type == "link" {
            let has_href = mark
                .attrs
                .as_ref()
                .and_then(|a| a.get("href"))
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !has_href {
                issues.push(ValidationIssue {
                    path: mark_path,
                    message: "link mark without attrs.href".to_string(),
                });
            }
        }
    }

    for (i, child) in node.content.iter().flatten().enumerate() {
        check_node(child, &format!("{path}.content[{i}]"), issues);
    }
}
