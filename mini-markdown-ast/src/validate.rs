//! Structural validation for document trees.
//!
//! Parsed trees always pass. The checks matter for trees built by hand or
//! deserialized from JSON, where the types alone cannot rule out e.g. a
//! heading of level 9. Returns a list of `Diagnostic` items (non-fatal).

use crate::error::{Diagnostic, Severity};
use crate::types::{Node, NodeKind};

/// Validate a tree and return any diagnostics.
///
/// Checks the root kind, heading levels, link and image URLs, and the
/// list/list-item pairing. It never modifies the tree.
pub fn validate(root: &Node) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if root.kind() != NodeKind::Document {
        diagnostics.push(error(
            "V002",
            format!("Root node must be a document, found {}", root.kind()),
            root,
        ));
    }

    for child in root.children() {
        validate_node(child, root.kind(), &mut diagnostics);
    }

    diagnostics
}

fn validate_node(node: &Node, parent: NodeKind, diagnostics: &mut Vec<Diagnostic>) {
    match node {
        Node::Document { .. } => {
            diagnostics.push(error(
                "V002",
                "Document node nested inside another node".into(),
                node,
            ));
        }
        Node::Heading { level, .. } => {
            if !(1..=6).contains(level) {
                diagnostics.push(error(
                    "V001",
                    format!("Heading level {level} is out of range 1-6"),
                    node,
                ));
            }
        }
        Node::Link { url, .. } | Node::Image { url, .. } => {
            if url.trim().is_empty() {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    message: format!("{} has an empty URL", capitalize(node.kind().as_str())),
                    span: None,
                    code: Some("V003".into()),
                });
            }
        }
        Node::List { children, .. } => {
            for child in children {
                if child.kind() != NodeKind::ListItem {
                    diagnostics.push(error(
                        "V004",
                        format!("List contains a {} instead of a list-item", child.kind()),
                        node,
                    ));
                }
            }
        }
        Node::ListItem { .. } => {
            if parent != NodeKind::List {
                diagnostics.push(error(
                    "V005",
                    format!("List-item outside a list (parent is {parent})"),
                    node,
                ));
            }
        }
        _ => {}
    }

    for child in node.children() {
        validate_node(child, node.kind(), diagnostics);
    }
}

fn error(code: &str, message: String, node: &Node) -> Diagnostic {
    Diagnostic {
        severity: Severity::Error,
        message,
        span: node.span(),
        code: Some(code.into()),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::types::Span;

    fn codes(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().filter_map(|d| d.code.as_deref()).collect()
    }

    #[test]
    fn parsed_tree_is_valid() {
        let result = parse("# T\n\n- a\n  1. b\n\n> [x](/y) ![i](/z)\n\n```\nc\n```");
        let diags = validate(&result.root);
        assert!(diags.is_empty(), "Expected no diagnostics, got: {diags:?}");
    }

    #[test]
    fn heading_level_out_of_range() {
        let root = Node::Document {
            children: vec![Node::Heading {
                level: 7,
                children: vec![],
                span: Span::default(),
            }],
        };
        let diags = validate(&root);
        assert_eq!(codes(&diags), vec!["V001"]);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn root_must_be_document() {
        let diags = validate(&Node::text("x"));
        assert_eq!(codes(&diags), vec!["V002"]);
    }

    #[test]
    fn nested_document() {
        let root = Node::Document {
            children: vec![Node::Document { children: vec![] }],
        };
        assert_eq!(codes(&validate(&root)), vec!["V002"]);
    }

    #[test]
    fn empty_url_warns() {
        let root = Node::Document {
            children: vec![Node::Paragraph {
                children: vec![
                    Node::Link {
                        url: "".into(),
                        title: None,
                        children: vec![Node::text("x")],
                    },
                    Node::Image {
                        url: " ".into(),
                        title: None,
                        alt: "i".into(),
                    },
                ],
                span: Span::default(),
            }],
        };
        let diags = validate(&root);
        assert_eq!(codes(&diags), vec!["V003", "V003"]);
        assert!(diags.iter().all(|d| d.severity == Severity::Warning));
        assert!(diags[0].message.starts_with("Link"));
    }

    #[test]
    fn list_pairing() {
        let root = Node::Document {
            children: vec![
                Node::List {
                    ordered: false,
                    start: None,
                    tight: true,
                    children: vec![Node::text("stray")],
                    span: Span::default(),
                },
                Node::ListItem {
                    children: vec![],
                    span: Span::default(),
                },
            ],
        };
        assert_eq!(codes(&validate(&root)), vec!["V004", "V005"]);
    }
}
