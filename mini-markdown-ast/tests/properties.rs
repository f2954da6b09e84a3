//! Property-based tests using proptest.
//!
//! These tests verify that the tokenizer and parser never panic on arbitrary
//! input, that every parse yields a well-formed tree, and that rendering is
//! escaped and deterministic.

use mini_markdown_ast::{Node, NodeKind, RenderOptions, Severity, escape_html};
use proptest::prelude::*;

/// Count `document` nodes anywhere in the tree.
fn document_count(node: &Node) -> usize {
    let own = usize::from(node.kind() == NodeKind::Document);
    own + node.children().iter().map(document_count).sum::<usize>()
}

fn leaves_have_no_children(node: &Node) -> bool {
    (!node.kind().is_leaf() || node.children().is_empty())
        && node.children().iter().all(leaves_have_no_children)
}

/// Markdown-heavy alphabet so generated inputs hit the interesting paths.
const MARKDOWN_CHARS: &str = "[a-z #>*_`\\[\\]()!\\-+.1-9\n\\\\<>:\"']{0,300}";

proptest! {
    /// Any random string fed to the parser should never cause a panic.
    #[test]
    fn any_input_no_panic(input in "\\PC{0,500}") {
        let result = mini_markdown_ast::parse(&input);
        let _ = result.root.children().len();
        let _ = mini_markdown_ast::tokenizer::tokenize(&input);
    }

    /// Markup-dense input parses into exactly one document root, and leaf
    /// kinds never carry children.
    #[test]
    fn parse_is_well_formed(input in MARKDOWN_CHARS) {
        let result = mini_markdown_ast::parse(&input);
        prop_assert_eq!(result.root.kind(), NodeKind::Document);
        prop_assert_eq!(document_count(&result.root), 1);
        prop_assert!(leaves_have_no_children(&result.root));
        let errors: Vec<_> = result
            .root
            .validate()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        prop_assert!(errors.is_empty(), "{:?}", errors);
    }

    /// Rendering twice gives identical bytes.
    #[test]
    fn render_is_deterministic(input in MARKDOWN_CHARS) {
        let options = RenderOptions::default();
        let first = mini_markdown_ast::render_markdown_to_html(&input, &options);
        let second = mini_markdown_ast::render_markdown_to_html(&input, &options);
        prop_assert_eq!(first, second);
    }

    /// Raw `<` from the source never reaches the output unescaped, except
    /// as part of the tags the renderer itself writes.
    #[test]
    fn no_raw_tags_from_input(body in "[a-z ]{0,20}") {
        let input = format!("<script>{body}</script> <img src=x onerror={body}>");
        let html = mini_markdown_ast::render_markdown_to_html(&input, &RenderOptions::default());
        prop_assert!(!html.contains("<script"));
        prop_assert!(!html.contains("<img src=x"));
    }

    /// Escaping is not idempotent on special characters.
    #[test]
    fn double_escape_changes_special_text(
        prefix in "[a-z]{0,10}",
        special in prop::sample::select(vec!['&', '<', '>', '"']),
        suffix in "[a-z]{0,10}",
    ) {
        let raw = format!("{prefix}{special}{suffix}");
        let once = escape_html(&raw);
        prop_assert_ne!(escape_html(&once), once);
    }

    /// Heading text survives parse and render.
    #[test]
    fn heading_text_preserved(
        level in 1usize..=6,
        text in "[A-Za-z][A-Za-z0-9 ]{0,30}[A-Za-z0-9]",
    ) {
        let input = format!("{} {text}\n", "#".repeat(level));
        let html = mini_markdown_ast::render_markdown_to_html(&input, &RenderOptions::default());
        prop_assert_eq!(html, format!("<h{level}>{text}</h{level}>"));
    }
}
