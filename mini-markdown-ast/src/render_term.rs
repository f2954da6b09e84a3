//! ANSI terminal renderer.
//!
//! Produces colored terminal output using the `colored` crate: a readable
//! preview of a document ([`to_terminal`]) and an indented dump of the tree
//! itself ([`to_tree`]).

use colored::Colorize;

use crate::types::Node;

/// Render a document as ANSI-colored terminal text.
pub fn to_terminal(root: &Node) -> String {
    let blocks = match root {
        Node::Document { children } => children.as_slice(),
        other => std::slice::from_ref(other),
    };
    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(node: &Node) -> String {
    match node {
        Node::Document { children } | Node::ListItem { children, .. } => children
            .iter()
            .map(render_block)
            .collect::<Vec<_>>()
            .join("\n"),

        Node::Heading {
            level, children, ..
        } => {
            let marker = "#".repeat(usize::from(*level));
            let text = render_inline(children);
            let text = if *level <= 2 {
                text.bold().underline()
            } else {
                text.bold()
            };
            format!("{} {text}", marker.dimmed())
        }

        Node::Paragraph { children, .. } => render_inline(children),

        Node::CodeBlock { lang, value, .. } => {
            let lang_label = match lang {
                Some(l) => format!(" {}", l.dimmed()),
                None => String::new(),
            };
            let border = format!("{}", "\u{2500}\u{2500}\u{2500}".dimmed()); // ───
            let mut lines = vec![format!("{border}{lang_label}")];
            for line in value.lines() {
                lines.push(format!("  {}", line.yellow()));
            }
            lines.push(border.clone());
            lines.join("\n")
        }

        Node::List {
            ordered,
            start,
            children,
            ..
        } => {
            let first = start.unwrap_or(1);
            children
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let bullet = if *ordered {
                        format!("{}.", first + i as u64)
                    } else {
                        "\u{2022}".to_string() // •
                    };
                    let body = render_block(item);
                    let pad = " ".repeat(bullet.chars().count() + 1);
                    let mut lines = body.lines();
                    let head = lines.next().unwrap_or_default();
                    let mut out = format!("{} {head}", bullet.cyan());
                    for line in lines {
                        out.push('\n');
                        out.push_str(&pad);
                        out.push_str(line);
                    }
                    out
                })
                .collect::<Vec<_>>()
                .join("\n")
        }

        Node::Blockquote { children, .. } => {
            let border = "\u{2502}".dimmed(); // │
            children
                .iter()
                .map(render_block)
                .collect::<Vec<_>>()
                .join("\n\n")
                .lines()
                .map(|line| format!("{border} {line}"))
                .collect::<Vec<_>>()
                .join("\n")
        }

        Node::ThematicBreak { .. } => format!("{}", "\u{2500}".repeat(40).dimmed()),

        Node::Emphasis { .. }
        | Node::Strong { .. }
        | Node::Link { .. }
        | Node::Image { .. }
        | Node::CodeInline { .. }
        | Node::LineBreak
        | Node::Text { .. } => render_inline(std::slice::from_ref(node)),
    }
}

fn render_inline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text { value } => out.push_str(value),
            Node::Emphasis { children } => {
                out.push_str(&format!("{}", render_inline(children).italic()));
            }
            Node::Strong { children } => {
                out.push_str(&format!("{}", render_inline(children).bold()));
            }
            Node::CodeInline { value } => out.push_str(&format!("{}", value.yellow())),
            Node::Link { url, children, .. } => {
                let text = render_inline(children);
                if node.plain_text() == *url {
                    out.push_str(&format!("{}", text.blue().underline()));
                } else {
                    out.push_str(&format!("{} ({})", text.blue().underline(), url.dimmed()));
                }
            }
            Node::Image { url, alt, .. } => {
                out.push_str(&format!("{}", format!("[image: {alt}] ({url})").dimmed()));
            }
            Node::LineBreak => out.push('\n'),
            Node::Document { .. }
            | Node::Paragraph { .. }
            | Node::Heading { .. }
            | Node::CodeBlock { .. }
            | Node::List { .. }
            | Node::ListItem { .. }
            | Node::Blockquote { .. }
            | Node::ThematicBreak { .. } => out.push_str(&render_block(node)),
        }
    }
    out
}

/// Dump the tree with one node per line, indented by depth.
///
/// Each line shows the node kind, its attributes and, for block nodes, the
/// source line range.
pub fn to_tree(root: &Node) -> String {
    let mut lines = Vec::new();
    tree_lines(root, 0, &mut lines);
    lines.join("\n")
}

fn tree_lines(node: &Node, depth: usize, lines: &mut Vec<String>) {
    let mut line = format!("{}{}", "  ".repeat(depth), node.kind().as_str().cyan().bold());

    let attrs = match node {
        Node::Heading { level, .. } => vec![format!("level={level}")],
        Node::Link { url, title, .. } => {
            let mut attrs = vec![format!("url={url:?}")];
            if let Some(title) = title {
                attrs.push(format!("title={title:?}"));
            }
            attrs
        }
        Node::Image { url, title, alt } => {
            let mut attrs = vec![format!("url={url:?}"), format!("alt={alt:?}")];
            if let Some(title) = title {
                attrs.push(format!("title={title:?}"));
            }
            attrs
        }
        Node::CodeBlock { lang: Some(lang), .. } => vec![format!("lang={lang}")],
        Node::List {
            ordered,
            start,
            tight,
            ..
        } => {
            let mut attrs = vec![format!("ordered={ordered}"), format!("tight={tight}")];
            if let Some(start) = start {
                attrs.push(format!("start={start}"));
            }
            attrs
        }
        _ => Vec::new(),
    };
    for attr in attrs {
        line.push_str(&format!(" {}", attr.dimmed()));
    }

    match node {
        Node::Text { value } | Node::CodeInline { value } | Node::CodeBlock { value, .. } => {
            line.push_str(&format!(" {}", format!("{value:?}").green()));
        }
        _ => {}
    }

    if let Some(span) = node.span() {
        let range = if span.start_line == span.end_line {
            format!("[{}]", span.start_line)
        } else {
            format!("[{}-{}]", span.start_line, span.end_line)
        };
        line.push_str(&format!(" {}", range.dimmed()));
    }

    lines.push(line);
    for child in node.children() {
        tree_lines(child, depth + 1, lines);
    }
}
