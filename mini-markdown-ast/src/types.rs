use serde::{Deserialize, Serialize};

/// A node in the document tree.
///
/// The enumeration is closed: every renderer matches on it exhaustively, so a
/// new variant does not build until each renderer handles it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Node {
    /// Root of every parsed document.
    Document { children: Vec<Node> },
    Paragraph {
        children: Vec<Node>,
        #[serde(default)]
        span: Span,
    },
    /// ATX (`# Title`) or setext (`Title\n===`) heading.
    Heading {
        level: u8,
        children: Vec<Node>,
        #[serde(default)]
        span: Span,
    },
    Emphasis { children: Vec<Node> },
    Strong { children: Vec<Node> },
    /// Hyperlink. `url` is the raw destination from the source; escaping
    /// happens at render time only.
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        children: Vec<Node>,
    },
    /// Image. The bracketed description is flattened to plain `alt` text.
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        alt: String,
    },
    CodeInline { value: String },
    /// Fenced code block with an optional info-string language.
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        value: String,
        #[serde(default)]
        span: Span,
    },
    /// Bullet or ordered list. Children are `ListItem` nodes.
    List {
        ordered: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u64>,
        /// Tight lists render item paragraphs without `<p>` wrappers.
        tight: bool,
        children: Vec<Node>,
        #[serde(default)]
        span: Span,
    },
    ListItem {
        children: Vec<Node>,
        #[serde(default)]
        span: Span,
    },
    Blockquote {
        children: Vec<Node>,
        #[serde(default)]
        span: Span,
    },
    ThematicBreak {
        #[serde(default)]
        span: Span,
    },
    /// Hard line break (two trailing spaces or a trailing backslash).
    LineBreak,
    Text { value: String },
}

/// Fieldless mirror of [`Node`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Document,
    Paragraph,
    Heading,
    Emphasis,
    Strong,
    Link,
    Image,
    CodeInline,
    CodeBlock,
    List,
    ListItem,
    Blockquote,
    ThematicBreak,
    LineBreak,
    Text,
}

impl NodeKind {
    /// Leaf kinds carry a value or attributes and never have children.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Text
                | NodeKind::CodeInline
                | NodeKind::CodeBlock
                | NodeKind::Image
                | NodeKind::ThematicBreak
                | NodeKind::LineBreak
        )
    }

    /// The serialized tag, e.g. `"code-block"`.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading => "heading",
            NodeKind::Emphasis => "emphasis",
            NodeKind::Strong => "strong",
            NodeKind::Link => "link",
            NodeKind::Image => "image",
            NodeKind::CodeInline => "code-inline",
            NodeKind::CodeBlock => "code-block",
            NodeKind::List => "list",
            NodeKind::ListItem => "list-item",
            NodeKind::Blockquote => "blockquote",
            NodeKind::ThematicBreak => "thematic-break",
            NodeKind::LineBreak => "line-break",
            NodeKind::Text => "text",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Document { .. } => NodeKind::Document,
            Node::Paragraph { .. } => NodeKind::Paragraph,
            Node::Heading { .. } => NodeKind::Heading,
            Node::Emphasis { .. } => NodeKind::Emphasis,
            Node::Strong { .. } => NodeKind::Strong,
            Node::Link { .. } => NodeKind::Link,
            Node::Image { .. } => NodeKind::Image,
            Node::CodeInline { .. } => NodeKind::CodeInline,
            Node::CodeBlock { .. } => NodeKind::CodeBlock,
            Node::List { .. } => NodeKind::List,
            Node::ListItem { .. } => NodeKind::ListItem,
            Node::Blockquote { .. } => NodeKind::Blockquote,
            Node::ThematicBreak { .. } => NodeKind::ThematicBreak,
            Node::LineBreak => NodeKind::LineBreak,
            Node::Text { .. } => NodeKind::Text,
        }
    }

    /// Child nodes in reading order. Leaf kinds return an empty slice.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children }
            | Node::Paragraph { children, .. }
            | Node::Heading { children, .. }
            | Node::Emphasis { children }
            | Node::Strong { children }
            | Node::Link { children, .. }
            | Node::List { children, .. }
            | Node::ListItem { children, .. }
            | Node::Blockquote { children, .. } => children,
            Node::Image { .. }
            | Node::CodeInline { .. }
            | Node::CodeBlock { .. }
            | Node::ThematicBreak { .. }
            | Node::LineBreak
            | Node::Text { .. } => &[],
        }
    }

    /// Source location, present on block-level nodes.
    pub fn span(&self) -> Option<Span> {
        match self {
            Node::Paragraph { span, .. }
            | Node::Heading { span, .. }
            | Node::CodeBlock { span, .. }
            | Node::List { span, .. }
            | Node::ListItem { span, .. }
            | Node::Blockquote { span, .. }
            | Node::ThematicBreak { span } => Some(*span),
            _ => None,
        }
    }

    /// Concatenated text content with all markup removed.
    ///
    /// Used for image `alt` text and page titles. Line breaks become spaces.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Text { value } | Node::CodeInline { value } | Node::CodeBlock { value, .. } => {
            out.push_str(value)
        }
        Node::Image { alt, .. } => out.push_str(alt),
        Node::LineBreak => out.push(' '),
        other => {
            for child in other.children() {
                collect_text(child, out);
            }
        }
    }
}

/// A link reference definition, `[label]: url "title"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDefinition {
    /// Label as written in the source.
    pub label: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub span: Span,
}

/// Source location of a block in the original document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// 1-based starting line number.
    pub start_line: usize,
    /// 1-based ending line number (inclusive).
    pub end_line: usize,
    /// 0-based byte offset of the first character.
    pub start_offset: usize,
    /// 0-based byte offset past the last character.
    pub end_offset: usize,
}

impl Span {
    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        Span {
            start_line: self.start_line.min(other.start_line),
            end_line: self.end_line.max(other.end_line),
            start_offset: self.start_offset.min(other.start_offset),
            end_offset: self.end_offset.max(other.end_offset),
        }
    }
}
