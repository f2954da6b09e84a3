use std::borrow::Cow;

use crate::error::{Diagnostic, Severity};
use crate::inline::parse_inlines_with;
use crate::refs::{Definitions, parse_definition};
use crate::tokenizer::{RawToken, TokenKind, tokenize};
use crate::types::{Node, Span};

/// Result of parsing a Markdown document.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Tree root, always a `Node::Document`.
    pub root: Node,
    /// Link reference definitions found anywhere in the document.
    pub definitions: Definitions,
    /// Non-fatal diagnostics collected during parsing.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a Markdown string into a `ParseResult`.
///
/// This function never panics. Anything that is not recognised markup
/// becomes literal text.
pub fn parse(input: &str) -> ParseResult {
    // Normalise CRLF → LF.
    let normalised = input.replace("\r\n", "\n");
    let tokens = tokenize(&normalised);
    parse_tokens(&normalised, &tokens)
}

/// Parse an already tokenized source.
///
/// `tokens` must come from [`tokenize`] over the same `source`.
pub fn parse_tokens(source: &str, tokens: &[RawToken<'_>]) -> ParseResult {
    let mut lines: Vec<&[RawToken<'_>]> = tokens
        .split_inclusive(|t| t.kind == TokenKind::LineEnding)
        .collect();

    // A trailing newline leaves an empty final line that is not content.
    if lines.len() > 1 && lines.last().is_some_and(|l| is_phantom_line(l)) {
        lines.pop();
    }

    // ---------------------------------------------------------------
    // Pass 1: block structure.
    // ---------------------------------------------------------------
    let mut builder = BlockBuilder::new(source);
    for line in &lines {
        builder.process_line(line);
    }
    let (blocks, definitions, mut diagnostics) = builder.finish();

    // ---------------------------------------------------------------
    // Pass 2: inline resolution, after every definition is known.
    // ---------------------------------------------------------------
    let children = blocks
        .into_iter()
        .map(|block| resolve_block(block, &definitions, &mut diagnostics))
        .collect::<Vec<_>>();

    tracing::debug!(
        lines = lines.len(),
        blocks = children.len(),
        definitions = definitions.len(),
        diagnostics = diagnostics.len(),
        "parsed markdown document"
    );

    ParseResult {
        root: Node::Document { children },
        definitions,
        diagnostics,
    }
}

fn is_phantom_line(line: &[RawToken<'_>]) -> bool {
    matches!(
        line,
        [
            RawToken { kind: TokenKind::Text, text: "", .. },
            RawToken { kind: TokenKind::LineEnding, text: "", .. },
        ]
    )
}

// ------------------------------------------------------------------
// Block tree (pass 1 output)
// ------------------------------------------------------------------

/// Block structure with unresolved inline text.
#[derive(Debug)]
enum Block {
    Paragraph {
        text: String,
        span: Span,
    },
    Heading {
        level: u8,
        text: String,
        span: Span,
    },
    CodeBlock {
        lang: Option<String>,
        value: String,
        span: Span,
    },
    ThematicBreak {
        span: Span,
    },
    Blockquote {
        children: Vec<Block>,
        span: Span,
    },
    List {
        ordered: bool,
        start: u64,
        tight: bool,
        items: Vec<Block>,
        span: Span,
    },
    ListItem {
        children: Vec<Block>,
        span: Span,
    },
}

fn resolve_block(block: Block, defs: &Definitions, diagnostics: &mut Vec<Diagnostic>) -> Node {
    let resolve_all = |blocks: Vec<Block>, diagnostics: &mut Vec<Diagnostic>| {
        blocks
            .into_iter()
            .map(|b| resolve_block(b, defs, diagnostics))
            .collect::<Vec<_>>()
    };

    match block {
        Block::Paragraph { text, span } => Node::Paragraph {
            children: resolve_inline(&text, span, defs, diagnostics),
            span,
        },
        Block::Heading { level, text, span } => Node::Heading {
            level,
            children: resolve_inline(&text, span, defs, diagnostics),
            span,
        },
        Block::CodeBlock { lang, value, span } => Node::CodeBlock { lang, value, span },
        Block::ThematicBreak { span } => Node::ThematicBreak { span },
        Block::Blockquote { children, span } => Node::Blockquote {
            children: resolve_all(children, diagnostics),
            span,
        },
        Block::List {
            ordered,
            start,
            tight,
            items,
            span,
        } => Node::List {
            ordered,
            start: ordered.then_some(start),
            tight,
            children: resolve_all(items, diagnostics),
            span,
        },
        Block::ListItem { children, span } => Node::ListItem {
            children: resolve_all(children, diagnostics),
            span,
        },
    }
}

fn resolve_inline(
    text: &str,
    span: Span,
    defs: &Definitions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Node> {
    let mut unresolved = Vec::new();
    let nodes = parse_inlines_with(text, defs, &mut unresolved);
    for label in unresolved {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message: format!("Unresolved link reference '{label}'"),
            span: Some(span),
            code: Some("W002".into()),
        });
    }
    nodes
}

// ------------------------------------------------------------------
// Block scanning
// ------------------------------------------------------------------

/// An open container on the nesting stack.
struct OpenContainer {
    kind: ContainerKind,
    children: Vec<Block>,
    span: Span,
}

enum ContainerKind {
    Document,
    Blockquote,
    List {
        ordered: bool,
        delimiter: char,
        start: u64,
        loose: bool,
        /// A blank line was seen since the list's last content.
        pending_blank: bool,
    },
    Item {
        /// Absolute column where item content starts.
        content_indent: usize,
    },
}

/// The single open leaf block, owned by the innermost container.
enum OpenLeaf {
    Paragraph {
        lines: Vec<String>,
        span: Span,
    },
    Fence {
        fence: char,
        length: usize,
        indent: usize,
        lang: Option<String>,
        lines: Vec<String>,
        span: Span,
    },
}

struct BlockBuilder<'s> {
    source: &'s str,
    stack: Vec<OpenContainer>,
    leaf: Option<OpenLeaf>,
    definitions: Definitions,
    diagnostics: Vec<Diagnostic>,
}

/// Position info for the line being processed.
#[derive(Clone, Copy)]
struct LineInfo {
    number: usize,
    end: usize,
}

impl<'s> BlockBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: vec![OpenContainer {
                kind: ContainerKind::Document,
                children: Vec::new(),
                span: Span::default(),
            }],
            leaf: None,
            definitions: Definitions::new(),
            diagnostics: Vec::new(),
        }
    }

    fn process_line(&mut self, tokens: &[RawToken<'_>]) {
        let mut line = LineCursor::new(tokens);
        let info = LineInfo {
            number: tokens[0].span.start_line,
            end: line.line_end(),
        };

        // Step 1: continue the open containers, outermost first.
        let matched = self.match_containers(&mut line);
        let all_matched = matched == self.stack.len();

        // Step 2: fenced code swallows everything until its closing fence.
        if all_matched {
            if matches!(self.leaf, Some(OpenLeaf::Fence { .. })) {
                self.continue_fence(&mut line, info);
                return;
            }
        }

        let rest_blank = line.is_blank();

        // Lazy continuation: plain text keeps an open paragraph alive even
        // when its containers did not match.
        if !all_matched && !rest_blank && self.is_lazy_continuation(&line) {
            let text = line.raw_rest(self.source).trim_start().to_string();
            if let Some(OpenLeaf::Paragraph { lines, .. }) = &mut self.leaf {
                lines.push(text);
            }
            self.extend_spans(info);
            return;
        }

        // Step 3: close what did not continue.
        self.close_to(matched);

        if rest_blank {
            self.mark_blank_in_list();
        }

        // Step 4: open new containers.
        self.open_containers(&mut line, info);

        // Step 5: the leaf content of the line.
        if line.is_blank() {
            if matches!(self.leaf, Some(OpenLeaf::Paragraph { .. })) {
                self.finalize_leaf(false);
            }
            return;
        }
        self.add_leaf_content(&mut line, info);
        self.extend_spans(info);
        self.note_list_content();
    }

    /// Returns how many stack entries (document included) this line continues.
    fn match_containers(&self, line: &mut LineCursor<'_, '_>) -> usize {
        let mut matched = 1;
        for idx in 1..self.stack.len() {
            match &self.stack[idx].kind {
                ContainerKind::Document => {}
                ContainerKind::Blockquote => {
                    let is_marker = line.indent() < 4
                        && line
                            .peek_after_indent()
                            .is_some_and(|t| t.kind == TokenKind::BlockquoteMarker);
                    if !is_marker {
                        break;
                    }
                    line.skip_indent();
                    line.advance();
                }
                ContainerKind::List { .. } => {
                    // Decided together with its open item below.
                }
                ContainerKind::Item { content_indent } => {
                    if line.is_blank() {
                        // Blank lines never end an item by themselves.
                    } else if line.col() + line.indent() >= *content_indent {
                        line.consume_indent(content_indent.saturating_sub(line.col()));
                    } else {
                        // The item ends. Its list survives only when the
                        // line starts a sibling item.
                        let parent = &self.stack[idx - 1].kind;
                        return if starts_sibling_item(parent, line) { idx } else { idx - 1 };
                    }
                }
            }
            matched = idx + 1;
        }
        matched
    }

    fn is_lazy_continuation(&self, line: &LineCursor<'_, '_>) -> bool {
        if !matches!(self.leaf, Some(OpenLeaf::Paragraph { .. })) {
            return false;
        }
        matches!(line.peek_after_indent(), Some(t) if t.kind == TokenKind::Text)
    }

    fn continue_fence(&mut self, line: &mut LineCursor<'_, '_>, info: LineInfo) {
        let Some(OpenLeaf::Fence {
            fence,
            length,
            indent,
            lines,
            span,
            ..
        }) = &mut self.leaf
        else {
            return;
        };

        let closes = line.indent() < 4
            && match line.tokens_after_indent() {
                [close, rest @ ..] => {
                    matches!(
                        close.kind,
                        TokenKind::CodeFence { fence: f, length: l } if f == *fence && l >= *length
                    ) && rest.iter().all(|t| t.text.trim().is_empty())
                }
                [] => false,
            };

        span.end_line = info.number;
        span.end_offset = info.end;

        if closes {
            self.finalize_leaf(true);
        } else {
            let raw = line.raw_rest(self.source);
            lines.push(strip_columns(&raw, *indent).to_string());
        }
        self.extend_spans(info);
    }

    fn open_containers(&mut self, line: &mut LineCursor<'_, '_>, info: LineInfo) {
        loop {
            if line.indent() >= 4 {
                return;
            }
            let Some(&token) = line.peek_after_indent() else {
                return;
            };
            match token.kind {
                TokenKind::BlockquoteMarker => {
                    self.finalize_leaf(false);
                    line.skip_indent();
                    line.advance();
                    self.stack.push(OpenContainer {
                        kind: ContainerKind::Blockquote,
                        children: Vec::new(),
                        span: start_span(info, token.span.start_offset),
                    });
                }
                TokenKind::ListMarker {
                    ordered,
                    number,
                    delimiter,
                } => {
                    let empty_item = line.tokens_after_indent()[1..]
                        .iter()
                        .all(|t| t.text.trim().is_empty());
                    if matches!(self.leaf, Some(OpenLeaf::Paragraph { .. }))
                        && ((ordered && number != 1) || empty_item)
                    {
                        // Cannot interrupt a paragraph; stays text.
                        return;
                    }
                    self.finalize_leaf(false);

                    let marker_col = line.col() + line.indent();
                    line.skip_indent();
                    line.advance();
                    let bare = token.text.trim_end().len();
                    let content_indent = if empty_item || token.text.len() == bare {
                        marker_col + bare + 1
                    } else {
                        marker_col + token.text.len()
                    };

                    let continues = matches!(
                        self.stack.last().map(|c| &c.kind),
                        Some(ContainerKind::List { ordered: o, delimiter: d, .. })
                            if *o == ordered && *d == delimiter
                    );
                    if !continues {
                        let top = self.stack.last().map(|c| &c.kind);
                        if matches!(top, Some(ContainerKind::List { .. })) {
                            self.close_top();
                        }
                        self.stack.push(OpenContainer {
                            kind: ContainerKind::List {
                                ordered,
                                delimiter,
                                start: number,
                                loose: false,
                                pending_blank: false,
                            },
                            children: Vec::new(),
                            span: start_span(info, token.span.start_offset),
                        });
                    }
                    self.stack.push(OpenContainer {
                        kind: ContainerKind::Item { content_indent },
                        children: Vec::new(),
                        span: start_span(info, token.span.start_offset),
                    });
                }
                _ => return,
            }
        }
    }

    fn add_leaf_content(&mut self, line: &mut LineCursor<'_, '_>, info: LineInfo) {
        let indent = line.indent();
        let token = line.peek_after_indent().copied();

        if indent < 4 {
            if let Some(token) = token {
                match token.kind {
                    TokenKind::AtxHeading { level } => {
                        self.finalize_leaf(false);
                        line.skip_indent();
                        line.advance();
                        let rest = line.raw_rest(self.source);
                        let text = strip_closing_hashes(&rest);
                        self.push_block(Block::Heading {
                            level,
                            text: text.to_string(),
                            span: start_span(info, token.span.start_offset),
                        });
                        return;
                    }
                    TokenKind::ThematicBreak => {
                        let underline = token.text.trim().chars().all(|c| c == '-');
                        if underline && self.setext_heading(2, info) {
                            return;
                        }
                        self.finalize_leaf(false);
                        self.push_block(Block::ThematicBreak {
                            span: start_span(info, token.span.start_offset),
                        });
                        return;
                    }
                    TokenKind::CodeFence { fence, length } => {
                        self.finalize_leaf(false);
                        line.skip_indent();
                        line.advance();
                        let rest = line.raw_rest(self.source);
                        let info_string = rest.trim();
                        let lang = info_string
                            .split_whitespace()
                            .next()
                            .map(crate::refs::unescape);
                        self.leaf = Some(OpenLeaf::Fence {
                            fence,
                            length,
                            indent,
                            lang,
                            lines: Vec::new(),
                            span: start_span(info, token.span.start_offset),
                        });
                        return;
                    }
                    TokenKind::ListMarker {
                        ordered: false,
                        delimiter: '-',
                        ..
                    } if line.tokens_after_indent()[1..]
                        .iter()
                        .all(|t| t.text.trim().is_empty())
                        && self.setext_heading(2, info) =>
                    {
                        return;
                    }
                    TokenKind::Text => {
                        let trimmed = token.text.trim();
                        if !trimmed.is_empty()
                            && trimmed.chars().all(|c| c == '=')
                            && self.setext_heading(1, info)
                        {
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }

        line.skip_indent();
        let start = line.rest_offset();
        let text = line.raw_rest(self.source).into_owned();
        match &mut self.leaf {
            Some(OpenLeaf::Paragraph { lines, .. }) => lines.push(text),
            _ => {
                self.finalize_leaf(false);
                self.leaf = Some(OpenLeaf::Paragraph {
                    lines: vec![text],
                    span: start_span(info, start),
                });
            }
        }
    }

    /// Turn the open paragraph into a setext heading. Returns `false` when
    /// there is no paragraph to underline.
    fn setext_heading(&mut self, level: u8, info: LineInfo) -> bool {
        let Some(OpenLeaf::Paragraph { lines, span }) = self.leaf.take() else {
            return false;
        };
        let span = Span {
            end_line: info.number,
            end_offset: info.end,
            ..span
        };
        let text = self.take_definitions(lines.join("\n"), span);
        if text.is_empty() {
            // Only definitions: the underline is an ordinary line.
            return false;
        }
        self.push_block(Block::Heading { level, text, span });
        true
    }

    fn push_block(&mut self, block: Block) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(block);
        }
    }

    /// Close the open leaf into the innermost container.
    fn finalize_leaf(&mut self, fence_closed: bool) {
        match self.leaf.take() {
            None => {}
            Some(OpenLeaf::Paragraph { lines, span }) => {
                let text = self.take_definitions(lines.join("\n"), span);
                if !text.is_empty() {
                    self.push_block(Block::Paragraph { text, span });
                }
            }
            Some(OpenLeaf::Fence {
                lang, lines, span, ..
            }) => {
                if !fence_closed {
                    self.diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        message: format!("Unclosed code fence opened at line {}", span.start_line),
                        span: Some(span),
                        code: Some("W001".into()),
                    });
                }
                let mut value = lines.join("\n");
                if !lines.is_empty() {
                    value.push('\n');
                }
                self.push_block(Block::CodeBlock { lang, value, span });
            }
        }
    }

    /// Strip leading link reference definitions off a paragraph's text,
    /// registering them. Returns the remaining text, trimmed at the end.
    fn take_definitions(&mut self, text: String, span: Span) -> String {
        let mut pos = 0;
        while let Some((mut def, used)) = parse_definition(&text[pos..]) {
            let line = span.start_line + text[..pos].matches('\n').count();
            def.span = Span {
                start_line: line,
                end_line: line + text[pos..pos + used].trim_end().matches('\n').count(),
                ..span
            };
            let def_line = def.span.start_line;
            let label = def.label.clone();
            if !self.definitions.insert(def) {
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Info,
                    message: format!(
                        "Duplicate link definition '{label}' at line {def_line} is ignored"
                    ),
                    span: Some(span),
                    code: Some("I001".into()),
                });
            }
            pos += used;
        }
        text[pos..].trim_end().to_string()
    }

    /// Pop containers until `keep` remain, finalizing the leaf first.
    fn close_to(&mut self, keep: usize) {
        if self.stack.len() > keep {
            self.finalize_leaf(false);
        }
        while self.stack.len() > keep.max(1) {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(open) = self.stack.pop() else {
            return;
        };
        let block = match open.kind {
            ContainerKind::Document => return,
            ContainerKind::Blockquote => Block::Blockquote {
                children: open.children,
                span: open.span,
            },
            ContainerKind::Item { .. } => Block::ListItem {
                children: open.children,
                span: open.span,
            },
            ContainerKind::List {
                ordered,
                start,
                loose,
                pending_blank,
                ..
            } => {
                if pending_blank {
                    // A trailing blank line may still separate items of an
                    // enclosing list.
                    if let Some(ContainerKind::List { pending_blank, .. }) = self.deepest_list() {
                        *pending_blank = true;
                    }
                }
                Block::List {
                    ordered,
                    start,
                    tight: !loose,
                    items: open.children,
                    span: open.span,
                }
            }
        };
        self.push_block(block);
    }

    fn deepest_list(&mut self) -> Option<&mut ContainerKind> {
        self.stack
            .iter_mut()
            .rev()
            .map(|c| &mut c.kind)
            .find(|k| matches!(k, ContainerKind::List { .. }))
    }

    fn mark_blank_in_list(&mut self) {
        if let Some(ContainerKind::List { pending_blank, .. }) = self.deepest_list() {
            *pending_blank = true;
        }
    }

    fn note_list_content(&mut self) {
        if let Some(ContainerKind::List {
            loose,
            pending_blank,
            ..
        }) = self.deepest_list()
        {
            if *pending_blank {
                *loose = true;
                *pending_blank = false;
            }
        }
    }

    fn extend_spans(&mut self, info: LineInfo) {
        for open in self.stack.iter_mut().skip(1) {
            open.span.end_line = info.number;
            open.span.end_offset = info.end;
        }
        match &mut self.leaf {
            Some(OpenLeaf::Paragraph { span, .. }) | Some(OpenLeaf::Fence { span, .. }) => {
                span.end_line = info.number;
                span.end_offset = info.end;
            }
            None => {}
        }
    }

    fn finish(mut self) -> (Vec<Block>, Definitions, Vec<Diagnostic>) {
        self.close_to(1);
        self.finalize_leaf(false);
        let root = self.stack.pop().map(|c| c.children).unwrap_or_default();
        (root, self.definitions, self.diagnostics)
    }
}

/// Does `line` start a list item compatible with the list `parent`?
fn starts_sibling_item(parent: &ContainerKind, line: &LineCursor<'_, '_>) -> bool {
    let ContainerKind::List {
        ordered, delimiter, ..
    } = parent
    else {
        return false;
    };
    line.indent() < 4
        && matches!(
            line.peek_after_indent().map(|t| t.kind),
            Some(TokenKind::ListMarker { ordered: o, delimiter: d, .. })
                if o == *ordered && d == *delimiter
        )
}

fn start_span(info: LineInfo, start_offset: usize) -> Span {
    Span {
        start_line: info.number,
        end_line: info.number,
        start_offset,
        end_offset: info.end,
    }
}

/// Remove an optional closing `#` sequence from ATX heading content.
fn strip_closing_hashes(raw: &str) -> &str {
    let text = raw.trim();
    let without = text.trim_end_matches('#');
    if without.len() == text.len() {
        return text;
    }
    if without.is_empty() || without.ends_with([' ', '\t']) {
        without.trim_end()
    } else {
        text
    }
}

/// Strip up to `columns` leading spaces.
fn strip_columns(raw: &str, columns: usize) -> &str {
    let spaces = raw.bytes().take(columns).take_while(|&b| b == b' ').count();
    &raw[spaces..]
}

// ------------------------------------------------------------------
// Line cursor
// ------------------------------------------------------------------

/// Walks the tokens of one line, tracking the absolute column. Indentation
/// tokens can be consumed partially.
struct LineCursor<'t, 'a> {
    tokens: &'t [RawToken<'a>],
    pos: usize,
    indent_used: usize,
    col: usize,
}

impl<'t, 'a> LineCursor<'t, 'a> {
    fn new(tokens: &'t [RawToken<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            indent_used: 0,
            col: 0,
        }
    }

    fn col(&self) -> usize {
        self.col
    }

    /// Columns of indentation available at the cursor.
    fn indent(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(RawToken {
                kind: TokenKind::Indent { width },
                ..
            }) => width - self.indent_used,
            _ => 0,
        }
    }

    fn consume_indent(&mut self, n: usize) {
        let available = self.indent();
        let n = n.min(available);
        if n == 0 {
            return;
        }
        self.col += n;
        if n == available {
            self.pos += 1;
            self.indent_used = 0;
        } else {
            self.indent_used += n;
        }
    }

    fn skip_indent(&mut self) {
        self.consume_indent(self.indent());
    }

    fn tokens_after_indent(&self) -> &'t [RawToken<'a>] {
        let skip = usize::from(self.indent() > 0);
        self.tokens.get(self.pos + skip..).unwrap_or(&[])
    }

    fn peek_after_indent(&self) -> Option<&'t RawToken<'a>> {
        self.tokens_after_indent().first()
    }

    fn advance(&mut self) {
        if let Some(token) = self.tokens.get(self.pos) {
            self.col += token.text.len();
            self.pos += 1;
            self.indent_used = 0;
        }
    }

    fn is_blank(&self) -> bool {
        self.tokens[self.pos.min(self.tokens.len())..].iter().all(|t| match t.kind {
            TokenKind::Indent { .. } | TokenKind::LineEnding => true,
            TokenKind::Text => t.text.trim().is_empty(),
            _ => false,
        })
    }

    fn line_end(&self) -> usize {
        self.tokens.last().map_or(0, |t| t.span.start_offset)
    }

    /// Byte offset of the first character not fully consumed, plus the
    /// columns of a partly consumed tab that still belong to the rest.
    fn rest_position(&self) -> (usize, usize) {
        let token = match self.tokens.get(self.pos) {
            Some(t) if matches!(t.kind, TokenKind::Indent { .. }) => t,
            Some(t) => return (t.span.start_offset, 0),
            None => return (self.line_end(), 0),
        };

        // Tab stops are measured from the line start, where the indent
        // began at `col - indent_used`.
        let start_col = self.col - self.indent_used;
        let mut col = start_col;
        for (i, b) in token.text.bytes().enumerate() {
            let next = if b == b'\t' { col + 4 - col % 4 } else { col + 1 };
            if next - start_col > self.indent_used {
                let pad = (next - start_col - self.indent_used).min(next - col);
                return if col - start_col >= self.indent_used {
                    (token.span.start_offset + i, 0)
                } else {
                    (token.span.start_offset + i + 1, pad)
                };
            }
            col = next;
        }
        (token.span.end_offset, 0)
    }

    fn rest_offset(&self) -> usize {
        self.rest_position().0
    }

    /// Source text after the cursor. A tab split by the cursor contributes
    /// its remaining columns as spaces.
    fn raw_rest<'s>(&self, source: &'s str) -> Cow<'s, str> {
        let (offset, pad) = self.rest_position();
        let end = self.line_end().max(offset);
        if pad == 0 {
            Cow::Borrowed(&source[offset..end])
        } else {
            Cow::Owned(format!("{}{}", " ".repeat(pad), &source[offset..end]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn children(input: &str) -> Vec<Node> {
        match parse(input).root {
            Node::Document { children } => children,
            other => panic!("Expected document root, got {other:?}"),
        }
    }

    fn text(value: &str) -> Node {
        Node::text(value)
    }

    #[test]
    fn parse_empty_input() {
        let result = parse("");
        assert_eq!(result.root, Node::Document { children: vec![] });
        assert!(result.diagnostics.is_empty());
        assert!(result.definitions.is_empty());
    }

    #[test]
    fn parse_heading() {
        let blocks = children("# Title");
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Node::Heading {
                level,
                children,
                span,
            } => {
                assert_eq!(*level, 1);
                assert_eq!(children, &vec![text("Title")]);
                assert_eq!(span.start_line, 1);
                assert_eq!(span.end_offset, 7);
            }
            other => panic!("Expected heading, got {other:?}"),
        }
    }

    #[test]
    fn heading_without_space_is_paragraph() {
        let blocks = children("#Title");
        assert!(matches!(
            &blocks[0],
            Node::Paragraph { children, .. } if children == &vec![text("#Title")]
        ));
    }

    #[test]
    fn heading_closing_hashes_are_stripped() {
        let blocks = children("## Title ##\n### a#");
        assert!(matches!(
            &blocks[0],
            Node::Heading { children, .. } if children == &vec![text("Title")]
        ));
        assert!(matches!(
            &blocks[1],
            Node::Heading { level: 3, children, .. } if children == &vec![text("a#")]
        ));
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let blocks = children("one\ntwo\n\nthree\n");
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Node::Paragraph { children, span } => {
                assert_eq!(children, &vec![text("one\ntwo")]);
                assert_eq!(span.start_line, 1);
                assert_eq!(span.end_line, 2);
            }
            other => panic!("Expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn setext_headings() {
        let blocks = children("Big\n===\nSmall\n---");
        assert!(matches!(&blocks[0], Node::Heading { level: 1, .. }));
        assert!(matches!(&blocks[1], Node::Heading { level: 2, .. }));
    }

    #[test]
    fn thematic_break_without_paragraph() {
        let blocks = children("---\n\n***");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| matches!(b, Node::ThematicBreak { .. })));
    }

    #[test]
    fn fenced_code_keeps_content_verbatim() {
        let blocks = children("```rust\nlet a = *b*;\n\n# not a heading\n```\nafter");
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Node::CodeBlock { lang, value, span } => {
                assert_eq!(lang.as_deref(), Some("rust"));
                assert_eq!(value, "let a = *b*;\n\n# not a heading\n");
                assert_eq!(span.start_line, 1);
                assert_eq!(span.end_line, 5);
            }
            other => panic!("Expected code block, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_fence_warns() {
        let result = parse("~~~\ncode\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code.as_deref(), Some("W001"));
        match &result.root.children()[0] {
            Node::CodeBlock { value, .. } => assert_eq!(value, "code\n"),
            other => panic!("Expected code block, got {other:?}"),
        }
    }

    #[test]
    fn shorter_fence_does_not_close() {
        let blocks = children("````\n```\n````");
        match &blocks[0] {
            Node::CodeBlock { value, .. } => assert_eq!(value, "```\n"),
            other => panic!("Expected code block, got {other:?}"),
        }
    }

    #[test]
    fn blockquote_with_lazy_continuation() {
        let blocks = children("> quoted\nlazy\n\nout");
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Node::Blockquote { children, .. } => {
                assert_eq!(children.len(), 1);
                assert!(matches!(
                    &children[0],
                    Node::Paragraph { children, .. } if children == &vec![text("quoted\nlazy")]
                ));
            }
            other => panic!("Expected blockquote, got {other:?}"),
        }
    }

    #[test]
    fn nested_blockquotes() {
        let blocks = children("> a\n> > b");
        let Node::Blockquote { children, .. } = &blocks[0] else {
            panic!("Expected blockquote");
        };
        assert!(matches!(&children[0], Node::Paragraph { .. }));
        assert!(matches!(&children[1], Node::Blockquote { .. }));
    }

    #[test]
    fn tight_bullet_list() {
        let blocks = children("- one\n- two\n- three");
        match &blocks[0] {
            Node::List {
                ordered,
                start,
                tight,
                children,
                ..
            } => {
                assert!(!ordered);
                assert_eq!(*start, None);
                assert!(tight);
                assert_eq!(children.len(), 3);
                assert!(children.iter().all(|c| matches!(c, Node::ListItem { .. })));
            }
            other => panic!("Expected list, got {other:?}"),
        }
    }

    #[test]
    fn loose_list_when_items_separated_by_blank() {
        let blocks = children("1. one\n\n2. two");
        match &blocks[0] {
            Node::List {
                ordered,
                start,
                tight,
                children,
                ..
            } => {
                assert!(ordered);
                assert_eq!(*start, Some(1));
                assert!(!tight);
                assert_eq!(children.len(), 2);
            }
            other => panic!("Expected list, got {other:?}"),
        }
    }

    #[test]
    fn trailing_blank_keeps_list_tight() {
        let blocks = children("- a\n- b\n\nafter");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], Node::List { tight: true, .. }));
        assert!(matches!(&blocks[1], Node::Paragraph { .. }));
    }

    #[test]
    fn changing_bullet_starts_new_list() {
        let blocks = children("- a\n+ b");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| matches!(b, Node::List { .. })));
    }

    #[test]
    fn nested_list_by_indentation() {
        let blocks = children("- a\n  - b\n- c");
        let Node::List { children: items, .. } = &blocks[0] else {
            panic!("Expected list");
        };
        assert_eq!(items.len(), 2);
        let first = items[0].children();
        assert!(matches!(&first[0], Node::Paragraph { .. }));
        assert!(matches!(&first[1], Node::List { children, .. } if children.len() == 1));
    }

    #[test]
    fn item_continuation_paragraph() {
        let blocks = children("- a\n\n  b");
        let Node::List { children: items, tight, .. } = &blocks[0] else {
            panic!("Expected list");
        };
        assert!(!tight);
        assert_eq!(items[0].children().len(), 2);
    }

    #[test]
    fn ordered_list_not_starting_at_one_cannot_interrupt_paragraph() {
        let blocks = children("The year\n2024. was good");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(
            &blocks[0],
            Node::Paragraph { children, .. } if children == &vec![text("The year\n2024. was good")]
        ));
    }

    #[test]
    fn ordered_list_start_number() {
        let blocks = children("7) seven\n8) eight");
        assert!(matches!(&blocks[0], Node::List { ordered: true, start: Some(7), .. }));
    }

    #[test]
    fn list_item_can_hold_heading_and_code() {
        let blocks = children("- # Head\n- ```\n  code\n  ```");
        let Node::List { children: items, .. } = &blocks[0] else {
            panic!("Expected list");
        };
        assert!(matches!(&items[0].children()[0], Node::Heading { level: 1, .. }));
        match &items[1].children()[0] {
            Node::CodeBlock { value, .. } => assert_eq!(value, "code\n"),
            other => panic!("Expected code block, got {other:?}"),
        }
    }

    #[test]
    fn tab_split_by_item_indent_keeps_its_columns() {
        let blocks = children("- ```\n\tx\n  ```");
        let Node::List { children: items, .. } = &blocks[0] else {
            panic!("Expected list");
        };
        match &items[0].children()[0] {
            Node::CodeBlock { value, .. } => assert_eq!(value, "  x\n"),
            other => panic!("Expected code block, got {other:?}"),
        }
    }

    #[test]
    fn definitions_are_collected_and_removed() {
        let result = parse("[Home]: https://example.com \"Start\"\n\nGo [home].");
        assert_eq!(result.definitions.len(), 1);
        let blocks = result.root.children();
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Node::Paragraph { children, .. } => match &children[1] {
                Node::Link { url, title, .. } => {
                    assert_eq!(url, "https://example.com");
                    assert_eq!(title.as_deref(), Some("Start"));
                }
                other => panic!("Expected link, got {other:?}"),
            },
            other => panic!("Expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn forward_reference_inside_container() {
        let result = parse("- see [doc][d]\n\n> [d]: /docs");
        assert!(result.diagnostics.is_empty(), "diagnostics: {:?}", result.diagnostics);
        let blocks = result.root.children();
        // The definition-only blockquote keeps no paragraph.
        assert!(matches!(&blocks[1], Node::Blockquote { children, .. } if children.is_empty()));
    }

    #[test]
    fn duplicate_definition_reports_info() {
        let result = parse("[a]: /one\n[a]: /two\n\n[a]");
        assert_eq!(result.definitions.get("a").unwrap().url, "/one");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].severity, Severity::Info);
        assert_eq!(result.diagnostics[0].code.as_deref(), Some("I001"));
    }

    #[test]
    fn unresolved_full_reference_warns() {
        let result = parse("See [x][missing].");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code.as_deref(), Some("W002"));
        match &result.root.children()[0] {
            Node::Paragraph { children, .. } => {
                assert_eq!(children, &vec![text("See [x][missing].")]);
            }
            other => panic!("Expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn crlf_is_normalised() {
        let blocks = children("# A\r\n\r\nb\r\n");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(
            &blocks[1],
            Node::Paragraph { children, .. } if children == &vec![text("b")]
        ));
    }

    #[test]
    fn delimiter_only_inputs_do_not_panic() {
        for input in ["***", "[[[", "```", "> ", "-", "1.", "#", "   ", "\n\n\n", "__", "![", "]"] {
            let result = parse(input);
            assert!(matches!(result.root, Node::Document { .. }), "input {input:?}");
        }
    }
}
