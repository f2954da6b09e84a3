//! Inline resolution.
//!
//! Turns the raw text of a paragraph or heading into inline nodes. Code spans
//! bind first, then brackets resolve into links and images as each `]` is
//! seen, and emphasis is paired last with the delimiter-run rules (left and
//! right flanking, the rule of three). Nothing here fails: markup that does
//! not resolve stays literal text.

use std::collections::{HashMap, HashSet};

use crate::refs::{Definitions, label_end, parse_destination, parse_title, skip_whitespace};
use crate::tokenizer::{RawToken, TokenKind, scan_inline};
use crate::types::Node;

/// Parse inline content against a set of link definitions.
pub fn parse_inlines(text: &str, definitions: &Definitions) -> Vec<Node> {
    let mut unresolved = Vec::new();
    parse_inlines_with(text, definitions, &mut unresolved)
}

/// Like [`parse_inlines`], also reporting the labels of full and collapsed
/// references that had no definition.
pub(crate) fn parse_inlines_with(
    text: &str,
    definitions: &Definitions,
    unresolved: &mut Vec<String>,
) -> Vec<Node> {
    let tokens = scan_inline(text);
    let mut resolver = Resolver {
        text,
        tokens: &tokens,
        definitions,
        unresolved,
        pieces: Vec::new(),
        open_brackets: Vec::new(),
        links_formed: 0,
        unclosed_runs: HashSet::new(),
    };
    resolver.run();
    finish(resolver.pieces)
}

/// Intermediate inline item: a finished node, or a delimiter still waiting
/// for its partner.
#[derive(Debug)]
enum Piece {
    Node(Node),
    Delim(Delim),
    Bracket(Bracket),
}

#[derive(Debug, Clone, Copy)]
struct Delim {
    ch: char,
    /// Characters still available for pairing.
    count: usize,
    /// Run length as written, for the rule of three.
    orig: usize,
    can_open: bool,
    can_close: bool,
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    image: bool,
    /// Links formed before this bracket opened. Links may not contain links,
    /// so a `[` is inactive once any later link has closed.
    links_before: usize,
    /// Byte offset just past the opening bracket.
    content_start: usize,
}

struct Resolver<'t, 'a, 'd, 'u> {
    text: &'a str,
    tokens: &'t [RawToken<'a>],
    definitions: &'d Definitions,
    unresolved: &'u mut Vec<String>,
    pieces: Vec<Piece>,
    /// Indices into `pieces` of unresolved brackets, innermost last.
    open_brackets: Vec<usize>,
    links_formed: usize,
    /// Backtick run lengths with no closing run after some earlier point.
    unclosed_runs: HashSet<usize>,
}

impl Resolver<'_, '_, '_, '_> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.tokens.len() {
            let token = self.tokens[i];
            i = match token.kind {
                TokenKind::Backticks { length } => self.code_span(i, length),
                TokenKind::CloseBracket => self.close_bracket(i),
                _ => {
                    self.simple_token(token);
                    i + 1
                }
            };
        }
    }

    fn simple_token(&mut self, token: RawToken<'_>) {
        match token.kind {
            TokenKind::Escape => self.push_text(&token.text[1..]),
            TokenKind::SoftBreak => self.push_text("\n"),
            TokenKind::HardBreak => self.pieces.push(Piece::Node(Node::LineBreak)),
            TokenKind::Autolink => {
                let inner = &token.text[1..token.text.len() - 1];
                let url = if inner.contains('@') && !inner.contains(':') {
                    format!("mailto:{inner}")
                } else {
                    inner.to_string()
                };
                self.pieces.push(Piece::Node(Node::Link {
                    url,
                    title: None,
                    children: vec![Node::text(inner)],
                }));
            }
            TokenKind::DelimiterRun { delimiter } => {
                let (can_open, can_close) = flanking(self.text, token, delimiter);
                self.pieces.push(Piece::Delim(Delim {
                    ch: delimiter,
                    count: token.text.len(),
                    orig: token.text.len(),
                    can_open,
                    can_close,
                }));
            }
            TokenKind::OpenBracket | TokenKind::ImageOpen => {
                self.open_brackets.push(self.pieces.len());
                self.pieces.push(Piece::Bracket(Bracket {
                    image: token.kind == TokenKind::ImageOpen,
                    links_before: self.links_formed,
                    content_start: token.span.end_offset,
                }));
            }
            _ => self.push_text(token.text),
        }
    }

    fn push_text(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        if let Some(Piece::Node(Node::Text { value: last })) = self.pieces.last_mut() {
            last.push_str(value);
        } else {
            self.pieces.push(Piece::Node(Node::text(value)));
        }
    }

    /// A backtick run opens a code span when an equally long run follows;
    /// otherwise it is literal. Returns the next token index.
    fn code_span(&mut self, i: usize, length: usize) -> usize {
        let open = self.tokens[i];
        let close = if self.unclosed_runs.contains(&length) {
            None
        } else {
            (i + 1..self.tokens.len())
                .find(|&j| self.tokens[j].kind == TokenKind::Backticks { length })
        };
        let Some(j) = close else {
            self.unclosed_runs.insert(length);
            self.push_text(open.text);
            return i + 1;
        };

        let content = &self.text[open.span.end_offset..self.tokens[j].span.start_offset];
        let value = normalize_code(content);
        self.pieces.push(Piece::Node(Node::CodeInline { value }));
        j + 1
    }

    /// Resolve a `]` against the nearest open bracket. Returns the next token
    /// index.
    fn close_bracket(&mut self, i: usize) -> usize {
        let close = self.tokens[i];
        let Some(open_idx) = self.open_brackets.pop() else {
            self.push_text("]");
            return i + 1;
        };
        let Piece::Bracket(bracket) = self.pieces[open_idx] else {
            return i + 1;
        };

        if !bracket.image && bracket.links_before < self.links_formed {
            self.pieces[open_idx] = Piece::Node(Node::text(opener_text(bracket)));
            self.push_text("]");
            return i + 1;
        }

        let Some((url, title, end)) =
            self.resolve_target(bracket.content_start, close.span.end_offset)
        else {
            self.pieces[open_idx] = Piece::Node(Node::text(opener_text(bracket)));
            self.push_text("]");
            return i + 1;
        };

        let inner: Vec<Piece> = self.pieces.drain(open_idx + 1..).collect();
        self.pieces.pop();
        let children = finish(inner);

        let node = if bracket.image {
            let alt = children.iter().map(Node::plain_text).collect::<String>();
            Node::Image { url, title, alt }
        } else {
            self.links_formed += 1;
            Node::Link {
                url,
                title,
                children,
            }
        };
        self.pieces.push(Piece::Node(node));

        // Skip the tokens covered by the destination or label; a token that
        // straddles the end contributes its tail as text.
        let text = self.text;
        let mut next = i + 1;
        while next < self.tokens.len() && self.tokens[next].span.start_offset < end {
            let token = self.tokens[next];
            if token.span.end_offset > end {
                self.push_text(&text[end..token.span.end_offset]);
            }
            next += 1;
        }
        next
    }

    /// Find the link target following `[label]`: inline `(dest "title")`,
    /// full `[ref]`, collapsed `[]` or shortcut. `label_start` is just past
    /// the opening `[` and `after` just past the closing `]`. Returns url,
    /// title and the offset where the link syntax ends.
    fn resolve_target(
        &mut self,
        label_start: usize,
        after: usize,
    ) -> Option<(String, Option<String>, usize)> {
        let text = self.text;
        let label = &text[label_start..after - 1];
        let rest = &text[after..];

        if rest.starts_with('(') {
            if let Some((url, title, used)) = inline_target(rest) {
                return Some((url, title, after + used));
            }
        }

        if let Some(used) = label_end(rest) {
            let reference = &rest[1..used - 1];
            let key = if reference.trim().is_empty() { label } else { reference };
            return match self.definitions.get(key) {
                Some(def) => Some((def.url.clone(), def.title.clone(), after + used)),
                None => {
                    self.unresolved.push(key.to_string());
                    None
                }
            };
        }

        if label_end(&text[label_start - 1..]) != Some(label.len() + 2) {
            // Labels containing brackets never match a definition.
            return None;
        }
        self.definitions
            .get(label)
            .map(|def| (def.url.clone(), def.title.clone(), after))
    }
}

/// Parse `(dest "title")` at the start of `rest`. Returns url, title and
/// bytes consumed.
fn inline_target(rest: &str) -> Option<(String, Option<String>, usize)> {
    let mut pos = 1 + skip_whitespace(&rest[1..], true);
    if rest[pos..].starts_with(')') {
        return Some((String::new(), None, pos + 1));
    }

    let (url, used) = parse_destination(&rest[pos..], true)?;
    pos += used;

    let mut title = None;
    let sep = skip_whitespace(&rest[pos..], true);
    pos += sep;
    if sep > 0 {
        if let Some((value, used)) = parse_title(&rest[pos..]) {
            title = Some(value);
            pos += used;
            pos += skip_whitespace(&rest[pos..], true);
        }
    }

    rest[pos..].starts_with(')').then_some((url, title, pos + 1))
}

fn opener_text(bracket: Bracket) -> &'static str {
    if bracket.image { "![" } else { "[" }
}

/// Line endings become spaces; one surrounding space is stripped when both
/// ends have one and the content is not all spaces.
fn normalize_code(raw: &str) -> String {
    let value = raw.replace('\n', " ");
    let stripped = value
        .strip_prefix(' ')
        .and_then(|v| v.strip_suffix(' '))
        .filter(|_| value.bytes().any(|b| b != b' '));
    match stripped {
        Some(inner) => inner.to_string(),
        None => value,
    }
}

/// Whether a delimiter run can open and/or close emphasis.
fn flanking(text: &str, token: RawToken<'_>, delimiter: char) -> (bool, bool) {
    let before = text[..token.span.start_offset].chars().next_back();
    let after = text[token.span.end_offset..].chars().next();

    let space = |c: Option<char>| c.is_none_or(char::is_whitespace);
    let punct = |c: Option<char>| c.is_some_and(is_punctuation);

    let left = !space(after) && (!punct(after) || space(before) || punct(before));
    let right = !space(before) && (!punct(before) || space(after) || punct(after));

    if delimiter == '_' {
        (left && (!right || punct(before)), right && (!left || punct(after)))
    } else {
        (left, right)
    }
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace() && !c.is_control())
}

/// Pair emphasis delimiters, then flatten to nodes.
fn finish(pieces: Vec<Piece>) -> Vec<Node> {
    into_nodes(process_emphasis(pieces))
}

/// Closer char, whether the closer can also open, closer length mod 3.
type BottomKey = (char, bool, usize);

/// Walk the pieces left to right over an output stack. Each closer pairs with
/// the nearest eligible opener below it; the wrapped pieces collapse into one
/// emphasis node. A failed search records the stack height as the floor for
/// later closers of the same kind, so no stretch is searched twice.
fn process_emphasis(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut stack: Vec<Piece> = Vec::with_capacity(pieces.len());
    let mut openers_bottom: HashMap<BottomKey, usize> = HashMap::new();

    for piece in pieces {
        let mut closer = match piece {
            Piece::Delim(d) if d.can_close && d.count > 0 => d,
            other => {
                stack.push(other);
                continue;
            }
        };
        let key = (closer.ch, closer.can_open, closer.orig % 3);

        while closer.count > 0 {
            let bottom = openers_bottom.get(&key).map_or(0, |&b| b.min(stack.len()));
            let found = (bottom..stack.len()).rev().find(|&j| match &stack[j] {
                Piece::Delim(o) => {
                    o.ch == closer.ch
                        && o.can_open
                        && o.count > 0
                        && !breaks_rule_of_three(o, &closer)
                }
                _ => false,
            });
            let Some(opener) = found else {
                openers_bottom.insert(key, stack.len());
                break;
            };

            let children = into_nodes(stack.split_off(opener + 1));
            let Some(Piece::Delim(o)) = stack.last_mut() else {
                break;
            };
            let used = if o.count >= 2 && closer.count >= 2 { 2 } else { 1 };
            o.count -= used;
            closer.count -= used;
            if o.count == 0 {
                stack.pop();
            }
            stack.push(Piece::Node(if used == 2 {
                Node::Strong { children }
            } else {
                Node::Emphasis { children }
            }));

            // Everything above the opener is gone.
            for b in openers_bottom.values_mut() {
                *b = (*b).min(opener);
            }
        }

        if closer.count > 0 {
            stack.push(Piece::Delim(closer));
        }
    }
    stack
}

/// A run that can both open and close may only pair with another whose
/// combined length is not a multiple of three, unless both are.
fn breaks_rule_of_three(opener: &Delim, closer: &Delim) -> bool {
    (opener.can_close || closer.can_open)
        && (opener.orig + closer.orig) % 3 == 0
        && !(opener.orig % 3 == 0 && closer.orig % 3 == 0)
}

/// Flatten pieces, turning unpaired delimiters and brackets into text and
/// merging adjacent text.
fn into_nodes(pieces: Vec<Piece>) -> Vec<Node> {
    let mut nodes: Vec<Node> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let node = match piece {
            Piece::Node(node) => node,
            Piece::Delim(d) if d.count == 0 => continue,
            Piece::Delim(d) => Node::text(d.ch.to_string().repeat(d.count)),
            Piece::Bracket(b) => Node::text(opener_text(b)),
        };
        match (nodes.last_mut(), node) {
            (Some(Node::Text { value: last }), Node::Text { value }) => last.push_str(&value),
            (_, node) => nodes.push(node),
        }
    }
    nodes
}
