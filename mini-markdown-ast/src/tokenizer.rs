//! Lexical scanner.
//!
//! Two entry points:
//!
//! - [`tokenize`] walks the source line by line and emits block markers
//!   (indentation, `>` markers, list markers, heading/fence/break markers),
//!   then one `Text` token for the rest of the line and a `LineEnding`.
//! - [`scan_inline`] walks the text of a single leaf block character by
//!   character and emits delimiter runs, brackets, backtick runs, escapes,
//!   autolinks, line breaks and literal text.
//!
//! Neither function fails. Anything that is not a recognised marker is
//! emitted as `Text`, and no semantic decision (does `*` open emphasis, is
//! `[x](y)` a link) is made here.

use crate::types::Span;

/// Tab stops for indentation width.
const TAB_WIDTH: usize = 4;

/// A token with its exact slice of the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawToken<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Leading whitespace, measured in columns.
    Indent { width: usize },
    /// `>` plus at most one following space.
    BlockquoteMarker,
    /// `-`, `+`, `*`, or `1.` / `1)` plus the spaces that separate it from
    /// the item content.
    ListMarker {
        ordered: bool,
        number: u64,
        delimiter: char,
    },
    /// `#` run plus one separating space or tab.
    AtxHeading { level: u8 },
    ThematicBreak,
    /// Opening or closing run of backticks or tildes.
    CodeFence { fence: char, length: usize },
    /// End of a source line. The final line's token has empty text.
    LineEnding,
    /// Literal text run.
    Text,
    /// Run of `*` or `_`.
    DelimiterRun { delimiter: char },
    Backticks { length: usize },
    OpenBracket,
    /// `![`
    ImageOpen,
    CloseBracket,
    /// Backslash followed by ASCII punctuation.
    Escape,
    /// `<scheme:...>` or `<user@host>`.
    Autolink,
    /// Newline inside a block (optionally preceded by one space).
    SoftBreak,
    /// Two or more spaces, or a backslash, before a newline.
    HardBreak,
}

/// Coarse grouping of [`TokenKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    BlockMarker,
    InlineDelimiter,
    Literal,
    LineBoundary,
}

impl TokenKind {
    pub fn category(self) -> TokenCategory {
        match self {
            TokenKind::Indent { .. }
            | TokenKind::BlockquoteMarker
            | TokenKind::ListMarker { .. }
            | TokenKind::AtxHeading { .. }
            | TokenKind::ThematicBreak
            | TokenKind::CodeFence { .. } => TokenCategory::BlockMarker,
            TokenKind::DelimiterRun { .. }
            | TokenKind::Backticks { .. }
            | TokenKind::OpenBracket
            | TokenKind::ImageOpen
            | TokenKind::CloseBracket => TokenCategory::InlineDelimiter,
            TokenKind::Text | TokenKind::Escape | TokenKind::Autolink => TokenCategory::Literal,
            TokenKind::LineEnding | TokenKind::SoftBreak | TokenKind::HardBreak => {
                TokenCategory::LineBoundary
            }
        }
    }
}

// ------------------------------------------------------------------
// Block scanning
// ------------------------------------------------------------------

/// Scan `source` into block-level tokens.
///
/// Every line produces its prefix markers, exactly one `Text` token (possibly
/// empty) and a `LineEnding`. Offsets are byte offsets into `source`.
pub fn tokenize(source: &str) -> Vec<RawToken<'_>> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    for (idx, line) in source.split('\n').enumerate() {
        scan_line(source, line, idx + 1, offset, &mut tokens);
        offset += line.len() + 1;
    }

    tokens
}

fn scan_line<'a>(
    source: &'a str,
    line: &'a str,
    line_no: usize,
    base: usize,
    tokens: &mut Vec<RawToken<'a>>,
) {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut col = 0;

    let push = move |kind: TokenKind, start: usize, end: usize, tokens: &mut Vec<RawToken<'a>>| {
        tokens.push(RawToken {
            kind,
            text: &line[start..end],
            span: Span {
                start_line: line_no,
                end_line: line_no,
                start_offset: base + start,
                end_offset: base + end,
            },
        });
    };

    // Container prefix: indentation, `>` markers and list markers, repeated.
    loop {
        let ws_start = pos;
        let mut width = 0;
        while pos < len && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            width += if bytes[pos] == b'\t' { TAB_WIDTH - (col + width) % TAB_WIDTH } else { 1 };
            pos += 1;
        }
        if pos > ws_start {
            push(TokenKind::Indent { width }, ws_start, pos, tokens);
            col += width;
        }
        if pos >= len {
            break;
        }

        let rest = &line[pos..];
        if bytes[pos] == b'>' {
            let marker_len = if rest.as_bytes().get(1) == Some(&b' ') { 2 } else { 1 };
            push(TokenKind::BlockquoteMarker, pos, pos + marker_len, tokens);
            pos += marker_len;
            col += marker_len;
            continue;
        }
        if is_thematic_break(rest) {
            break;
        }
        if let Some((kind, marker_len)) = list_marker(rest) {
            push(kind, pos, pos + marker_len, tokens);
            pos += marker_len;
            col += marker_len;
            continue;
        }
        break;
    }

    // Leaf marker.
    if pos < len {
        let rest = &line[pos..];
        if is_thematic_break(rest) {
            push(TokenKind::ThematicBreak, pos, len, tokens);
            pos = len;
        } else if let Some((level, marker_len)) = atx_heading(rest) {
            push(TokenKind::AtxHeading { level }, pos, pos + marker_len, tokens);
            pos += marker_len;
        } else if let Some((fence, length)) = code_fence(rest) {
            push(TokenKind::CodeFence { fence, length }, pos, pos + length, tokens);
            pos += length;
        }
    }

    push(TokenKind::Text, pos, len, tokens);

    let end = (base + len + 1).min(source.len());
    tokens.push(RawToken {
        kind: TokenKind::LineEnding,
        text: &source[base + len..end],
        span: Span {
            start_line: line_no,
            end_line: line_no,
            start_offset: base + len,
            end_offset: end,
        },
    });
}

/// Three or more `-`, `*` or `_` (the same character), optionally separated
/// by spaces or tabs, and nothing else.
fn is_thematic_break(rest: &str) -> bool {
    let trimmed = rest.trim_end();
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 0;
    for c in trimmed.chars() {
        if c == first {
            count += 1;
        } else if c != ' ' && c != '\t' {
            return false;
        }
    }
    count >= 3
}

/// Recognise a bullet or ordered list marker at the start of `rest`.
///
/// Returns the token kind and the marker length in bytes, including the
/// spaces that separate it from the content (all of them when 1-4 follow,
/// one when 5 or more follow, none at end of line or before a tab).
fn list_marker(rest: &str) -> Option<(TokenKind, usize)> {
    let bytes = rest.as_bytes();
    let (kind, marker_end) = match bytes.first()? {
        b'-' | b'+' | b'*' => (
            TokenKind::ListMarker {
                ordered: false,
                number: 0,
                delimiter: bytes[0] as char,
            },
            1,
        ),
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let delimiter = *bytes.get(digits)?;
            if delimiter != b'.' && delimiter != b')' {
                return None;
            }
            let number = rest[..digits].parse::<u64>().ok()?;
            (
                TokenKind::ListMarker {
                    ordered: true,
                    number,
                    delimiter: delimiter as char,
                },
                digits + 1,
            )
        }
        _ => return None,
    };

    match bytes.get(marker_end) {
        None | Some(b'\t') => Some((kind, marker_end)),
        Some(b' ') => {
            let spaces = bytes[marker_end..].iter().take_while(|&&b| b == b' ').count();
            let at_eol = marker_end + spaces == bytes.len();
            let taken = if spaces <= 4 || at_eol { spaces } else { 1 };
            Some((kind, marker_end + taken))
        }
        _ => None,
    }
}

/// `#` to `######` followed by a space, tab or end of line.
///
/// `#Title` is not a heading; it stays paragraph text.
fn atx_heading(rest: &str) -> Option<(u8, usize)> {
    let bytes = rest.as_bytes();
    let hashes = bytes.iter().take_while(|&&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match bytes.get(hashes) {
        None => Some((hashes as u8, hashes)),
        Some(b' ') | Some(b'\t') => Some((hashes as u8, hashes + 1)),
        _ => None,
    }
}

/// Three or more backticks or tildes. A backtick fence's info string may
/// not contain backticks (that line is an inline code span instead).
fn code_fence(rest: &str) -> Option<(char, usize)> {
    let bytes = rest.as_bytes();
    let fence = *bytes.first()?;
    if fence != b'`' && fence != b'~' {
        return None;
    }
    let length = bytes.iter().take_while(|&&b| b == fence).count();
    if length < 3 {
        return None;
    }
    if fence == b'`' && rest[length..].contains('`') {
        return None;
    }
    Some((fence as char, length))
}

// ------------------------------------------------------------------
// Inline scanning
// ------------------------------------------------------------------

/// Scan the text of one leaf block into inline tokens.
///
/// Offsets are byte offsets into `text` and line numbers count from 1 at the
/// start of `text`. Adjacent literal characters are merged into one `Text`
/// token.
pub fn scan_inline(text: &str) -> Vec<RawToken<'_>> {
    let mut scanner = InlineScanner {
        text,
        bytes: text.as_bytes(),
        tokens: Vec::new(),
        literal_start: None,
        line: 1,
    };
    scanner.run();
    scanner.tokens
}

struct InlineScanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    tokens: Vec<RawToken<'a>>,
    literal_start: Option<usize>,
    line: usize,
}

impl<'a> InlineScanner<'a> {
    fn run(&mut self) {
        let len = self.bytes.len();
        let mut pos = 0;

        while pos < len {
            let b = self.bytes[pos];
            let consumed = match b {
                b'\\' => match self.bytes.get(pos + 1).copied() {
                    Some(b'\n') => self.emit(TokenKind::HardBreak, pos, pos + 2),
                    Some(next) if next.is_ascii_punctuation() => {
                        self.emit(TokenKind::Escape, pos, pos + 2)
                    }
                    _ => None,
                },
                b'`' => {
                    let length = self.run_length(pos, b'`');
                    self.emit(TokenKind::Backticks { length }, pos, pos + length)
                }
                b'*' | b'_' => {
                    let length = self.run_length(pos, b);
                    self.emit(
                        TokenKind::DelimiterRun {
                            delimiter: b as char,
                        },
                        pos,
                        pos + length,
                    )
                }
                b'!' if self.bytes.get(pos + 1) == Some(&b'[') => {
                    self.emit(TokenKind::ImageOpen, pos, pos + 2)
                }
                b'[' => self.emit(TokenKind::OpenBracket, pos, pos + 1),
                b']' => self.emit(TokenKind::CloseBracket, pos, pos + 1),
                b'<' => autolink_len(&self.text[pos..])
                    .and_then(|n| self.emit(TokenKind::Autolink, pos, pos + n)),
                b' ' => {
                    let spaces = self.run_length(pos, b' ');
                    match self.bytes.get(pos + spaces).copied() {
                        Some(b'\n') if spaces >= 2 => {
                            self.emit(TokenKind::HardBreak, pos, pos + spaces + 1)
                        }
                        Some(b'\n') => self.emit(TokenKind::SoftBreak, pos, pos + spaces + 1),
                        _ => {
                            // Literal spaces; skip the whole run at once.
                            self.mark_literal(pos);
                            Some(spaces)
                        }
                    }
                }
                b'\n' => self.emit(TokenKind::SoftBreak, pos, pos + 1),
                _ => None,
            };

            match consumed {
                Some(n) => pos += n,
                None => {
                    self.mark_literal(pos);
                    pos += 1;
                }
            }
        }

        self.flush_literal(len);
    }

    fn mark_literal(&mut self, pos: usize) {
        if self.literal_start.is_none() {
            self.literal_start = Some(pos);
        }
    }

    fn run_length(&self, pos: usize, byte: u8) -> usize {
        self.bytes[pos..].iter().take_while(|&&b| b == byte).count()
    }

    /// Push a token for `start..end`, flushing pending literal text first.
    /// Returns the number of bytes consumed.
    fn emit(&mut self, kind: TokenKind, start: usize, end: usize) -> Option<usize> {
        self.flush_literal(start);
        self.tokens.push(RawToken {
            kind,
            text: &self.text[start..end],
            span: Span {
                start_line: self.line,
                end_line: self.line,
                start_offset: start,
                end_offset: end,
            },
        });
        if matches!(kind, TokenKind::SoftBreak | TokenKind::HardBreak) {
            self.line += 1;
        }
        Some(end - start)
    }

    fn flush_literal(&mut self, end: usize) {
        if let Some(start) = self.literal_start.take() {
            if end > start {
                self.tokens.push(RawToken {
                    kind: TokenKind::Text,
                    text: &self.text[start..end],
                    span: Span {
                        start_line: self.line,
                        end_line: self.line,
                        start_offset: start,
                        end_offset: end,
                    },
                });
            }
        }
    }
}

/// Length in bytes of an autolink (`<https://x>` or `<a@b.c>`) at the start
/// of `rest`, brackets included.
fn autolink_len(rest: &str) -> Option<usize> {
    let close = rest.find('>')?;
    let inner = &rest[1..close];
    if inner.is_empty() || inner.contains(|c: char| c.is_whitespace() || c == '<') {
        return None;
    }
    if is_uri(inner) || is_email(inner) {
        Some(close + 1)
    } else {
        None
    }
}

fn is_uri(inner: &str) -> bool {
    let Some(colon) = inner.find(':') else {
        return false;
    };
    let scheme = &inner[..colon];
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn is_email(inner: &str) -> bool {
    let Some((local, domain)) = inner.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c))
        && !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
