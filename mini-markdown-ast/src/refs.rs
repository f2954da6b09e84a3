//! Link reference definitions.
//!
//! `[label]: url "title"` lines at the start of a paragraph are collected into
//! a [`Definitions`] side table keyed by normalized label. Inline resolution
//! looks labels up there; the tree never stores pointers back into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{LinkDefinition, Span};

/// Labels longer than this are not labels.
const MAX_LABEL_LEN: usize = 999;

/// Normalize a link label for lookup: trim, collapse internal whitespace to
/// one space, lowercase.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Side table of link reference definitions, keyed by normalized label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definitions {
    entries: BTreeMap<String, LinkDefinition>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. The first definition of a label wins; returns
    /// `false` when `def` was a duplicate and was dropped.
    pub fn insert(&mut self, def: LinkDefinition) -> bool {
        let key = normalize_label(&def.label);
        if key.is_empty() || self.entries.contains_key(&key) {
            return false;
        }
        tracing::trace!(label = %key, url = %def.url, "registered link definition");
        self.entries.insert(key, def);
        true
    }

    /// Look up a label as written in the source.
    pub fn get(&self, label: &str) -> Option<&LinkDefinition> {
        self.entries.get(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions in normalized-label order.
    pub fn iter(&self) -> impl Iterator<Item = &LinkDefinition> {
        self.entries.values()
    }
}

/// Try to read one link reference definition from the start of `text`.
///
/// Returns the definition (with a zeroed span, the caller knows the
/// position) and the number of bytes consumed, including the trailing newline.
pub(crate) fn parse_definition(text: &str) -> Option<(LinkDefinition, usize)> {
    let label_len = label_end(text)?;
    let label = &text[1..label_len - 1];
    if label.trim().is_empty() {
        return None;
    }

    let bytes = text.as_bytes();
    if bytes.get(label_len) != Some(&b':') {
        return None;
    }
    let mut pos = label_len + 1;
    pos += skip_whitespace(&text[pos..], true);

    let (url, dest_len) = parse_destination(&text[pos..], true)?;
    pos += dest_len;

    // Optional title, separated from the destination by whitespace.
    let sep = skip_whitespace(&text[pos..], true);
    if sep > 0 {
        if let Some((title, title_len)) = parse_title(&text[pos + sep..]) {
            let end = pos + sep + title_len;
            if let Some(line_rest) = rest_of_line_blank(&text[end..]) {
                let def = LinkDefinition {
                    label: label.to_string(),
                    url,
                    title: Some(title),
                    span: Span::default(),
                };
                return Some((def, end + line_rest));
            }
        }
    }

    let line_rest = rest_of_line_blank(&text[pos..])?;
    let def = LinkDefinition {
        label: label.to_string(),
        url,
        title: None,
        span: Span::default(),
    };
    Some((def, pos + line_rest))
}

/// Byte length of a `[label]` at the start of `text`, brackets included.
///
/// Labels may not contain unescaped brackets.
pub(crate) fn label_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'[') {
        return None;
    }
    let mut pos = 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' if pos + 1 < bytes.len() => pos += 2,
            b'[' => return None,
            b']' => {
                return if pos - 1 <= MAX_LABEL_LEN { Some(pos + 1) } else { None };
            }
            _ => pos += 1,
        }
    }
    None
}

/// Parse a link destination at the start of `text`.
///
/// Either `<...>` (no newlines, may be empty) or a run without whitespace or
/// control characters whose parentheses balance. `allow_empty` admits `<>`.
pub(crate) fn parse_destination(text: &str, allow_empty: bool) -> Option<(String, usize)> {
    let bytes = text.as_bytes();

    if bytes.first() == Some(&b'<') {
        let mut pos = 1;
        while pos < bytes.len() {
            match bytes[pos] {
                b'\\' if pos + 1 < bytes.len() && bytes[pos + 1].is_ascii_punctuation() => pos += 2,
                b'\n' | b'<' => return None,
                b'>' => {
                    let inner = &text[1..pos];
                    if inner.is_empty() && !allow_empty {
                        return None;
                    }
                    return Some((unescape(inner), pos + 1));
                }
                _ => pos += 1,
            }
        }
        return None;
    }

    let mut pos = 0;
    let mut depth = 0usize;
    while pos < bytes.len() {
        let b = bytes[pos];
        match b {
            b'\\' if pos + 1 < bytes.len() && bytes[pos + 1].is_ascii_punctuation() => {
                pos += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' if depth == 0 => break,
            b')' => depth -= 1,
            _ if b.is_ascii_whitespace() || b.is_ascii_control() => break,
            _ => {}
        }
        pos += 1;
    }

    if depth != 0 || pos == 0 {
        return None;
    }
    Some((unescape(&text[..pos]), pos))
}

/// Parse a `"title"`, `'title'` or `(title)` at the start of `text`.
pub(crate) fn parse_title(text: &str) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let close = match bytes.first()? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut pos = 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' if pos + 1 < bytes.len() && bytes[pos + 1].is_ascii_punctuation() => pos += 2,
            b'(' if close == b')' => return None,
            b if b == close => return Some((unescape(&text[1..pos]), pos + 1)),
            _ => pos += 1,
        }
    }
    None
}

/// Number of leading spaces/tabs, plus at most one newline and the spaces
/// after it when `cross_line` is set.
pub(crate) fn skip_whitespace(text: &str, cross_line: bool) -> usize {
    let bytes = text.as_bytes();
    let mut pos = bytes.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    if cross_line && bytes.get(pos) == Some(&b'\n') {
        pos += 1;
        pos += bytes[pos..].iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    }
    pos
}

/// If the rest of the current line is blank, return its length including the
/// newline.
fn rest_of_line_blank(text: &str) -> Option<usize> {
    let line_len = text.find('\n').map_or(text.len(), |i| i + 1);
    text[..line_len].trim().is_empty().then_some(line_len)
}

/// Resolve backslash escapes of ASCII punctuation.
pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_punctuation() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn def(label: &str, url: &str) -> LinkDefinition {
        LinkDefinition {
            label: label.into(),
            url: url.into(),
            title: None,
            span: Span::default(),
        }
    }

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(normalize_label("  Foo \n  BAR\tbaz "), "foo bar baz");
    }

    #[test]
    fn first_definition_wins() {
        let mut defs = Definitions::new();
        assert!(defs.insert(def("Rust", "https://rust-lang.org")));
        assert!(!defs.insert(def("rust", "https://example.com")));
        assert_eq!(defs.len(), 1);
        assert_eq!(defs.get("  RUST ").unwrap().url, "https://rust-lang.org");
    }

    #[test]
    fn parse_simple_definition() {
        let (def, used) = parse_definition("[foo]: /url \"Title\"\nrest").unwrap();
        assert_eq!(def.label, "foo");
        assert_eq!(def.url, "/url");
        assert_eq!(def.title.as_deref(), Some("Title"));
        assert_eq!(used, 20);
    }

    #[test]
    fn parse_definition_with_angle_destination() {
        let (def, _) = parse_definition("[a b]: <my url>").unwrap();
        assert_eq!(def.url, "my url");
        assert!(def.title.is_none());
    }

    #[test]
    fn definition_title_on_next_line() {
        let (def, used) = parse_definition("[x]: /u\n  'T'\n").unwrap();
        assert_eq!(def.title.as_deref(), Some("T"));
        assert_eq!(used, 14);
    }

    #[test]
    fn trailing_junk_rejects_definition() {
        assert!(parse_definition("[x]: /u junk").is_none());
        assert!(parse_definition("[x] /u").is_none());
        assert!(parse_definition("[]: /u").is_none());
        assert!(parse_definition("[x]:").is_none());
    }

    #[test]
    fn destination_balances_parens() {
        assert_eq!(parse_destination("a(b)c) x", false), Some(("a(b)c".to_string(), 5)));
        assert_eq!(parse_destination("a(b", false), None);
        assert_eq!(parse_destination("\\(x", false), Some(("(x".to_string(), 3)));
        assert_eq!(parse_destination("<>", false), None);
        assert_eq!(parse_destination("<>", true), Some((String::new(), 2)));
    }

    #[test]
    fn title_forms() {
        assert_eq!(parse_title("\"a \\\" b\" rest"), Some(("a \" b".to_string(), 8)));
        assert_eq!(parse_title("'x'"), Some(("x".to_string(), 3)));
        assert_eq!(parse_title("(x)"), Some(("x".to_string(), 3)));
        assert_eq!(parse_title("(x(y)"), None);
        assert_eq!(parse_title("\"open"), None);
    }
}
