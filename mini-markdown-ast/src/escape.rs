//! HTML escaping and URL sanitization.

/// Escape text for HTML element content and attribute values.
///
/// Escapes `&`, `<`, `>`, `"` and `'`. Applying it twice is not idempotent:
/// the second pass escapes the ampersands of the first.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Image media types allowed in `data:` URLs.
const SAFE_DATA_IMAGES: &[&str] = &[
    "data:image/png",
    "data:image/gif",
    "data:image/jpeg",
    "data:image/webp",
];

/// Whether `url` uses a scheme that can run script or read local files.
///
/// Matches `javascript:`, `vbscript:`, `file:` and `data:` other than raster
/// images, case-insensitively and ignoring leading whitespace and control
/// characters.
pub fn is_dangerous_url(url: &str) -> bool {
    let trimmed = url.trim_start_matches(|c: char| c.is_whitespace() || c.is_control());
    // Browsers drop embedded tabs and newlines inside the scheme.
    let normalized: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .take(32)
        .collect::<String>()
        .to_ascii_lowercase();

    if normalized.starts_with("javascript:")
        || normalized.starts_with("vbscript:")
        || normalized.starts_with("file:")
    {
        return true;
    }
    normalized.starts_with("data:") && !SAFE_DATA_IMAGES.iter().any(|p| normalized.starts_with(p))
}
