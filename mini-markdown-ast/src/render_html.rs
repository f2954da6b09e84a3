//! HTML fragment renderer.
//!
//! Produces semantic HTML with `{prefix}-*` CSS classes on links, images and
//! code blocks. Every text value and attribute is escaped exactly once, here,
//! at emission time; the tree itself always holds raw source strings.

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;
use crate::escape::{escape_html, is_dangerous_url};
use crate::types::Node;

/// Default CSS class prefix.
pub const DEFAULT_CLASS_PREFIX: &str = "mini-md";

/// Options threaded through every render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Prefix for generated CSS classes, e.g. `mini-md-link`.
    pub class_prefix: String,
    /// Add `target="_blank"` to links.
    pub link_target: bool,
    /// Blank out `javascript:`-style URLs in `href`/`src`.
    pub sanitize_urls: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            class_prefix: DEFAULT_CLASS_PREFIX.to_string(),
            link_target: true,
            sanitize_urls: true,
        }
    }
}

impl RenderOptions {
    /// Default options with a custom class prefix.
    pub fn with_class_prefix(prefix: impl Into<String>) -> Result<Self, OptionsError> {
        let options = Self {
            class_prefix: prefix.into(),
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    /// Check that the class prefix is a usable CSS identifier.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if is_valid_class_prefix(&self.class_prefix) {
            Ok(())
        } else {
            Err(OptionsError::InvalidClassPrefix {
                prefix: self.class_prefix.clone(),
            })
        }
    }
}

/// An ASCII letter followed by letters, digits, `-` or `_`.
pub fn is_valid_class_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Configuration for full-page HTML rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    /// Page title. Falls back to the first heading, then "Document".
    pub title: Option<String>,
    /// Optional language code (default: "en").
    pub lang: Option<String>,
    /// Optional meta description.
    pub description: Option<String>,
}

/// Parse `source` and render it as an HTML fragment.
pub fn render_markdown_to_html(source: &str, options: &RenderOptions) -> String {
    let result = crate::parse::parse(source);
    let html = render(&result.root, options);
    tracing::debug!(
        input_bytes = source.len(),
        output_bytes = html.len(),
        "rendered markdown to html"
    );
    html
}

/// Render a node (normally a `Document`) as an HTML fragment.
///
/// No separators are inserted between blocks and no `<html>`/`<body>`
/// wrapper is added. Equal trees and options always give identical output.
pub fn render(node: &Node, options: &RenderOptions) -> String {
    let ctx = Context {
        options,
        prefix: escape_html(&options.class_prefix),
    };
    let mut out = String::new();
    write_node(node, &ctx, false, &mut out);
    out
}

/// Per-render state shared by every node.
struct Context<'o> {
    options: &'o RenderOptions,
    /// Class prefix, escaped once up front.
    prefix: String,
}

fn write_children(children: &[Node], ctx: &Context<'_>, tight: bool, out: &mut String) {
    for child in children {
        write_node(child, ctx, tight, out);
    }
}

/// `tight` is set only for the direct children of an item in a tight list.
fn write_node(node: &Node, ctx: &Context<'_>, tight: bool, out: &mut String) {
    let prefix = ctx.prefix.as_str();
    match node {
        Node::Document { children } => write_children(children, ctx, false, out),
        Node::Paragraph { children, .. } => {
            if tight {
                write_children(children, ctx, false, out);
            } else {
                out.push_str("<p>");
                write_children(children, ctx, false, out);
                out.push_str("</p>");
            }
        }
        Node::Heading {
            level, children, ..
        } => {
            let level = (*level).clamp(1, 6);
            out.push_str(&format!("<h{level}>"));
            write_children(children, ctx, false, out);
            out.push_str(&format!("</h{level}>"));
        }
        Node::Emphasis { children } => {
            out.push_str("<em>");
            write_children(children, ctx, false, out);
            out.push_str("</em>");
        }
        Node::Strong { children } => {
            out.push_str("<strong>");
            write_children(children, ctx, false, out);
            out.push_str("</strong>");
        }
        Node::Link {
            url,
            title,
            children,
        } => {
            out.push_str(&format!(
                "<a href=\"{}\" class=\"{prefix}-link\"",
                url_attr(url, ctx.options)
            ));
            if ctx.options.link_target {
                out.push_str(" target=\"_blank\"");
            }
            if let Some(title) = title {
                out.push_str(&format!(" title=\"{}\"", escape_html(title)));
            }
            out.push('>');
            write_children(children, ctx, false, out);
            out.push_str("</a>");
        }
        Node::Image { url, title, alt } => {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\" class=\"{prefix}-image\"",
                url_attr(url, ctx.options),
                escape_html(alt)
            ));
            if let Some(title) = title {
                out.push_str(&format!(" title=\"{}\"", escape_html(title)));
            }
            out.push_str(" />");
        }
        Node::CodeInline { value } => {
            out.push_str(&format!("<code>{}</code>", escape_html(value)));
        }
        Node::CodeBlock { lang, value, .. } => {
            out.push_str(&format!("<pre class=\"{prefix}-code-block\">"));
            match lang {
                Some(lang) => {
                    out.push_str(&format!("<code class=\"language-{}\">", escape_html(lang)))
                }
                None => out.push_str("<code>"),
            }
            out.push_str(&escape_html(value));
            out.push_str("</code></pre>");
        }
        Node::List {
            ordered,
            start,
            tight: list_tight,
            children,
            ..
        } => {
            let tag = if *ordered { "ol" } else { "ul" };
            match start {
                Some(n) if *ordered && *n != 1 => out.push_str(&format!("<ol start=\"{n}\">")),
                _ => out.push_str(&format!("<{tag}>")),
            }
            write_children(children, ctx, *list_tight, out);
            out.push_str(&format!("</{tag}>"));
        }
        Node::ListItem { children, .. } => {
            out.push_str("<li>");
            write_children(children, ctx, tight, out);
            out.push_str("</li>");
        }
        Node::Blockquote { children, .. } => {
            out.push_str("<blockquote>");
            write_children(children, ctx, false, out);
            out.push_str("</blockquote>");
        }
        Node::ThematicBreak { .. } => out.push_str("<hr />"),
        Node::LineBreak => out.push_str("<br />"),
        Node::Text { value } => out.push_str(&escape_html(value)),
    }
}

fn url_attr(url: &str, options: &RenderOptions) -> String {
    if options.sanitize_urls && is_dangerous_url(url) {
        tracing::debug!(url, "dropped dangerous url");
        return String::new();
    }
    escape_html(url)
}

/// Plain text of the first heading in the tree, if any.
pub fn first_heading(node: &Node) -> Option<String> {
    match node {
        Node::Heading { .. } => Some(node.plain_text()),
        other => other.children().iter().find_map(first_heading),
    }
}

/// Render a node as a complete standalone HTML page.
///
/// Produces a `<!DOCTYPE html>` document with charset, viewport and generator
/// meta tags and an embedded stylesheet keyed to the class prefix.
pub fn to_html_page(root: &Node, config: &PageConfig, options: &RenderOptions) -> String {
    let body = render(root, options);
    let lang = config.lang.as_deref().unwrap_or("en");

    // Resolve title: explicit config > first heading > fallback
    let title = config
        .title
        .clone()
        .or_else(|| first_heading(root))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Document".to_string());

    let mut meta_extra = String::new();
    if let Some(desc) = &config.description {
        meta_extra.push_str(&format!(
            "\n    <meta name=\"description\" content=\"{}\">",
            escape_html(desc)
        ));
    }

    let prefix = escape_html(&options.class_prefix);
    let css = PAGE_CSS.replace("{prefix}", &prefix);

    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="generator" content="mini-markdown {version}">
    <title>{title}</title>{meta_extra}
    <style>{css}</style>
</head>
<body>
<article class="{prefix}">
{body}
</article>
</body>
</html>"#,
        lang = escape_html(lang),
        version = env!("CARGO_PKG_VERSION"),
        title = escape_html(&title),
        meta_extra = meta_extra,
        css = css,
        prefix = prefix,
        body = body,
    )
}

/// Embedded CSS for standalone pages. `{prefix}` is replaced with the class
/// prefix.
const PAGE_CSS: &str = r#"
:root {
    --bg: #ffffff;
    --bg-code: #f5f5f7;
    --border: #e2e2e8;
    --text: #1d1d24;
    --text-dim: #5a5a6e;
    --accent: #2563eb;
}

*, *::before, *::after { box-sizing: border-box; }
body { margin: 0; background: var(--bg); color: var(--text); font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Oxygen, sans-serif; -webkit-font-smoothing: antialiased; }

/* Layout */
.{prefix} { max-width: 48rem; margin: 0 auto; padding: 2rem 1.5rem 4rem; line-height: 1.7; }

/* Typography */
.{prefix} h1 { font-size: 1.875rem; font-weight: 700; margin: 2rem 0 1rem; letter-spacing: -0.025em; }
.{prefix} h2 { font-size: 1.5rem; font-weight: 600; margin: 1.75rem 0 0.75rem; padding-bottom: 0.5rem; border-bottom: 1px solid var(--border); }
.{prefix} h3 { font-size: 1.25rem; font-weight: 600; margin: 1.5rem 0 0.5rem; }
.{prefix} h4, .{prefix} h5, .{prefix} h6 { font-size: 1.1rem; font-weight: 600; margin: 1.25rem 0 0.5rem; color: var(--text-dim); }
.{prefix} p { margin: 0.75rem 0; }
.{prefix} ul, .{prefix} ol { padding-left: 1.5rem; margin: 0.75rem 0; }
.{prefix} li { margin: 0.25rem 0; }
.{prefix} blockquote { margin: 1rem 0; padding: 0.25rem 1rem; border-left: 3px solid var(--border); color: var(--text-dim); }
.{prefix} hr { border: none; border-top: 1px solid var(--border); margin: 2rem 0; }
.{prefix} code { font-family: "SF Mono", Menlo, Consolas, monospace; font-size: 0.875em; background: var(--bg-code); padding: 0.125rem 0.375rem; border-radius: 4px; }

/* Links and images */
.{prefix}-link { color: var(--accent); text-decoration: none; }
.{prefix}-link:hover { text-decoration: underline; }
.{prefix}-image { max-width: 100%; height: auto; }

/* Code blocks */
.{prefix}-code-block { background: var(--bg-code); border: 1px solid var(--border); border-radius: 8px; padding: 1rem; overflow-x: auto; margin: 1rem 0; }
.{prefix}-code-block code { background: none; padding: 0; font-size: 0.85rem; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::types::Span;
    use pretty_assertions::assert_eq;

    fn html(source: &str) -> String {
        render_markdown_to_html(source, &RenderOptions::default())
    }

    #[test]
    fn empty_input_renders_empty() {
        assert_eq!(html(""), "");
    }

    #[test]
    fn heading() {
        assert_eq!(html("# Title"), "<h1>Title</h1>");
    }

    #[test]
    fn link_in_paragraph() {
        assert_eq!(
            html("Hello [World](https://example.com)"),
            "<p>Hello <a href=\"https://example.com\" class=\"mini-md-link\" target=\"_blank\">World</a></p>"
        );
    }

    #[test]
    fn link_without_target() {
        let options = RenderOptions {
            link_target: false,
            ..RenderOptions::default()
        };
        assert_eq!(
            render_markdown_to_html("[a](/b \"T\")", &options),
            "<p><a href=\"/b\" class=\"mini-md-link\" title=\"T\">a</a></p>"
        );
    }

    #[test]
    fn quote_in_url_is_escaped() {
        let out = html("[bad](java'script:alert(1))");
        assert!(out.contains("href=\"java&#x27;script:alert(1)\""), "got {out}");
        let out = html("[bad](<java\" script>)");
        assert!(out.contains("href=\"java&quot; script\""), "got {out}");
    }

    #[test]
    fn spaced_destination_stays_text() {
        // A bare destination cannot contain a space, so nothing becomes a link
        // and the quote is escaped as text.
        assert_eq!(
            html("[bad](java' script:alert(1))"),
            "<p>[bad](java&#x27; script:alert(1))</p>"
        );
    }

    #[test]
    fn class_prefix_escaped_in_every_attribute() {
        let options = RenderOptions {
            class_prefix: "a\"b".into(),
            ..RenderOptions::default()
        };
        let out = render_markdown_to_html("[x](/u) ![y](/i)\n\n```\nz\n```", &options);
        assert_eq!(out.matches("a&quot;b-").count(), 3, "got {out}");
        assert!(!out.contains("a\"b"));
    }

    #[test]
    fn unclosed_emphasis_is_literal() {
        assert_eq!(html("**un*closed"), "<p>**un*closed</p>");
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(
            html("<script>alert('x')</script> & more"),
            "<p>&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt; &amp; more</p>"
        );
    }

    #[test]
    fn inline_markup() {
        assert_eq!(
            html("*a* **b** `c<d>` e  \nf"),
            "<p><em>a</em> <strong>b</strong> <code>c&lt;d&gt;</code> e<br />f</p>"
        );
    }

    #[test]
    fn code_block_with_language() {
        assert_eq!(
            html("```rust\nfn main() {}\n```"),
            "<pre class=\"mini-md-code-block\"><code class=\"language-rust\">fn main() {}\n</code></pre>"
        );
    }

    #[test]
    fn code_block_without_language() {
        assert_eq!(
            html("```\n<b>\n```"),
            "<pre class=\"mini-md-code-block\"><code>&lt;b&gt;\n</code></pre>"
        );
    }

    #[test]
    fn tight_list_drops_paragraphs() {
        assert_eq!(html("- a\n- b"), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn loose_list_keeps_paragraphs() {
        assert_eq!(
            html("- a\n\n- b"),
            "<ul><li><p>a</p></li><li><p>b</p></li></ul>"
        );
    }

    #[test]
    fn ordered_list_start() {
        assert_eq!(html("1. a\n2. b"), "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(html("3. c"), "<ol start=\"3\"><li>c</li></ol>");
    }

    #[test]
    fn blockquote_and_rule() {
        assert_eq!(
            html("> quote\n\n---"),
            "<blockquote><p>quote</p></blockquote><hr />"
        );
    }

    #[test]
    fn image() {
        assert_eq!(
            html("![a \"cat\"](cat.png 'Cat')"),
            "<p><img src=\"cat.png\" alt=\"a &quot;cat&quot;\" class=\"mini-md-image\" title=\"Cat\" /></p>"
        );
    }

    #[test]
    fn custom_prefix_is_used_everywhere() {
        let options = RenderOptions::with_class_prefix("doc").unwrap();
        let out = render_markdown_to_html("[a](b) ![c](d)\n\n```\nx\n```", &options);
        assert!(out.contains("class=\"doc-link\""));
        assert!(out.contains("class=\"doc-image\""));
        assert!(out.contains("class=\"doc-code-block\""));
        assert!(!out.contains("mini-md"));
    }

    #[test]
    fn dangerous_urls_are_blanked() {
        assert_eq!(
            html("[x](javascript:alert(1))"),
            "<p><a href=\"\" class=\"mini-md-link\" target=\"_blank\">x</a></p>"
        );
        let options = RenderOptions {
            sanitize_urls: false,
            ..RenderOptions::default()
        };
        assert!(render_markdown_to_html("[x](javascript:void)", &options)
            .contains("href=\"javascript:void\""));
    }

    #[test]
    fn sanitization_keeps_ast_url() {
        let result = parse("[x](javascript:alert(1))");
        let link = &result.root.children()[0].children()[0];
        assert!(matches!(link, Node::Link { url, .. } if url == "javascript:alert(1)"));
    }

    #[test]
    fn invalid_prefixes_rejected() {
        for bad in ["", "1abc", "-x", "a b", "a\"b", "ünï"] {
            assert!(RenderOptions::with_class_prefix(bad).is_err(), "{bad:?}");
        }
        for good in ["a", "mini-md", "doc_2"] {
            assert!(RenderOptions::with_class_prefix(good).is_ok(), "{good:?}");
        }
    }

    #[test]
    fn options_deserialize_camel_case_with_defaults() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"classPrefix":"x","linkTarget":false}"#).unwrap();
        assert_eq!(options.class_prefix, "x");
        assert!(!options.link_target);
        assert!(options.sanitize_urls);
    }

    #[test]
    fn rendering_is_deterministic() {
        let source = "# T\n\n- *a*\n- [b][r]\n\n[r]: /r\n\n> q";
        assert_eq!(html(source), html(source));
    }

    #[test]
    fn out_of_range_heading_level_is_clamped() {
        let node = Node::Heading {
            level: 9,
            children: vec![Node::text("x")],
            span: Span::default(),
        };
        assert_eq!(render(&node, &RenderOptions::default()), "<h6>x</h6>");
    }

    #[test]
    fn page_title_fallbacks() {
        let options = RenderOptions::default();
        let doc = parse("Intro\n\n## First *heading*").root;
        let page = to_html_page(&doc, &PageConfig::default(), &options);
        assert!(page.contains("<title>First heading</title>"));

        let config = PageConfig {
            title: Some("A & B".into()),
            lang: Some("fr".into()),
            description: None,
        };
        let page = to_html_page(&doc, &config, &options);
        assert!(page.contains("<title>A &amp; B</title>"));
        assert!(page.contains("<html lang=\"fr\">"));

        let page = to_html_page(&parse("no headings").root, &PageConfig::default(), &options);
        assert!(page.contains("<title>Document</title>"));
    }

    #[test]
    fn page_embeds_prefixed_css() {
        let options = RenderOptions::with_class_prefix("doc").unwrap();
        let page = to_html_page(&parse("x").root, &PageConfig::default(), &options);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(".doc-link {"));
        assert!(page.contains("<article class=\"doc\">"));
        assert!(!page.contains("{prefix}"));
    }
}
