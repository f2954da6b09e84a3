//! WASM bindings for `mini-markdown-ast`.
//!
//! Exposes the Markdown pipeline to JavaScript via wasm-bindgen.
//! Call `renderMarkdownToHtml()` for an HTML fragment, or `parse()` to get
//! the JSON AST.

use mini_markdown_ast::{PageConfig, RenderOptions};
use wasm_bindgen::prelude::*;

/// Decode an optional JS options object. `undefined` and `null` give the
/// defaults; missing fields take their defaults too.
fn decode_options(options: JsValue) -> Result<RenderOptions, JsError> {
    if options.is_undefined() || options.is_null() {
        return Ok(RenderOptions::default());
    }
    let options: RenderOptions = serde_wasm_bindgen::from_value(options)
        .map_err(|e| JsError::new(&format!("Invalid render options: {e}")))?;
    options.validate()?;
    Ok(options)
}

/// Parse a Markdown string and return a sanitized HTML fragment.
///
/// `options` is an optional `{ classPrefix, linkTarget, sanitizeUrls }`
/// object. An invalid class prefix throws.
#[wasm_bindgen(js_name = renderMarkdownToHtml)]
pub fn render_markdown_to_html(source: &str, options: JsValue) -> Result<String, JsError> {
    let options = decode_options(options)?;
    Ok(mini_markdown_ast::render_markdown_to_html(source, &options))
}

/// Parse a Markdown string and return the document as a JSON AST.
///
/// Returns a JSON object with `{ root, diagnostics }`. Nodes are tagged by
/// `kind` (`"heading"`, `"code-block"`, ...).
#[wasm_bindgen]
pub fn parse(source: &str) -> String {
    let result = mini_markdown_ast::parse(source);
    serde_json::json!({
        "root": result.root,
        "diagnostics": result.diagnostics,
    })
    .to_string()
}

/// Parse a Markdown string and return a complete styled HTML page.
///
/// The title falls back to the first heading. The result is a standalone
/// page that can be displayed in an iframe or written to a file.
#[wasm_bindgen(js_name = renderHtmlPage)]
pub fn render_html_page(source: &str, title: Option<String>) -> String {
    let result = mini_markdown_ast::parse(source);
    let config = PageConfig {
        title,
        ..Default::default()
    };
    result.root.to_html_page(&config, &RenderOptions::default())
}

/// Parse a Markdown string and return all diagnostics as JSON.
///
/// Returns a JSON array of `{ severity, message, span, code }` objects.
/// An empty array means nothing was reported.
#[wasm_bindgen]
pub fn validate(source: &str) -> String {
    let result = mini_markdown_ast::parse(source);
    serde_json::to_string(&result.all_diagnostics()).unwrap_or_else(|_| "[]".to_string())
}
