//! `mini-markdown-ast`: Markdown tokenizer, typed AST and HTML renderer.
//!
//! The pipeline is raw text → [`tokenizer`] → [`parse`] → [`Node`] tree →
//! [`render_html`]. Parsing never fails: markup that does not resolve stays
//! literal text, and problems worth reporting (an unclosed fence, an
//! unresolved reference) come back as non-fatal [`Diagnostic`]s.
//!
//! # Quick start
//!
//! ```
//! use mini_markdown_ast::RenderOptions;
//!
//! let result = mini_markdown_ast::parse("# Hello\n\nSee [docs][d].\n\n[d]: https://example.com\n");
//! assert!(result.diagnostics.is_empty());
//! assert_eq!(result.root.children().len(), 2);
//!
//! let html = result.root.to_html(&RenderOptions::default());
//! assert!(html.starts_with("<h1>Hello</h1>"));
//! ```

pub mod error;
pub mod escape;
pub mod inline;
pub mod parse;
pub mod refs;
pub mod render_html;
#[cfg(feature = "terminal")]
pub mod render_term;
pub mod tokenizer;
pub mod types;
pub mod validate;

pub use error::*;
pub use escape::{escape_html, is_dangerous_url};
pub use parse::{ParseResult, parse, parse_tokens};
pub use refs::Definitions;
pub use types::*;

pub use render_html::{PageConfig, RenderOptions, render_markdown_to_html};

impl Node {
    /// Render this tree as an HTML fragment.
    pub fn to_html(&self, options: &RenderOptions) -> String {
        render_html::render(self, options)
    }

    /// Render this tree as a complete HTML page.
    pub fn to_html_page(&self, config: &PageConfig, options: &RenderOptions) -> String {
        render_html::to_html_page(self, config, options)
    }

    /// Render this tree as ANSI-colored terminal text.
    #[cfg(feature = "terminal")]
    pub fn to_terminal(&self) -> String {
        render_term::to_terminal(self)
    }

    /// Dump this tree as an indented, colored outline.
    #[cfg(feature = "terminal")]
    pub fn to_tree(&self) -> String {
        render_term::to_tree(self)
    }

    /// Validate this tree and return any diagnostics.
    pub fn validate(&self) -> Vec<Diagnostic> {
        validate::validate(self)
    }
}

impl ParseResult {
    /// Parse diagnostics followed by validation diagnostics for the tree.
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        let mut all = self.diagnostics.clone();
        all.extend(self.root.validate());
        all
    }

    /// Whether any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.all_diagnostics()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}
