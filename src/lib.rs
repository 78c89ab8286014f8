/// A PEG-based Markdown to HTML converter with peg-markdown's extensions
mod ast;
mod footnotes;
mod matcher;
pub mod options;
mod parser;
mod renderer;
mod smart;

pub use options::{Extension, Options, OptionsError};

use parser::Parser;
use renderer::HtmlRenderer;

/// Render Markdown text to an HTML fragment with the given extensions.
///
/// Rendering never fails; malformed Markdown degrades to literal text.
pub fn render(text: &str, options: &Options) -> String {
    let span = tracing::debug_span!("render", len = text.len());
    let _enter = span.enter();
    let ast = Parser::new(options).parse(text);
    let html = HtmlRenderer::new(options).render(&ast);
    tracing::debug!(html_len = html.len(), "rendered");
    html
}

/// Parse markdown text and render to HTML with every extension disabled
pub fn markdown_to_html(markdown: &str) -> String {
    render(markdown, &Options::default())
}
