use super::{Extractor, read_lossy, squeeze_newlines};
use crate::error::ExtractionError;
use html2text::render::text_renderer::TrivialDecorator;
use std::path::Path;

const WRAP_WIDTH: usize = 100;
const NO_WRAP_WIDTH: usize = 10_000;

/// HTML text via `html2text`.
pub struct HtmlExtractor {
    preserve_structure: bool,
}

impl HtmlExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        let html = read_lossy(input)?;
        Ok(html_to_text(&html, self.preserve_structure))
    }
}

/// Renders headings, lists and tables with markdown-like decorations when
/// structure is kept; otherwise emits bare text.
pub fn html_to_text(html: &str, preserve_structure: bool) -> String {
    let text = if preserve_structure {
        html2text::from_read(html.as_bytes(), WRAP_WIDTH)
    } else {
        html2text::from_read_with_decorator(html.as_bytes(), NO_WRAP_WIDTH, TrivialDecorator::new())
    };
    squeeze_newlines(&text).trim().to_string()
}
