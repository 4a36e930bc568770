use super::{Extractor, read_lossy, squeeze_newlines};
use crate::error::ExtractionError;
use pulldown_cmark::{Event, Parser, TagEnd};
use std::path::Path;

/// Markdown is already text: keep it verbatim when structure is preserved,
/// otherwise strip the markup with `pulldown-cmark`.
pub struct MarkdownExtractor {
    preserve_structure: bool,
}

impl MarkdownExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for MarkdownExtractor {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        let md = read_lossy(input)?;
        if self.preserve_structure {
            Ok(md.trim().to_string())
        } else {
            Ok(markdown_to_plain(&md))
        }
    }
}

pub fn markdown_to_plain(md: &str) -> String {
    let mut out = String::with_capacity(md.len());
    for event in Parser::new(md) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => out.push('\n'),
            _ => {}
        }
    }
    squeeze_newlines(out.trim())
}
