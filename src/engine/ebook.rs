//! EPUB and MOBI extractors.

use super::html::html_to_text;
use super::{Extractor, squeeze_newlines};
use crate::error::ExtractionError;
use std::path::Path;
use tracing::{debug, warn};

pub struct EpubExtractor {
    preserve_structure: bool,
}

impl EpubExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for EpubExtractor {
    fn name(&self) -> &'static str {
        "epub"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        use epub::doc::EpubDoc;

        let mut doc = EpubDoc::new(input)
            .map_err(|e| ExtractionError::failed(format!("cannot open EPUB: {e}")))?;

        let mut out = String::new();
        let chapters = doc.get_num_chapters();
        for chapter in 0..chapters {
            doc.set_current_chapter(chapter);
            let Some((content, _mime)) = doc.get_current_str() else {
                debug!("epub chapter {chapter} has no text content in {}", input.display());
                continue;
            };
            let text = html_to_text(&content, self.preserve_structure);
            if text.is_empty() {
                continue;
            }
            out.push_str(&text);
            out.push_str("\n\n");
        }

        Ok(squeeze_newlines(out.trim()))
    }
}

/// MOBI text via the `mobi` crate.
///
/// When the container cannot be parsed, the raw bytes are decoded lossily and
/// returned as [`ExtractionError::Degraded`] so the run policy decides whether
/// that text is kept.
pub struct MobiExtractor {
    preserve_structure: bool,
}

impl MobiExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for MobiExtractor {
    fn name(&self) -> &'static str {
        "mobi"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(input)
            .map_err(|e| ExtractionError::failed(format!("read {}: {e}", input.display())))?;

        match mobi::Mobi::new(bytes.clone()) {
            Ok(book) => {
                let html = book.content_as_string_lossy();
                Ok(html_to_text(&html, self.preserve_structure))
            }
            Err(e) => {
                warn!("mobi parse failed for {}, using raw fallback: {e}", input.display());
                Err(ExtractionError::Degraded {
                    text: raw_fallback(&bytes),
                    cause: format!("MOBI parse failed: {e}"),
                })
            }
        }
    }
}

/// Keeps printable runs from a lossy UTF-8 decode of the raw container.
fn raw_fallback(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let cleaned: String = decoded
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    squeeze_newlines(cleaned.trim())
}
