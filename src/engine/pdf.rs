use super::{Extractor, banner};
use crate::error::ExtractionError;
use std::path::Path;

/// PDF text via `pdf-extract`.
pub struct PdfExtractor {
    preserve_structure: bool,
}

impl PdfExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        let raw = pdf_extract::extract_text(input)
            .map_err(|e| ExtractionError::failed(format!("PDF extraction failed: {e}")))?;
        Ok(layout_pages(&raw, self.preserve_structure))
    }
}

/// pdf-extract separates pages with form feeds; keep them as banners when
/// structure is preserved, otherwise just blank lines.
fn layout_pages(raw: &str, preserve_structure: bool) -> String {
    let pages: Vec<&str> = raw
        .split('\u{c}')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if preserve_structure && pages.len() > 1 {
            out.push_str(&banner(&format!("Page {}", i + 1)));
        }
        out.push_str(page);
        out.push_str("\n\n");
    }
    out.trim().to_string()
}
