//! DOCX, XLSX and PPTX extractors.

use super::{Extractor, banner};
use crate::error::ExtractionError;
use std::path::Path;
use tracing::warn;

pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        let text = docx_lite::extract_text(input)
            .map_err(|e| ExtractionError::failed(format!("DOCX extraction failed: {e}")))?;
        Ok(text.trim().to_string())
    }
}

pub struct XlsxExtractor {
    preserve_structure: bool,
}

impl XlsxExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for XlsxExtractor {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        use calamine::{Data, Reader, open_workbook_auto};

        let mut workbook = open_workbook_auto(input)
            .map_err(|e| ExtractionError::failed(format!("cannot open workbook: {e}")))?;

        let separator = if self.preserve_structure { " | " } else { " " };
        let mut out = String::new();

        for sheet_name in workbook.sheet_names().to_vec() {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("skipping unreadable sheet '{sheet_name}' in {}: {e}", input.display());
                    continue;
                }
            };

            if self.preserve_structure {
                out.push_str(&banner(&format!("Sheet: {sheet_name}")));
            }

            for row in range.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        Data::Empty => String::new(),
                        other => other.to_string(),
                    })
                    .collect();

                if cells.iter().all(|c| c.trim().is_empty()) {
                    continue;
                }
                out.push_str(&cells.join(separator));
                out.push('\n');
            }
            out.push('\n');
        }

        Ok(out.trim().to_string())
    }
}

pub struct PptxExtractor {
    preserve_structure: bool,
}

impl PptxExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for PptxExtractor {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        use pptx_to_md::{ParserConfig, PptxContainer};

        let config = ParserConfig::builder()
            .extract_images(false)
            .include_slide_comment(false)
            .build();

        let mut container = PptxContainer::open(input, config)
            .map_err(|e| ExtractionError::failed(format!("cannot open presentation: {e}")))?;
        let slides = container
            .parse_all()
            .map_err(|e| ExtractionError::failed(format!("cannot parse slides: {e}")))?;

        let mut out = String::new();
        for (i, slide) in slides.into_iter().enumerate() {
            let Some(md) = slide.convert_to_md() else {
                continue;
            };
            if md.trim().is_empty() {
                continue;
            }
            if self.preserve_structure {
                out.push_str(&banner(&format!("Slide {}", i + 1)));
            }
            out.push_str(md.trim());
            out.push_str("\n\n");
        }

        Ok(out.trim().to_string())
    }
}
