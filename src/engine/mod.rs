//! Format-specific text extractors.
//!
//! Each extractor is a thin wrapper around a third-party parser. They carry
//! no mutable state, so a single instance is shared by every worker.

#[cfg(feature = "ebook")]
pub mod ebook;
#[cfg(feature = "html")]
pub mod html;
pub mod markdown;
#[cfg(feature = "office")]
pub mod office;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod subtitles;

use crate::error::ExtractionError;
use std::path::Path;

/// Extract plain text from one document.
pub trait Extractor: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &'static str;

    fn extract(&self, input: &Path) -> Result<String, ExtractionError>;
}

/// Reads a text-based document, replacing invalid UTF-8 instead of failing.
pub(crate) fn read_lossy(input: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(input)
        .map_err(|e| ExtractionError::failed(format!("read {}: {e}", input.display())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `====` banner used to mark pages, sheets and slides when structure is kept.
pub(crate) fn banner(title: &str) -> String {
    let rule = "=".repeat(60);
    format!("\n{rule}\n{title}\n{rule}\n\n")
}

/// Collapses runs of three or more newlines to a single blank line.
pub(crate) fn squeeze_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = 0;
    for ch in s.chars() {
        if ch == '\n' {
            run += 1;
            if run > 2 {
                continue;
            }
        } else {
            run = 0;
        }
        out.push(ch);
    }
    out
}
