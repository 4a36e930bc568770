//! Extension → extractor lookup.
//!
//! Lookup is a pure function of the lowercased final extension of a path and
//! never touches the filesystem. Adding a format is a single [`Registry::register`]
//! call; the scheduler does not need to know about it.

use crate::engine::Extractor;
use crate::error::RegistryError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, Arc<dyn Extractor>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(ext, x)| (ext, x.name())))
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every extractor compiled into this build.
    pub fn builtin(preserve_structure: bool) -> Self {
        use crate::engine::{markdown, subtitles};

        let mut reg = Self::new();
        let mut add = |exts: &[&str], x: Arc<dyn Extractor>| {
            for ext in exts {
                reg.insert(ext, Arc::clone(&x));
            }
        };

        #[cfg(feature = "pdf")]
        add(
            &[".pdf"],
            Arc::new(crate::engine::pdf::PdfExtractor::new(preserve_structure)),
        );

        #[cfg(feature = "office")]
        {
            use crate::engine::office::{DocxExtractor, PptxExtractor, XlsxExtractor};
            add(&[".docx"], Arc::new(DocxExtractor));
            add(&[".xlsx"], Arc::new(XlsxExtractor::new(preserve_structure)));
            add(&[".pptx"], Arc::new(PptxExtractor::new(preserve_structure)));
        }

        #[cfg(feature = "html")]
        add(
            &[".html", ".htm"],
            Arc::new(crate::engine::html::HtmlExtractor::new(preserve_structure)),
        );

        #[cfg(feature = "ebook")]
        {
            use crate::engine::ebook::{EpubExtractor, MobiExtractor};
            add(&[".epub"], Arc::new(EpubExtractor::new(preserve_structure)));
            add(&[".mobi"], Arc::new(MobiExtractor::new(preserve_structure)));
        }

        add(
            &[".md", ".markdown"],
            Arc::new(markdown::MarkdownExtractor::new(preserve_structure)),
        );
        add(&[".srt"], Arc::new(subtitles::SrtExtractor::new(preserve_structure)));
        add(&[".vtt"], Arc::new(subtitles::VttExtractor::new(preserve_structure)));

        reg
    }

    /// Registers `extractor` for `extension` (`"pdf"` or `".PDF"` both work).
    pub fn register(
        &mut self,
        extension: &str,
        extractor: Arc<dyn Extractor>,
    ) -> Result<(), RegistryError> {
        let key = normalize_extension(extension)
            .ok_or_else(|| RegistryError::InvalidExtension(extension.to_string()))?;
        if self.entries.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }
        self.entries.insert(key, extractor);
        Ok(())
    }

    fn insert(&mut self, extension: &str, extractor: Arc<dyn Extractor>) {
        self.entries.insert(extension.to_string(), extractor);
    }

    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn Extractor>> {
        let key = extension_of(path)?;
        self.entries.get(&key).cloned()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|k| self.entries.contains_key(&k))
    }

    pub fn supported_extensions(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercased extension with a leading dot, e.g. `".pdf"`.
pub fn extension_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains(['.', '/', '\\']) || ext.contains(char::is_whitespace) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
