use crate::error::DiscoveryError;
use crate::registry::Registry;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{Span, debug, info, warn};
use walkdir::WalkDir;

/// One conversion unit: read `input_path`, write text to `output_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Walks an input tree and pairs every supported document with its output.
pub struct Discovery<'a> {
    registry: &'a Registry,
    output_extension: String,
    span: Span,
}

impl<'a> Discovery<'a> {
    pub fn new(registry: &'a Registry, span: Span) -> Self {
        Self {
            registry,
            output_extension: "txt".into(),
            span,
        }
    }

    pub fn with_output_extension(mut self, ext: &str) -> Self {
        self.output_extension = ext.trim_start_matches('.').to_string();
        self
    }

    /// Tasks sorted by input path.
    ///
    /// Files without a registered extractor are ignored. Files whose output
    /// already exists are skipped unless `overwrite_existing` is set.
    pub fn discover(
        &self,
        root: &Path,
        output_root: &Path,
        overwrite_existing: bool,
    ) -> Result<Vec<Task>, DiscoveryError> {
        if !root.is_dir() {
            return Err(DiscoveryError::InputRootMissing {
                root: root.to_path_buf(),
            });
        }

        let mut tasks = Vec::new();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(parent: &self.span, "walk error under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let input = entry.path();
            if !self.registry.is_supported(input) {
                debug!(parent: &self.span, "unsupported, ignoring: {}", input.display());
                continue;
            }

            let Ok(relative) = input.strip_prefix(root) else {
                continue;
            };
            let mut output = output_root
                .join(relative)
                .with_extension(&self.output_extension);

            // `a.pdf` and `a.docx` would both land on `a.txt`; later ones keep
            // their source extension so no two tasks share an output.
            if claimed.contains(&output) {
                let mut name = relative.as_os_str().to_os_string();
                name.push(".");
                name.push(&self.output_extension);
                let renamed = output_root.join(name);
                warn!(
                    parent: &self.span,
                    "output {} already claimed; writing {} instead",
                    output.display(),
                    renamed.display()
                );
                output = renamed;
            }
            claimed.insert(output.clone());

            if output.exists() && !overwrite_existing {
                info!(
                    parent: &self.span,
                    event = "discovery_skipped",
                    output = %output.display(),
                    "skipping existing file: {}",
                    output.display()
                );
                skipped += 1;
                continue;
            }

            tasks.push(Task {
                input_path: input.to_path_buf(),
                output_path: output,
            });
        }

        tasks.sort_by(|a, b| a.input_path.cmp(&b.input_path));
        info!(
            parent: &self.span,
            discovered = tasks.len(),
            skipped,
            "discovered {} documents to convert",
            tasks.len()
        );
        Ok(tasks)
    }
}
