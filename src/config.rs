use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Hard ceiling on parallel workers, regardless of what is configured.
pub const MAX_CONCURRENCY: usize = 10;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: Run,
    #[serde(default)]
    pub postprocess: Postprocess,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Loads `path` when it exists, otherwise falls back to built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }

    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        RunConfig::from_settings(&self.run, &self.postprocess)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Run {
    pub input_folder: String,
    pub output_folder: String,
    pub batch_size: usize,
    pub max_memory_gb: f64,
    pub preserve_structure: bool,
    pub skip_on_error: bool,
    pub overwrite_existing: bool,
    pub output_extension: String,
    pub degraded_policy: DegradedPolicy,
    pub admission_control: bool,
}
impl Default for Run {
    fn default() -> Self {
        Self {
            input_folder: "./input".into(),
            output_folder: "./output".into(),
            batch_size: 10,
            max_memory_gb: 10.0,
            preserve_structure: true,
            skip_on_error: true,
            overwrite_existing: false,
            output_extension: "txt".into(),
            degraded_policy: DegradedPolicy::Reject,
            admission_control: false,
        }
    }
}

/// What to do with text recovered through a fallback extraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedPolicy {
    /// Write the text and count the document as converted.
    Accept,
    /// Write nothing and count the document as failed.
    #[default]
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Postprocess {
    pub normalize_unicode: bool,
    pub normalize_newlines: bool,
    pub trim_trailing_whitespace: bool,
    pub collapse_blank_lines: bool,
}
impl Default for Postprocess {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            normalize_newlines: true,
            trim_trailing_whitespace: true,
            collapse_blank_lines: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
    pub print_report: bool,
    pub show_progress: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "conversion-report.json".into(),
            print_report: true,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub console_level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            console_level: "warn".into(),
            json: false,
            write_to_file: true,
            file_path: "./logs/converter.log".into(),
        }
    }
}

/// Validated, immutable settings for one batch run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    /// Always within `1..=MAX_CONCURRENCY`.
    pub concurrency: usize,
    pub memory_ceiling_bytes: u64,
    pub preserve_structure: bool,
    pub skip_on_error: bool,
    pub overwrite_existing: bool,
    pub output_extension: String,
    pub degraded_policy: DegradedPolicy,
    pub admission_control: bool,
    pub postprocess: Postprocess,
}

impl RunConfig {
    pub fn from_settings(run: &Run, postprocess: &Postprocess) -> Result<Self, ConfigError> {
        if run.max_memory_gb.is_nan() || run.max_memory_gb < 1.0 {
            return Err(ConfigError::MemoryCeiling(run.max_memory_gb));
        }

        let ext = run.output_extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\', '.']) {
            return Err(ConfigError::OutputExtension(run.output_extension.clone()));
        }

        let concurrency = clamp_concurrency(run.batch_size);
        if concurrency != run.batch_size {
            warn!(
                "batch_size {} outside 1..={}; using {}",
                run.batch_size, MAX_CONCURRENCY, concurrency
            );
        }

        Ok(Self {
            input_folder: PathBuf::from(&run.input_folder),
            output_folder: PathBuf::from(&run.output_folder),
            concurrency,
            memory_ceiling_bytes: (run.max_memory_gb * GIB) as u64,
            preserve_structure: run.preserve_structure,
            skip_on_error: run.skip_on_error,
            overwrite_existing: run.overwrite_existing,
            output_extension: ext.to_string(),
            degraded_policy: run.degraded_policy,
            admission_control: run.admission_control,
            postprocess: postprocess.clone(),
        })
    }

    /// Defaults from [`Run`], pointed at the given folders.
    pub fn for_folders(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input_folder: input.into(),
            output_folder: output.into(),
            concurrency: MAX_CONCURRENCY,
            memory_ceiling_bytes: (10.0 * GIB) as u64,
            preserve_structure: true,
            skip_on_error: true,
            overwrite_existing: false,
            output_extension: "txt".into(),
            degraded_policy: DegradedPolicy::Reject,
            admission_control: false,
            postprocess: Postprocess::default(),
        }
    }
}

pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_CONCURRENCY)
}
