//! Error types for the conversion core.
//!
//! Only [`ConfigError`] and [`DiscoveryError`] ever reach the caller as hard
//! failures. Everything that goes wrong while converting one document is a
//! [`TaskError`], which the scheduler turns into data on the task's
//! `ConversionResult`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a format extractor.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The underlying parser rejected the document.
    #[error("{message}")]
    Failed { message: String },

    /// The parser succeeded but produced no text.
    #[error("no text could be extracted")]
    Empty,

    #[error("input file does not exist or is not a regular file: {}", .path.display())]
    InputMissing { path: PathBuf },

    /// Text was recovered through a fallback path with weaker fidelity
    /// guarantees. Whether it is usable is decided by the run's
    /// [`DegradedPolicy`](crate::config::DegradedPolicy).
    #[error("degraded extraction: {cause}")]
    Degraded { text: String, cause: String },
}

impl ExtractionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ExtractionError::Failed {
            message: message.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ExtractionError::Degraded { .. })
    }
}

/// Per-task failure. Never fatal to the batch.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unsupported format: no converter registered for '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("cannot write output {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("converter panicked: {message}")]
    Panicked { message: String },
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            TaskError::Extraction(e) if e.is_degraded() => ErrorKind::Degraded,
            TaskError::Extraction(_) => ErrorKind::Extraction,
            TaskError::OutputWrite { .. } => ErrorKind::OutputWrite,
            TaskError::Panicked { .. } => ErrorKind::Panicked,
        }
    }
}

/// Machine-readable failure category recorded on a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    Extraction,
    Degraded,
    OutputWrite,
    Panicked,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::Extraction => "ExtractionError",
            ErrorKind::Degraded => "DegradedExtraction",
            ErrorKind::OutputWrite => "OutputWriteError",
            ErrorKind::Panicked => "Panicked",
        };
        f.write_str(s)
    }
}

/// Fatal pre-batch failure: no task is attempted.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("input root missing: {}", .root.display())]
    InputRootMissing { root: PathBuf },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_memory_gb must be at least 1 (got {0})")]
    MemoryCeiling(f64),

    #[error("output_extension must be a non-empty extension without separators (got '{0}')")]
    OutputExtension(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("extension '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid extension '{0}'")]
    InvalidExtension(String),
}
