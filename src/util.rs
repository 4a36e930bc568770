use crate::config::Config;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Creates `dir` and its parents; an existing directory is fine.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))
}

/// SHA-256 of the effective configuration, as lowercase hex.
///
/// Two runs with the same fingerprint used identical settings, CLI overrides
/// included.
pub fn config_fingerprint(cfg: &Config) -> String {
    let digest = Sha256::digest(cfg.normalized_for_hash().as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

pub fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

pub fn now_rfc3339() -> String {
    rfc3339(OffsetDateTime::now_utc())
}

/// Byte count as `12.34GB`.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}
