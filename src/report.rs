use crate::monitor::MemoryStatus;
use crate::scheduler::ConversionResult;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const RULE_WIDTH: usize = 60;

/// Success/failure partition of a batch, each side in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub successful: Vec<ConversionResult>,
    pub failed: Vec<ConversionResult>,
}

impl Report {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Fraction in `0.0..=1.0`; `None` for an empty batch.
    pub fn success_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.successful.len() as f64 / total as f64),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub fn aggregate(results: impl IntoIterator<Item = ConversionResult>) -> Report {
    let (successful, failed) = results.into_iter().partition(|r| r.success);
    Report { successful, failed }
}

/// Human-readable summary. Failed tasks appear in the order they sit in
/// `report.failed`.
pub fn render(report: &Report) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let rate = match report.success_rate() {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "N/A".to_string(),
    };

    let mut lines = vec![
        String::new(),
        rule.clone(),
        "CONVERSION REPORT".to_string(),
        rule.clone(),
        format!("Total documents: {}", report.total()),
        format!("Successful: {}", report.successful.len()),
        format!("Failed: {}", report.failed.len()),
        format!("Success rate: {rate}"),
        rule.clone(),
    ];

    if !report.failed.is_empty() {
        lines.push(String::new());
        lines.push("Failed conversions:".to_string());
        for r in &report.failed {
            lines.push(format!("  ✗ {}", r.input_path.display()));
            if let Some(err) = &r.error {
                lines.push(format!("    Error: {err}"));
            }
        }
    }

    let degraded = report.successful.iter().filter(|r| r.degraded).count();
    if !report.successful.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Successfully converted {} documents",
            report.successful.len()
        ));
        if degraded > 0 {
            lines.push(format!("  ({degraded} from degraded extraction)"));
        }
    }

    lines.push(rule);
    lines.push(String::new());
    lines.join("\n")
}

/// On-disk record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub config_sha256: String,
    pub started: String,
    pub finished: String,
    pub input_folder: String,
    pub output_folder: String,
    pub concurrency: usize,
    pub memory_before: MemoryStatus,
    pub memory_after: MemoryStatus,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub success_rate: Option<f64>,
    pub results: Vec<ConversionResult>,
}

impl RunReport {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            crate::util::ensure_dir(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).with_context(|| format!("write report: {}", path.display()))
    }
}
