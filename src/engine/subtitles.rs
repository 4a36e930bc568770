//! SubRip (`.srt`) and WebVTT (`.vtt`) cue text.

use super::{Extractor, read_lossy};
use crate::error::ExtractionError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static BLOCK_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex"));
static SRT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}:\d{2}:\d{2},\d{3}\s*-->\s*\d{2}:\d{2}:\d{2},\d{3}").expect("static regex")
});
static VTT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}:)?\d{2}:\d{2}\.\d{3}\s*-->\s*(\d{2}:)?\d{2}:\d{2}\.\d{3}")
        .expect("static regex")
});
static CUE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("static regex"));
static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"));
static INLINE_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\d{2}:)?\d{2}:\d{2}\.\d{3}>").expect("static regex"));
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

pub struct SrtExtractor {
    preserve_structure: bool,
}

impl SrtExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for SrtExtractor {
    fn name(&self) -> &'static str {
        "srt"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        Ok(srt_to_text(&read_lossy(input)?, self.preserve_structure))
    }
}

pub struct VttExtractor {
    preserve_structure: bool,
}

impl VttExtractor {
    pub fn new(preserve_structure: bool) -> Self {
        Self { preserve_structure }
    }
}

impl Extractor for VttExtractor {
    fn name(&self) -> &'static str {
        "vtt"
    }

    fn extract(&self, input: &Path) -> Result<String, ExtractionError> {
        Ok(vtt_to_text(&read_lossy(input)?, self.preserve_structure))
    }
}

fn strip_tags(text: &str) -> String {
    let text = BREAK_TAG.replace_all(text, " ");
    let text = INLINE_TIMESTAMP.replace_all(&text, "");
    ANY_TAG.replace_all(&text, "").trim().to_string()
}

pub fn srt_to_text(content: &str, preserve_structure: bool) -> String {
    let content = content.replace("\r\n", "\n");
    let mut out = String::new();

    for block in BLOCK_SPLIT.split(content.trim()) {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.len() < 2 {
            continue;
        }

        let Some(ts_idx) = lines.iter().position(|l| SRT_TIMESTAMP.is_match(l)) else {
            continue;
        };
        let body = strip_tags(&lines[ts_idx + 1..].join(" "));
        if body.is_empty() {
            continue;
        }

        if preserve_structure {
            out.push_str(&format!("[{}]\n", lines[ts_idx].trim()));
        }
        out.push_str(&body);
        out.push_str("\n\n");
    }

    out.trim().to_string()
}

pub fn vtt_to_text(content: &str, preserve_structure: bool) -> String {
    let content = content.replace("\r\n", "\n");
    let mut out = String::new();
    let mut timestamp: Option<&str> = None;
    let mut cue: Vec<String> = Vec::new();
    let mut in_note = false;

    let flush = |out: &mut String, timestamp: Option<&str>, cue: &mut Vec<String>| {
        if cue.is_empty() {
            return;
        }
        match timestamp {
            Some(ts) if preserve_structure => {
                out.push_str(&format!("[{ts}]\n"));
                out.push_str(&cue.join(" "));
                out.push_str("\n\n");
            }
            _ => {
                out.push_str(&cue.join(" "));
                out.push('\n');
            }
        }
        cue.clear();
    };

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() {
            in_note = false;
            continue;
        }
        if in_note {
            continue;
        }
        if line.starts_with("WEBVTT") {
            continue;
        }
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            in_note = true;
            continue;
        }
        if VTT_TIMESTAMP.is_match(line) {
            flush(&mut out, timestamp, &mut cue);
            timestamp = Some(line);
            continue;
        }
        if CUE_ID.is_match(line) {
            continue;
        }

        let clean = strip_tags(line);
        if !clean.is_empty() {
            cue.push(clean);
        }
    }
    flush(&mut out, timestamp, &mut cue);

    out.trim().to_string()
}
