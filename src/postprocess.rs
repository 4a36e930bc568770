use crate::config::Postprocess;
use crate::engine::squeeze_newlines;
use unicode_normalization::UnicodeNormalization;

/// Normalizes extracted text before it is written to disk.
pub fn normalize_text(cfg: &Postprocess, text: &str) -> String {
    let mut out = text.to_string();

    if cfg.normalize_newlines {
        out = out.replace("\r\n", "\n").replace('\r', "\n");
    }

    if cfg.normalize_unicode {
        out = out.nfkc().collect::<String>();
    }

    out = strip_control_chars(&out);

    if cfg.trim_trailing_whitespace {
        out = out
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
    }

    if cfg.collapse_blank_lines {
        out = squeeze_newlines(&out);
    }

    out.trim_matches('\n').to_string()
}

fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| {
            // Keep structural whitespace.
            if ch == '\n' || ch == '\r' || ch == '\t' {
                return true;
            }
            !ch.is_control()
        })
        .collect()
}
