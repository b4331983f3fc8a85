//! Field validation and sanitization applied before anything is persisted.
//!
//! Over-length input is rejected, never truncated.

use std::path::Path;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::{Error, Result};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_COMMENT_LEN: usize = 2000;
pub const MAX_CHECKLIST_TEXT_LEN: usize = 200;
pub const MAX_REASON_LEN: usize = 500;
pub const MAX_AUTHOR_LEN: usize = 100;

const DEFAULT_AUTHOR: &str = "unknown";

const MARKUP_TAG: &str = r"<[^<>]*>";

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(MARKUP_TAG).expect("valid markup tag regex"))
}

/// Remove tags and collapse runs of whitespace
pub fn strip_markup(raw: &str) -> String {
    let stripped = markup_pattern().replace_all(raw, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::validation(
            field,
            format!("must be at most {max} characters (got {len})"),
        ));
    }
    Ok(())
}

pub fn sanitize_title(raw: &str) -> Result<String> {
    let title = strip_markup(raw);
    if title.is_empty() {
        return Err(Error::validation("title", "cannot be empty"));
    }
    check_len("title", &title, MAX_TITLE_LEN)?;
    Ok(title)
}

pub fn sanitize_description(raw: &str) -> Result<String> {
    let description = raw.trim().to_string();
    check_len("description", &description, MAX_DESCRIPTION_LEN)?;
    Ok(description)
}

pub fn sanitize_comment(raw: &str) -> Result<String> {
    let text = raw.trim().to_string();
    if text.is_empty() {
        return Err(Error::validation("comment", "cannot be empty"));
    }
    check_len("comment", &text, MAX_COMMENT_LEN)?;
    Ok(text)
}

pub fn sanitize_author(raw: Option<&str>) -> Result<String> {
    let author = raw.map(strip_markup).unwrap_or_default();
    if author.is_empty() {
        return Ok(DEFAULT_AUTHOR.to_string());
    }
    check_len("author", &author, MAX_AUTHOR_LEN)?;
    Ok(author)
}

/// Checklist titles and item texts
pub fn sanitize_checklist_text(field: &str, raw: &str) -> Result<String> {
    let text = strip_markup(raw);
    if text.is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    check_len(field, &text, MAX_CHECKLIST_TEXT_LEN)?;
    Ok(text)
}

pub fn sanitize_reason(raw: &str) -> Result<String> {
    let reason = raw.trim().to_string();
    check_len("reason", &reason, MAX_REASON_LEN)?;
    Ok(reason)
}

/// Check `value` against a configured value set
pub fn check_enum(field: &str, value: &str, allowed: &[String]) -> Result<String> {
    let value = value.trim();
    if allowed.iter().any(|entry| entry == value) {
        return Ok(value.to_string());
    }
    Err(Error::validation(
        field,
        format!("unknown value '{value}' (expected one of: {})", allowed.join(", ")),
    ))
}

/// Normalize one related-file path to a root-relative, `/`-separated form
///
/// Rejects parent-directory segments, absolute paths outside `root`, and
/// extensions listed in `disallowed`.
pub fn normalize_path(raw: &str, root: &Path, disallowed: &[String]) -> Result<String> {
    let cleaned = raw.trim().replace('\\', "/");
    if cleaned.is_empty() {
        return Err(Error::validation("relatedFiles", "path cannot be empty"));
    }

    let relative = if Path::new(&cleaned).is_absolute() {
        match Path::new(&cleaned).strip_prefix(root) {
            Ok(rest) => rest.to_string_lossy().replace('\\', "/"),
            Err(_) => {
                return Err(Error::validation(
                    "relatedFiles",
                    format!("absolute path outside the project root: {raw}"),
                ))
            }
        }
    } else {
        cleaned
    };

    let mut segments = Vec::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::validation(
                    "relatedFiles",
                    format!("path traversal is not allowed: {raw}"),
                ))
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(Error::validation(
            "relatedFiles",
            format!("path does not name a file: {raw}"),
        ));
    }

    let normalized = segments.join("/");
    if let Some(ext) = Path::new(&normalized).extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if disallowed
            .iter()
            .any(|blocked| blocked.trim().trim_start_matches('.').eq_ignore_ascii_case(&ext))
        {
            return Err(Error::validation(
                "relatedFiles",
                format!("file extension '.{ext}' is not allowed: {raw}"),
            ));
        }
    }

    Ok(normalized)
}

/// Normalize a list of paths, dropping duplicates but keeping first-seen order
pub fn normalize_paths<S: AsRef<str>>(
    raws: &[S],
    root: &Path,
    disallowed: &[String],
) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raws.len());
    for raw in raws {
        let normalized = normalize_path(raw.as_ref(), root, disallowed)?;
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    Ok(out)
}

/// Append `additions` to `existing`, skipping entries already present
pub fn merge_paths(existing: &mut Vec<String>, additions: Vec<String>) {
    for path in additions {
        if !existing.contains(&path) {
            existing.push(path);
        }
    }
}
