//! Metadata extraction from raw note text.
//!
//! Notes may begin with a YAML frontmatter header fenced by `---` lines.
//! This module parses that header, derives tags (header field + inline
//! hashtags) and a canonical `YYYY-MM-DD` date (header field, falling back
//! to the filename), and builds the bounded content preview stored in the
//! metadata database. Malformed headers degrade gracefully to "no header";
//! nothing in this module raises for bad input.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::warn;

use crate::models::FileMetadata;
use crate::vault::NoteFile;

static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([A-Za-z0-9_-]+)").unwrap());
static FILENAME_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

/// Split a note into its YAML frontmatter header and body.
///
/// The header is recognized only when the text starts with `---`. The
/// closing fence is the first `\n---\n` after the opening marker, falling
/// back to a trailing `\n---`. A missing fence or a header that does not
/// parse as a key/value mapping yields an empty header and the text
/// unchanged.
pub fn parse_header(text: &str) -> (Mapping, String) {
    if !text.starts_with("---") {
        return (Mapping::new(), text.to_string());
    }

    let end = match text[3..].find("\n---\n") {
        Some(pos) => pos + 3,
        None => match text[3..].find("\n---") {
            Some(pos) => pos + 3,
            None => return (Mapping::new(), text.to_string()),
        },
    };

    let header_text = &text[3..end];
    let body = text[end + 4..].trim().to_string();

    match serde_yaml::from_str::<Value>(header_text) {
        Ok(Value::Mapping(map)) => (map, body),
        Ok(Value::Null) => (Mapping::new(), body),
        Ok(_) => {
            warn!("Frontmatter is not a key/value mapping; treating as no header");
            (Mapping::new(), text.to_string())
        }
        Err(e) => {
            warn!("Could not parse YAML frontmatter: {}", e);
            (Mapping::new(), text.to_string())
        }
    }
}

/// Collect tags from the header `tags` field (string or list) and inline
/// body hashtags, lowercased and deduplicated keeping first occurrence.
/// Header tags come before body-derived tags.
pub fn extract_tags(header: &Mapping, body: &str) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();

    match header.get(Value::from("tags")) {
        Some(Value::String(s)) => raw.push(s.clone()),
        Some(Value::Sequence(seq)) => {
            for item in seq {
                if let Some(s) = scalar_to_string(item) {
                    raw.push(s);
                }
            }
        }
        _ => {}
    }

    for cap in HASHTAG_RE.captures_iter(body) {
        raw.push(cap[1].to_string());
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let clean = tag.trim().to_lowercase();
        if !clean.is_empty() && !tags.contains(&clean) {
            tags.push(clean);
        }
    }
    tags
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Derive the canonical date: header `date` field first (first 10 chars,
/// parsed as `YYYY-MM-DD`), then a `YYYY-MM-DD` substring in the filename.
pub fn extract_date(header: &Mapping, filename: &str) -> Option<String> {
    if let Some(date) = extract_date_from_header(header) {
        return Some(date);
    }
    FILENAME_DATE_RE
        .find(filename)
        .map(|m| m.as_str().to_string())
}

fn extract_date_from_header(header: &Mapping) -> Option<String> {
    let value = header.get(Value::from("date"))?;
    let raw = scalar_to_string(value)?;
    let prefix: String = raw.chars().take(10).collect();
    match NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
        Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
        Err(_) => {
            warn!("Could not parse date string: {}", raw);
            None
        }
    }
}

/// Truncate `text` to `max_length` characters for database storage.
///
/// When the cut lands past 80% of `max_length`, the preview snaps back to
/// the last whitespace boundary and gains an ellipsis; otherwise the hard
/// cut stands.
pub fn build_preview(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let preview: String = text.chars().take(max_length).collect();
    if let Some(last_space) = preview.rfind(' ') {
        let char_pos = preview[..last_space].chars().count();
        if char_pos as f64 > max_length as f64 * 0.8 {
            return format!("{}...", &preview[..last_space]);
        }
    }
    preview
}

/// Creation timestamp from filesystem metadata, falling back to the
/// modification time and finally to now when the path is inaccessible.
pub fn resolve_creation_time(path: &Path) -> DateTime<Utc> {
    match std::fs::metadata(path) {
        Ok(meta) => meta
            .created()
            .or_else(|_| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now()),
        Err(e) => {
            warn!("Could not get file stats for {}: {}", path.display(), e);
            Utc::now()
        }
    }
}

/// Full extraction pass over one note: header, tags, date, creation time.
pub fn extract_file_metadata(note: &NoteFile) -> FileMetadata {
    let (header, body) = parse_header(&note.body);

    let extracted_date = extract_date(&header, &note.filename);
    let tags = extract_tags(&header, &body);
    let creation_time = resolve_creation_time(&note.path);

    FileMetadata {
        filename: note.filename.clone(),
        path: note.path.to_string_lossy().to_string(),
        creation_time,
        extracted_date,
        tags,
    }
}
