//! Core data models used throughout notiq.
//!
//! These types represent the note metadata, search results, and query
//! criteria that flow through the indexing and retrieval pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

/// Structured metadata extracted from a single note file.
///
/// Stored in SQLite keyed by `path`; re-indexing the same path fully
/// replaces the row and its tag associations.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub filename: String,
    pub path: String,
    pub creation_time: DateTime<Utc>,
    /// Canonical `YYYY-MM-DD` date from the header or filename, if any.
    pub extracted_date: Option<String>,
    /// Lowercase, deduplicated; header tags precede body hashtags.
    pub tags: Vec<String>,
}

impl FileMetadata {
    pub fn is_dated(&self) -> bool {
        self.extracted_date.is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let needle = tag.to_lowercase();
        self.tags.iter().any(|t| *t == needle)
    }
}

/// The search strategy that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Date,
    Tag,
    Filename,
    Content,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Date => "date",
            MatchType::Tag => "tag",
            MatchType::Filename => "filename",
            MatchType::Content => "content",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single match returned from the metadata store.
///
/// Ephemeral: constructed per query, never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub filename: String,
    pub path: String,
    pub extracted_date: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub content_preview: String,
    /// Full note body when a caller has loaded it; otherwise the preview
    /// is used for context assembly.
    pub content: Option<String>,
    pub match_type: MatchType,
}

/// Structured criteria extracted from a natural-language question.
#[derive(Debug, Clone, Default)]
pub struct QueryCriteria {
    pub raw_query: String,
    pub dates: Vec<String>,
    pub tags: Vec<String>,
    pub filenames: Vec<String>,
}

impl QueryCriteria {
    pub fn empty(raw_query: &str) -> Self {
        Self {
            raw_query: raw_query.to_string(),
            ..Default::default()
        }
    }

    /// True when the interpreter produced at least one exact-match term.
    pub fn has_structured_criteria(&self) -> bool {
        !self.dates.is_empty() || !self.tags.is_empty() || !self.filenames.is_empty()
    }
}

/// Per-file outcome of one enrichment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichStatus {
    Success,
    Skipped,
    Failed,
}

/// Result-with-reason for a single enrichment, distinct from hard errors:
/// a failed file is a normal outcome that the batch counts and moves past.
#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub status: EnrichStatus,
    pub reason: Option<String>,
}

impl EnrichOutcome {
    pub fn success() -> Self {
        Self {
            status: EnrichStatus::Success,
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: EnrichStatus::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: EnrichStatus::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate counters for one enrichment run.
///
/// Shared across worker tasks via `Arc`; increments are atomic and the
/// totals are read once after the batch completes.
#[derive(Debug, Default)]
pub struct EnrichmentStats {
    success: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    total: AtomicUsize,
}

impl EnrichmentStats {
    pub fn new(total: usize) -> Self {
        let stats = Self::default();
        stats.total.store(total, Ordering::Relaxed);
        stats
    }

    pub fn record(&self, status: EnrichStatus) {
        match status {
            EnrichStatus::Success => self.success.fetch_add(1, Ordering::Relaxed),
            EnrichStatus::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            EnrichStatus::Skipped => self.skipped.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn success(&self) -> usize {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}
