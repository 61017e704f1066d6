//! Batch header enrichment.
//!
//! Rewrites notes that lack a YAML frontmatter header with one generated
//! by the model (title, description, tags, plus a `created` date from the
//! file's modification time). Every per-file problem is an [`EnrichOutcome`],
//! never a hard error: the batch counts it and moves on. Files with an
//! existing header are left byte-for-byte untouched unless forced.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::extract::parse_header;
use crate::llm::CompletionBackend;
use crate::models::{EnrichOutcome, EnrichmentStats};

/// Model-visible slice of the note body.
const BODY_PREVIEW_CHARS: usize = 2000;

const FALLBACK_TITLE: &str = "No content provided";
const FALLBACK_DESCRIPTION: &str = "No information available to create a description.";

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub force_update: bool,
    pub max_files: Option<usize>,
    pub max_workers: usize,
    pub sequential: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            force_update: false,
            max_files: None,
            max_workers: 16,
            sequential: false,
        }
    }
}

pub struct Enricher {
    backend: Arc<dyn CompletionBackend>,
}

impl Enricher {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Enrich one note in place.
    pub async fn enrich_file(&self, path: &Path, force_update: bool) -> EnrichOutcome {
        if !path.exists() {
            error!("File does not exist: {}", path.display());
            return EnrichOutcome::failed("File not found");
        }

        let content = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("Error reading {}: {}", path.display(), e);
                return EnrichOutcome::failed(e.to_string());
            }
        };

        if content.trim().is_empty() {
            warn!("File is empty: {}", path.display());
            return EnrichOutcome::skipped("Empty file");
        }

        let (existing, body) = parse_header(&content);

        if !existing.is_empty() && !force_update {
            info!("Skipping file with existing header: {}", file_name(path));
            return EnrichOutcome::skipped("Existing header");
        }

        let created_date = modification_date(path);

        let header = match self.generate_header(&body, &created_date, &existing).await {
            Some(header) => header,
            None => {
                error!("Failed to generate header for: {}", file_name(path));
                return EnrichOutcome::failed("Header generation failed");
            }
        };

        let yaml = match serde_yaml::to_string(&header) {
            Ok(yaml) => yaml,
            Err(e) => {
                error!("Could not serialize header for {}: {}", path.display(), e);
                return EnrichOutcome::failed(e.to_string());
            }
        };

        let new_content = format!("---\n{}---\n\n{}", yaml, body);
        if let Err(e) = std::fs::write(path, new_content) {
            error!("Error writing {}: {}", path.display(), e);
            return EnrichOutcome::failed(e.to_string());
        }

        info!("Enriched file: {}", file_name(path));
        EnrichOutcome::success()
    }

    /// Ask the model for title/description/tags and merge them with the
    /// existing header fields.
    ///
    /// Returns `None` only when no model is configured. A completion or
    /// parse failure still yields a header: the fixed fallback fields,
    /// with any existing fields preserved on top.
    async fn generate_header(
        &self,
        body: &str,
        created_date: &str,
        existing: &Mapping,
    ) -> Option<Mapping> {
        if !self.backend.is_configured() {
            error!("Language model not available for header generation");
            return None;
        }

        let mut preview: String = body.trim().chars().take(BODY_PREVIEW_CHARS).collect();
        if body.trim().chars().count() > BODY_PREVIEW_CHARS {
            preview.push_str("...");
        }

        let prompt = format!(
            r#"Analyze the following document content and generate YAML frontmatter metadata.

Document content:
{preview}

Generate a JSON object with the following fields:
- "title": A concise, descriptive title for the document (max 60 chars)
- "description": A brief description summarizing the content (1-2 sentences)
- "tags": An array of relevant tags (3-8 tags, use lowercase with hyphens)

Guidelines:
- Make the title specific and informative
- Keep descriptions concise but meaningful
- Use specific, relevant tags that categorize the content
- For daily notes, include activity-based tags like "work", "personal", "learning"
- For technical content, include technology/topic tags
- Avoid generic tags like "note" or "document"

Return ONLY a valid JSON object with these exact field names."#
        );

        let response = match self.backend.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!("Error generating header with model: {}", e);
                return Some(fallback_header(created_date, existing));
            }
        };

        debug!("Model header response: {}", response);

        let cleaned = clean_json_response(&response);
        let parsed: serde_json::Value = match serde_json::from_str(&cleaned) {
            Ok(value) => value,
            Err(e) => {
                error!("Error parsing header response: {}", e);
                return Some(fallback_header(created_date, existing));
            }
        };

        let mut header = existing.clone();
        if !header.contains_key(Value::from("created")) {
            header.insert(Value::from("created"), Value::from(created_date));
        }
        header.insert(
            Value::from("title"),
            Value::from(
                parsed
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or(FALLBACK_TITLE),
            ),
        );
        header.insert(
            Value::from("description"),
            Value::from(
                parsed
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or(FALLBACK_DESCRIPTION),
            ),
        );
        let tags: Vec<Value> = parsed
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(Value::from)
                    .collect()
            })
            .unwrap_or_default();
        header.insert(Value::from("tags"), Value::Sequence(tags));

        Some(header)
    }
}

/// Strip markdown fences and slice the outermost `{...}` span; header
/// generation does not attempt structural JSON repair.
fn clean_json_response(response: &str) -> String {
    let mut text = response.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    let text = text.trim();

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

/// The header written when completion or parsing fails. Existing fields
/// take precedence over the fixed fallback values.
fn fallback_header(created_date: &str, existing: &Mapping) -> Mapping {
    let mut header = Mapping::new();
    header.insert(Value::from("created"), Value::from(created_date));
    header.insert(Value::from("description"), Value::from(FALLBACK_DESCRIPTION));
    header.insert(Value::from("title"), Value::from(FALLBACK_TITLE));
    header.insert(Value::from("tags"), Value::Sequence(Vec::new()));

    for (key, value) in existing {
        header.insert(key.clone(), value.clone());
    }
    header
}

fn modification_date(path: &Path) -> String {
    let time = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    time.format("%Y-%m-%d").to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run enrichment over a batch of note paths.
///
/// Parallel by default with a bounded worker pool; sequential when
/// requested or when there is at most one file. A panicked worker counts
/// as one failed file.
pub async fn enrich_many(
    backend: Arc<dyn CompletionBackend>,
    mut paths: Vec<PathBuf>,
    options: &EnrichOptions,
) -> Arc<EnrichmentStats> {
    if let Some(max) = options.max_files {
        paths.truncate(max);
    }

    let stats = Arc::new(EnrichmentStats::new(paths.len()));
    if paths.is_empty() {
        info!("No note files found to process");
        return stats;
    }

    info!("Starting enrichment of {} files", paths.len());
    let enricher = Arc::new(Enricher::new(backend));

    if options.sequential || paths.len() == 1 {
        info!("Using sequential processing");
        for path in &paths {
            let outcome = enricher.enrich_file(path, options.force_update).await;
            stats.record(outcome.status);
        }
    } else {
        info!("Using parallel processing with {} workers", options.max_workers);
        let semaphore = Arc::new(Semaphore::new(options.max_workers));
        let mut tasks = JoinSet::new();

        for path in paths {
            let enricher = Arc::clone(&enricher);
            let semaphore = Arc::clone(&semaphore);
            let stats = Arc::clone(&stats);
            let force_update = options.force_update;

            tasks.spawn(async move {
                // The semaphore is never closed while tasks are running.
                let Ok(_permit) = semaphore.acquire().await else {
                    stats.record(crate::models::EnrichStatus::Failed);
                    return;
                };
                let outcome = enricher.enrich_file(&path, force_update).await;
                stats.record(outcome.status);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Enrichment worker failed: {}", e);
                stats.record(crate::models::EnrichStatus::Failed);
            }
        }
    }

    info!(
        "Enrichment complete: {} success, {} failed, {} skipped, {} total",
        stats.success(),
        stats.failed(),
        stats.skipped(),
        stats.total()
    );
    stats
}
