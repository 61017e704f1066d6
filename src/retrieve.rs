//! Retrieval orchestration.
//!
//! Combines query interpretation with the metadata store's exact-match
//! searches, deduplicates across strategies, falls back to keyword content
//! search when the interpreter found nothing structured, and assembles the
//! bounded textual context handed to the model for answer synthesis.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::interpret::{QueryError, QueryInterpreter};
use crate::llm::CompletionBackend;
use crate::models::{MatchType, QueryCriteria, SearchResult};
use crate::store::MetadataStore;

/// Query words dropped before keyword fallback search.
const STOP_WORDS: &[&str] = &[
    "what", "is", "are", "the", "how", "when", "where", "who", "why", "about", "find", "search",
];

/// Threshold under which a stored preview is considered stale and the
/// source file is re-read for context assembly.
const MIN_CONTEXT_CHARS: usize = 50;

/// Hard per-entry cap on context content.
const MAX_ENTRY_CHARS: usize = 1000;

#[derive(Debug)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub criteria: QueryCriteria,
}

pub struct RetrievalOrchestrator {
    store: MetadataStore,
    backend: Arc<dyn CompletionBackend>,
    max_results: usize,
    preview_length: usize,
}

impl RetrievalOrchestrator {
    pub fn new(
        store: MetadataStore,
        backend: Arc<dyn CompletionBackend>,
        search: &SearchConfig,
    ) -> Self {
        Self {
            store,
            backend,
            max_results: search.max_results,
            preview_length: search.preview_length,
        }
    }

    /// Interpret the question and run every matching store search,
    /// concatenated in fixed order: dates, tags, filenames. Falls back to
    /// per-keyword content search when no structured criteria came back.
    pub async fn search(&self, question: &str) -> Result<SearchOutcome, QueryError> {
        info!("Search: '{}'", question);

        let interpreter = QueryInterpreter::new(self.backend.clone())?;
        let criteria = interpreter.interpret(question).await?;
        debug!(
            "Criteria: dates={:?}, tags={:?}, filenames={:?}",
            criteria.dates, criteria.tags, criteria.filenames
        );

        let mut results = Vec::new();

        for date in &criteria.dates {
            results.extend(self.store.search_by_date(date).await);
        }
        for tag in &criteria.tags {
            results.extend(self.store.search_by_tag(tag).await);
        }
        for filename in &criteria.filenames {
            results.extend(self.store.search_by_filename(filename).await);
        }

        if results.is_empty() && !criteria.has_structured_criteria() {
            for keyword in extract_keywords(question) {
                let keyword_results = self.store.search_by_content(&keyword).await;
                debug!("Content '{}': {} results", keyword, keyword_results.len());
                results.extend(keyword_results);
            }
        }

        let results = dedup_results(results);
        info!("Found {} results", results.len());

        Ok(SearchOutcome { results, criteria })
    }

    /// Assemble the bounded context string from the first `max_results`
    /// matches. Prefers full content over the stored preview; previews
    /// under 50 characters trigger a re-read of the source file when it
    /// is still reachable.
    pub fn build_context(&self, results: &[SearchResult]) -> String {
        let mut parts = Vec::new();

        for (i, result) in results.iter().take(self.max_results).enumerate() {
            let mut content = result
                .content
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| {
                    if result.content_preview.is_empty() {
                        "No content available".to_string()
                    } else {
                        result.content_preview.clone()
                    }
                });

            if content.trim().chars().count() < MIN_CONTEXT_CHARS
                && Path::new(&result.path).exists()
            {
                match std::fs::read_to_string(&result.path) {
                    Ok(full) => {
                        debug!("Loaded full content for: {}", result.filename);
                        content = full.chars().take(self.preview_length).collect();
                    }
                    Err(e) => {
                        warn!("Could not load file {}: {}", result.path, e);
                    }
                }
            }

            if content.chars().count() > MAX_ENTRY_CHARS {
                content = content.chars().take(MAX_ENTRY_CHARS).collect::<String>() + "...";
            }

            parts.push(format!(
                "Document {} ({}): {}\n{}",
                i + 1,
                result.match_type,
                result.filename,
                content
            ));
        }

        parts.join("\n\n")
    }

    /// Produce the final natural-language answer for the question.
    ///
    /// Synthesis failure is reported inline in the returned string; it is
    /// never a hard error for the caller.
    pub async fn synthesize(&self, question: &str, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return format!("No relevant documents found for: {}", question);
        }

        if !self.backend.is_configured() {
            return format!(
                "Found {} documents but language model not available for response generation",
                results.len()
            );
        }

        info!("Generating response from {} results", results.len());
        let context = self.build_context(results);

        let prompt = format!(
            r#"You are answering the user's question: "{question}"

The following documents contain relevant information. Each document's filename indicates the date of the activities described within it.

For example:
- "2025-01-02.md" contains activities from January 2, 2025
- "2024-08-28.md" contains activities from August 28, 2024
- Files dated 2025-01-XX represent activities from January 2025

Documents:
{context}

Based on the activities and information in these dated documents, provide a comprehensive answer to the user's question. Focus on summarizing what was accomplished, planned, or discussed during the relevant time period."#
        );

        match self.backend.complete(&prompt).await {
            Ok(response) => response.trim().to_string(),
            Err(e) => format!(
                "Found {} relevant documents but error generating response: {}",
                results.len(),
                e
            ),
        }
    }
}

/// Lowercase, whitespace-split keywords with stop words and short tokens
/// removed; used for the content-search fallback.
fn extract_keywords(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word) && word.len() > 2)
        .map(|word| word.to_string())
        .collect()
}

/// Deduplicate by (filename, match type), preserving first-seen order:
/// the same file may appear once per distinct match type.
fn dedup_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<(String, MatchType)> = HashSet::new();
    results
        .into_iter()
        .filter(|result| seen.insert((result.filename.clone(), result.match_type)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::llm::{DisabledBackend, MockBackend};
    use crate::migrate;
    use crate::models::FileMetadata;
    use chrono::Utc;

    fn result(filename: &str, match_type: MatchType, preview: &str) -> SearchResult {
        SearchResult {
            filename: filename.to_string(),
            path: format!("/missing/{}", filename),
            extracted_date: None,
            creation_time: None,
            content_preview: preview.to_string(),
            content: None,
            match_type,
        }
    }

    async fn seeded_store() -> MetadataStore {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        let store = MetadataStore::new(pool);

        store
            .upsert(
                &FileMetadata {
                    filename: "2025-01-02.md".to_string(),
                    path: "/vault/2025-01-02.md".to_string(),
                    creation_time: Utc::now(),
                    extracted_date: Some("2025-01-02".to_string()),
                    tags: vec!["kubernetes".to_string()],
                },
                "January second: worked on the kubernetes operator rollout.",
            )
            .await;
        store
            .upsert(
                &FileMetadata {
                    filename: "recipes.md".to_string(),
                    path: "/vault/recipes.md".to_string(),
                    creation_time: Utc::now(),
                    extracted_date: None,
                    tags: vec!["cooking".to_string()],
                },
                "Soup recipes and grocery planning.",
            )
            .await;

        store
    }

    fn orchestrator(
        store: MetadataStore,
        backend: Arc<dyn CompletionBackend>,
    ) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(store, backend, &SearchConfig::default())
    }

    #[test]
    fn test_extract_keywords_filters_stop_words() {
        let keywords = extract_keywords("What is the Kubernetes operator about?");
        assert_eq!(keywords, vec!["kubernetes", "operator", "about?"]);
    }

    #[test]
    fn test_dedup_keeps_one_per_match_type() {
        let results = vec![
            result("a.md", MatchType::Date, ""),
            result("a.md", MatchType::Tag, ""),
            result("a.md", MatchType::Date, ""),
            result("b.md", MatchType::Date, ""),
        ];
        let deduped = dedup_results(results);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].match_type, MatchType::Date);
        assert_eq!(deduped[1].match_type, MatchType::Tag);
        assert_eq!(deduped[2].filename, "b.md");
    }

    #[tokio::test]
    async fn test_search_same_file_once_per_strategy() {
        let store = seeded_store().await;
        let backend = Arc::new(
            MockBackend::new()
                .with_response(r#"{"dates": ["2025-01"], "tags": ["kubernetes"]}"#),
        );
        let orch = orchestrator(store, backend);

        let outcome = orch.search("kubernetes work in january 2025").await.unwrap();
        let hits: Vec<_> = outcome
            .results
            .iter()
            .map(|r| (r.filename.as_str(), r.match_type))
            .collect();
        assert_eq!(
            hits,
            vec![
                ("2025-01-02.md", MatchType::Date),
                ("2025-01-02.md", MatchType::Tag),
            ]
        );
        assert_eq!(outcome.criteria.dates, vec!["2025-01"]);
    }

    #[tokio::test]
    async fn test_keyword_fallback_when_criteria_empty() {
        let store = seeded_store().await;
        let backend =
            Arc::new(MockBackend::new().with_response(r#"{"dates": [], "tags": []}"#));
        let orch = orchestrator(store, backend);

        let outcome = orch.search("what about grocery planning").await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].filename, "recipes.md");
        assert_eq!(outcome.results[0].match_type, MatchType::Content);
    }

    #[tokio::test]
    async fn test_search_requires_backend() {
        let store = seeded_store().await;
        let orch = orchestrator(store, Arc::new(DisabledBackend));
        let err = orch.search("anything").await.unwrap_err();
        assert!(matches!(err, QueryError::LlmUnavailable));
    }

    #[tokio::test]
    async fn test_build_context_formats_and_truncates() {
        let store = seeded_store().await;
        let orch = orchestrator(store, Arc::new(DisabledBackend));

        let long_preview = "x".repeat(1500);
        let results = vec![
            result("first.md", MatchType::Tag, "A reasonable length preview with enough characters."),
            result("second.md", MatchType::Content, &long_preview),
        ];
        let context = orch.build_context(&results);

        assert!(context.starts_with("Document 1 (tag): first.md\n"));
        assert!(context.contains("Document 2 (content): second.md\n"));
        let second_entry = context.split("\n\n").nth(1).unwrap();
        assert!(second_entry.ends_with("..."));
        // 1000 chars of content plus the ellipsis marker.
        assert!(second_entry.contains(&"x".repeat(1000)));
        assert!(!second_entry.contains(&"x".repeat(1001)));
    }

    #[tokio::test]
    async fn test_build_context_reloads_short_previews() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.md");
        std::fs::write(&path, "Full body restored from disk because the preview was too short to be useful.").unwrap();

        let store = seeded_store().await;
        let orch = orchestrator(store, Arc::new(DisabledBackend));

        let mut stale = result("stale.md", MatchType::Content, "tiny");
        stale.path = path.to_string_lossy().to_string();
        let context = orch.build_context(&[stale]);
        assert!(context.contains("Full body restored from disk"));
    }

    #[tokio::test]
    async fn test_build_context_honors_limit() {
        let store = seeded_store().await;
        let config = SearchConfig {
            max_results: 1,
            preview_length: 1000,
        };
        let orch = RetrievalOrchestrator::new(store, Arc::new(DisabledBackend), &config);

        let results = vec![
            result("a.md", MatchType::Tag, "Preview that is long enough to keep as context body."),
            result("b.md", MatchType::Tag, "Should be cut off by the limit."),
        ];
        let context = orch.build_context(&results);
        assert!(context.contains("a.md"));
        assert!(!context.contains("b.md"));
    }

    #[tokio::test]
    async fn test_synthesize_no_results_message() {
        let store = seeded_store().await;
        let orch = orchestrator(store, Arc::new(DisabledBackend));
        let answer = orch.synthesize("lost question", &[]).await;
        assert_eq!(answer, "No relevant documents found for: lost question");
    }

    #[tokio::test]
    async fn test_synthesize_degrades_without_backend() {
        let store = seeded_store().await;
        let orch = orchestrator(store, Arc::new(DisabledBackend));
        let results = vec![result("a.md", MatchType::Tag, "preview")];
        let answer = orch.synthesize("question", &results).await;
        assert!(answer.starts_with("Found 1 documents but language model not available"));
    }

    #[tokio::test]
    async fn test_synthesize_reports_completion_error_inline() {
        let store = seeded_store().await;
        let orch = orchestrator(store, Arc::new(MockBackend::failing()));
        let results = vec![result("a.md", MatchType::Tag, "preview")];
        let answer = orch.synthesize("question", &results).await;
        assert!(answer.contains("error generating response"));
    }

    #[tokio::test]
    async fn test_synthesize_trims_completion() {
        let store = seeded_store().await;
        let backend = Arc::new(MockBackend::new().with_response("  An answer.  \n"));
        let orch = orchestrator(store, backend);
        let results = vec![result("a.md", MatchType::Tag, "preview")];
        let answer = orch.synthesize("question", &results).await;
        assert_eq!(answer, "An answer.");
    }
}
