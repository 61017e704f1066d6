//! Natural-language query interpretation.
//!
//! Sends the user's question to the language model with strict JSON
//! instructions, then recovers a `{dates, tags}` object from whatever the
//! model actually returned: fence stripping, brace-span slicing, and an
//! escalating three-stage parse/repair pipeline. The interpreter is the
//! one place where a missing model is fatal rather than degraded.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::CompletionBackend;
use crate::models::QueryCriteria;

static BRACE_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").unwrap());
static BARE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,])\s*([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());
static ARRAY_LITERAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*\[([^\]]*)\]").unwrap());
static BARE_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*([,\]])").unwrap());
static TRAILING_COMMA_OBJ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());
static TRAILING_COMMA_ARR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());
static DATES_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""dates"\s*:\s*\[([^\]]*)\]"#).unwrap());
static TAGS_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""tags"\s*:\s*\[([^\]]*)\]"#).unwrap());

/// Errors from query interpretation.
///
/// `LlmUnavailable` is the single fatal configuration error in the
/// system; everything below the interpreter degrades instead.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("language model is required but not configured")]
    LlmUnavailable,
    #[error("query interpretation failed: {0}")]
    Interpretation(String),
}

pub struct QueryInterpreter {
    backend: Arc<dyn CompletionBackend>,
}

impl std::fmt::Debug for QueryInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryInterpreter").finish_non_exhaustive()
    }
}

impl QueryInterpreter {
    /// Requires a configured backend; a disabled backend is a fatal
    /// configuration error, not a silent fallback.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Result<Self, QueryError> {
        if !backend.is_configured() {
            return Err(QueryError::LlmUnavailable);
        }
        Ok(Self { backend })
    }

    /// Turn a question into structured search criteria.
    pub async fn interpret(&self, question: &str) -> Result<QueryCriteria, QueryError> {
        let prompt = build_prompt(question);

        let response = self
            .backend
            .complete(&prompt)
            .await
            .map_err(|e| QueryError::Interpretation(e.to_string()))?;
        let response = response.trim();
        debug!("Raw interpreter response: {:?}", response);

        let cleaned = match clean_response(response) {
            Some(text) => text,
            None => {
                warn!(
                    "Could not extract JSON from response: {:.100}...",
                    response
                );
                return Ok(QueryCriteria::empty(question));
            }
        };

        let parsed = parse_with_repair(&cleaned).map_err(QueryError::Interpretation)?;
        Ok(criteria_from_value(question, &parsed))
    }
}

fn build_prompt(question: &str) -> String {
    format!(
        r#"You must analyze this query EXACTLY and return JSON: "{question}"

STRICT RULES:
1. DATES array: Add dates ONLY if the query contains month names (January, March), years (2024, 2025), quarters (Q1, Q2), or specific dates. If NO date words exist, dates must be empty [].
2. TAGS array: Extract the main topic mentioned and add related words.

Template: {{"dates": [], "tags": []}}

CRITICAL: For "{question}" - scan for date words first:
- Does it contain months? (January, February, March, etc.)
- Does it contain years? (2024, 2025, etc.)
- Does it contain quarters? (Q1, Q2, etc.)
- If NO date words found, dates MUST be []

Examples:
- "jan 2023" -> {{"dates": ["2023-01"], "tags": []}}
- "Q1 2025" -> {{"dates": ["2025-01", "2025-02", "2025-03"], "tags": []}}
- "what is kubernetes?" -> {{"dates": [], "tags": ["kubernetes", "k8s", "container", "orchestration"]}}
- "what do I know about stripe?" -> {{"dates": [], "tags": ["stripe", "payment", "payments", "billing", "api"]}}
- "notes about AI" -> {{"dates": [], "tags": ["ai", "artificial intelligence", "machine learning", "ml"]}}

Return ONLY JSON for: "{question}""#
    )
}

/// Cleanup pipeline: fence stripping, brace-span slicing, and a
/// brace-balanced regex as the last resort. Returns `None` when no JSON
/// object can be located at all (the silent-degrade path).
fn clean_response(response: &str) -> Option<String> {
    let mut text = response;

    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    let mut text = text.trim().to_string();

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            text = text[start..=end].to_string();
        }
    }

    if !text.starts_with('{') {
        match BRACE_SPAN_RE.find(&text) {
            Some(m) => text = m.as_str().to_string(),
            None => return None,
        }
    }

    Some(text)
}

/// Escalating parse: raw JSON, then quote/comma repairs, then raw
/// array-content extraction. Stages short-circuit on success; a total
/// failure is an error for the caller to propagate.
fn parse_with_repair(text: &str) -> Result<serde_json::Value, String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return Ok(value);
    }

    // Common model mistakes: single quotes, bare keys, bare identifiers
    // inside array literals, trailing commas.
    let fixed = text.replace('\'', "\"");
    let fixed = BARE_KEY_RE.replace_all(&fixed, "$1\"$2\":").to_string();
    let fixed = ARRAY_LITERAL_RE
        .replace_all(&fixed, |caps: &regex::Captures| {
            let inner = format!("{}]", &caps[1]);
            let quoted = BARE_IDENT_RE.replace_all(&inner, "\"$1\"$2");
            format!(": [{}", quoted)
        })
        .to_string();
    let fixed = TRAILING_COMMA_OBJ_RE.replace_all(&fixed, "}").to_string();
    let fixed = TRAILING_COMMA_ARR_RE.replace_all(&fixed, "]").to_string();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&fixed) {
        return Ok(value);
    }

    // Last resort: pull the array bodies out as raw token lists.
    let dates = DATES_ARRAY_RE
        .captures(&fixed)
        .map(|caps| split_tokens(&caps[1]));
    let tags = TAGS_ARRAY_RE
        .captures(&fixed)
        .map(|caps| split_tokens(&caps[1]));

    if dates.is_none() && tags.is_none() {
        return Err(format!(
            "could not parse model response as JSON: {:.100}",
            text
        ));
    }

    Ok(serde_json::json!({
        "dates": dates.unwrap_or_default(),
        "tags": tags.unwrap_or_default(),
    }))
}

fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| token.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

fn criteria_from_value(question: &str, value: &serde_json::Value) -> QueryCriteria {
    QueryCriteria {
        raw_query: question.to_string(),
        dates: string_list(value.get("dates")),
        tags: string_list(value.get("tags")),
        filenames: string_list(value.get("filenames")),
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
