//! Language-model completion boundary.
//!
//! One operation: `complete(prompt) -> text`. No streaming and no
//! structured-output contract; callers extract structure defensively
//! from whatever text comes back. Backends:
//! - **[`OllamaBackend`]** — calls a local Ollama instance's `/api/generate` endpoint.
//! - **[`DisabledBackend`]** — always errors; used when no model is configured.
//! - **[`MockBackend`]** — queued canned responses for deterministic tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::LlmConfig;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// The completion seam between this crate and the external model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Whether a real model is configured behind this backend.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Instantiate the backend named by the configuration.
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn CompletionBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledBackend)),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Disabled backend ============

/// Stands in when `llm.provider = "disabled"`; every call errors.
pub struct DisabledBackend;

#[async_trait]
impl CompletionBackend for DisabledBackend {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Language model backend is disabled")
    }

    fn is_configured(&self) -> bool {
        false
    }
}

// ============ Ollama backend ============

/// Completion backend for a local Ollama instance.
///
/// Calls `POST /api/generate` with `stream: false`. The HTTP client
/// timeout is the only timeout applied to completion calls.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama backend"))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            model,
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.base_url,
                    e
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))?;

        debug!("Completion returned {} chars", text.len());
        Ok(text.to_string())
    }
}

// ============ Mock backend ============

/// Deterministic backend for tests: returns queued responses in order,
/// then a fixed default. Can be flipped to fail every call.
#[derive(Default)]
pub struct MockBackend {
    queued: Mutex<VecDeque<String>>,
    default_response: String,
    fail: bool,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            default_response: "Mock response".to_string(),
            ..Default::default()
        }
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.queued.lock().unwrap().push_back(response.into());
        self
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            bail!("Mock backend failure");
        }
        let next = self.queued.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }
}
