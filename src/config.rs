use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

fn default_recursive() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_preview_length")]
    pub preview_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            preview_length: 1000,
        }
    }
}

fn default_max_results() -> usize {
    100
}
fn default_preview_length() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            timeout_secs: 120,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self { max_workers: 16 }
    }
}

fn default_max_workers() -> usize {
    16
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.vault.extensions.is_empty() {
        anyhow::bail!("vault.extensions must not be empty");
    }

    if config.search.max_results == 0 {
        anyhow::bail!("search.max_results must be >= 1");
    }

    if config.search.preview_length == 0 {
        anyhow::bail!("search.preview_length must be >= 1");
    }

    if config.enrich.max_workers == 0 {
        anyhow::bail!("enrich.max_workers must be >= 1");
    }

    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    match config.llm.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notiq.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let (_dir, path) = write_config(
            r#"
[db]
path = "./notes.sqlite"

[vault]
root = "./vault"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.vault.extensions, vec!["md".to_string()]);
        assert!(cfg.vault.recursive);
        assert_eq!(cfg.search.max_results, 100);
        assert_eq!(cfg.search.preview_length, 1000);
        assert_eq!(cfg.enrich.max_workers, 16);
        assert!(!cfg.llm.is_enabled());
    }

    #[test]
    fn test_ollama_requires_model() {
        let (_dir, path) = write_config(
            r#"
[db]
path = "./notes.sqlite"

[vault]
root = "./vault"

[llm]
provider = "ollama"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_dir, path) = write_config(
            r#"
[db]
path = "./notes.sqlite"

[vault]
root = "./vault"

[llm]
provider = "openai"
model = "gpt"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
