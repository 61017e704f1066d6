//! Vault indexing pass.
//!
//! Walks the vault, extracts metadata from each note, and upserts it into
//! the metadata store. Per-file store failures are counted, not raised;
//! one bad file never aborts the pass.

use tracing::{debug, info};

use crate::config::Config;
use crate::extract::{build_preview, extract_file_metadata};
use crate::store::MetadataStore;
use crate::vault::scan_vault;

#[derive(Debug, Default, Clone, Copy)]
pub struct IndexSummary {
    pub indexed: usize,
    pub failed: usize,
}

/// Index every eligible note under the vault root.
pub async fn index_vault(config: &Config, store: &MetadataStore) -> anyhow::Result<IndexSummary> {
    let notes = scan_vault(config)?;
    info!("Indexing {} files from {}", notes.len(), config.vault.root.display());

    let mut summary = IndexSummary::default();

    for note in &notes {
        let metadata = extract_file_metadata(note);
        let preview = build_preview(&note.body, config.search.preview_length);

        debug!(
            "Indexing {}: date={:?}, tags={:?}",
            metadata.filename, metadata.extracted_date, metadata.tags
        );

        if store.upsert(&metadata, &preview).await {
            summary.indexed += 1;
        } else {
            summary.failed += 1;
        }
    }

    info!(
        "Index pass complete: {} indexed, {} failed",
        summary.indexed, summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, VaultConfig};
    use crate::db;
    use crate::migrate;
    use std::path::Path;

    fn test_config(root: &Path) -> Config {
        Config {
            db: DbConfig {
                path: root.join("notes.sqlite"),
            },
            vault: VaultConfig {
                root: root.to_path_buf(),
                extensions: vec!["md".to_string()],
                recursive: true,
            },
            search: Default::default(),
            llm: Default::default(),
            enrich: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_index_vault_counts_and_stores() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2025-01-02.md"),
            "---\ntags: [work]\n---\nStandup notes #planning",
        )
        .unwrap();
        std::fs::write(dir.path().join("plain.md"), "No header here.").unwrap();
        std::fs::write(dir.path().join("skip.txt"), "wrong extension").unwrap();

        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        let store = MetadataStore::new(pool);

        let summary = index_vault(&test_config(dir.path()), &store).await.unwrap();
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.file_count().await, 2);

        let results = store.search_by_tag("work").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "2025-01-02.md");
    }

    #[tokio::test]
    async fn test_reindex_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.md"), "#alpha body").unwrap();

        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        let store = MetadataStore::new(pool);
        let config = test_config(dir.path());

        index_vault(&config, &store).await.unwrap();

        // Same path with changed tags replaces the row and associations.
        std::fs::write(dir.path().join("note.md"), "#beta body").unwrap();
        let summary = index_vault(&config, &store).await.unwrap();

        assert_eq!(summary.indexed, 1);
        assert_eq!(store.file_count().await, 1);
        assert!(store.search_by_tag("alpha").await.is_empty());
        assert_eq!(store.search_by_tag("beta").await.len(), 1);
    }
}
