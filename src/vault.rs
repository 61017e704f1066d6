//! Note-tree enumeration.
//!
//! Walks the configured vault root and yields one [`NoteFile`] per file
//! whose extension is in the configured set. Files that cannot be read as
//! UTF-8 are skipped with a warning rather than failing the walk.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::Config;

/// One eligible file under the vault root.
#[derive(Debug, Clone)]
pub struct NoteFile {
    pub path: PathBuf,
    pub filename: String,
    pub body: String,
}

/// Enumerate eligible note files under the vault root.
///
/// Sorted by path for deterministic ordering.
pub fn scan_vault(config: &Config) -> Result<Vec<NoteFile>> {
    let root = &config.vault.root;
    if !root.exists() {
        bail!("Vault directory does not exist: {}", root.display());
    }

    let walker = if config.vault.recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };

    let mut notes = Vec::new();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !has_allowed_extension(path, &config.vault.extensions) {
            continue;
        }

        let body = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                continue;
            }
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        notes.push(NoteFile {
            path: path.to_path_buf(),
            filename,
            body,
        });
    }

    notes.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(notes)
}

/// Enumerate eligible note paths without reading their contents.
///
/// Used by the enrichment batch, which reads each file inside its own
/// worker task.
pub fn list_note_paths(config: &Config) -> Result<Vec<PathBuf>> {
    let root = &config.vault.root;
    if !root.exists() {
        bail!("Vault directory does not exist: {}", root.display());
    }

    let walker = if config.vault.recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && has_allowed_extension(entry.path(), &config.vault.extensions)
        {
            paths.push(entry.path().to_path_buf());
        }
    }

    paths.sort();
    Ok(paths)
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return false,
    };
    extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}
