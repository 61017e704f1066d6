//! SQLite metadata store for exact-match search.
//!
//! Holds one row per indexed note plus a tag many-to-many relation, and
//! answers date, tag, filename, and content-substring lookups. Store
//! access failures never cross this boundary: mutations report `false`,
//! searches return an empty list, and the error is logged.

use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, error};

use crate::models::{FileMetadata, MatchType, SearchResult};

static MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());
static FULL_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());

#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the metadata row for `metadata.path`, replacing
    /// all tag associations. One transaction per file; errors are logged
    /// and reported as `false`, never raised.
    pub async fn upsert(&self, metadata: &FileMetadata, preview: &str) -> bool {
        match self.try_upsert(metadata, preview).await {
            Ok(()) => {
                debug!("Indexed metadata for: {}", metadata.filename);
                true
            }
            Err(e) => {
                error!("Error inserting metadata for {}: {}", metadata.filename, e);
                false
            }
        }
    }

    async fn try_upsert(&self, metadata: &FileMetadata, preview: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO files (filename, path, creation_time, extracted_date, content_preview)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                filename = excluded.filename,
                creation_time = excluded.creation_time,
                extracted_date = excluded.extracted_date,
                content_preview = excluded.content_preview
            "#,
        )
        .bind(&metadata.filename)
        .bind(&metadata.path)
        .bind(metadata.creation_time.timestamp())
        .bind(&metadata.extracted_date)
        .bind(preview)
        .execute(&mut *tx)
        .await?;

        let file_id: i64 = sqlx::query_scalar("SELECT id FROM files WHERE path = ?")
            .bind(&metadata.path)
            .fetch_one(&mut *tx)
            .await?;

        // Replace the tag set wholesale so no stale links survive.
        sqlx::query("DELETE FROM file_tags WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        for tag in &metadata.tags {
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(&mut *tx)
                .await?;

            let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
                .bind(tag)
                .fetch_one(&mut *tx)
                .await?;

            sqlx::query("INSERT OR IGNORE INTO file_tags (file_id, tag_id) VALUES (?, ?)")
                .bind(file_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Search by a date term, matching the extracted date or the filename
    /// against the patterns derived from the query's shape. Exact date
    /// matches rank first, date prefixes second, then the rest by
    /// filename; duplicates by path keep the first occurrence.
    pub async fn search_by_date(&self, date_query: &str) -> Vec<SearchResult> {
        match self.try_search_by_date(date_query).await {
            Ok(results) => {
                debug!("Date search '{}': {} results", date_query, results.len());
                results
            }
            Err(e) => {
                error!("Error in date search: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search_by_date(&self, date_query: &str) -> Result<Vec<SearchResult>> {
        let patterns = build_date_patterns(date_query);

        let mut results = Vec::new();
        let mut seen_paths: HashSet<String> = HashSet::new();

        for pattern in patterns {
            let rows = sqlx::query(
                r#"
                SELECT filename, path, extracted_date, creation_time, content_preview
                FROM files
                WHERE (extracted_date LIKE ? OR filename LIKE ?)
                ORDER BY
                    CASE WHEN extracted_date = ? THEN 1
                         WHEN extracted_date LIKE ? THEN 2
                         ELSE 3 END,
                    filename
                "#,
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(date_query)
            .bind(format!("{}%", date_query))
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let path: String = row.get("path");
                if seen_paths.insert(path.clone()) {
                    results.push(row_to_result(&row, MatchType::Date));
                }
            }
        }

        Ok(results)
    }

    /// Case-insensitive substring match against tag names.
    pub async fn search_by_tag(&self, tag_query: &str) -> Vec<SearchResult> {
        match self.try_search_by_tag(tag_query).await {
            Ok(results) => {
                debug!("Tag search '{}': {} results", tag_query, results.len());
                results
            }
            Err(e) => {
                error!("Error in tag search: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search_by_tag(&self, tag_query: &str) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT f.filename, f.path, f.extracted_date, f.creation_time, f.content_preview
            FROM files f
            JOIN file_tags ft ON f.id = ft.file_id
            JOIN tags t ON ft.tag_id = t.id
            WHERE t.name LIKE ?
            ORDER BY f.filename
            "#,
        )
        .bind(format!("%{}%", tag_query))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row_to_result(row, MatchType::Tag))
            .collect())
    }

    /// Substring match against filenames; exact names first, then shorter
    /// filenames.
    pub async fn search_by_filename(&self, filename_query: &str) -> Vec<SearchResult> {
        match self.try_search_by_filename(filename_query).await {
            Ok(results) => {
                debug!(
                    "Filename search '{}': {} results",
                    filename_query,
                    results.len()
                );
                results
            }
            Err(e) => {
                error!("Error in filename search: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search_by_filename(&self, filename_query: &str) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT filename, path, extracted_date, creation_time, content_preview
            FROM files
            WHERE filename LIKE ?
            ORDER BY
                CASE WHEN filename = ? THEN 1 ELSE 2 END,
                LENGTH(filename)
            "#,
        )
        .bind(format!("%{}%", filename_query))
        .bind(filename_query)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row_to_result(row, MatchType::Filename))
            .collect())
    }

    /// Substring match against the stored content preview.
    pub async fn search_by_content(&self, content_query: &str) -> Vec<SearchResult> {
        match self.try_search_by_content(content_query).await {
            Ok(results) => {
                debug!(
                    "Content search '{}': {} results",
                    content_query,
                    results.len()
                );
                results
            }
            Err(e) => {
                error!("Error in content search: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search_by_content(&self, content_query: &str) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT filename, path, extracted_date, creation_time, content_preview
            FROM files
            WHERE content_preview LIKE ?
            ORDER BY LENGTH(filename)
            "#,
        )
        .bind(format!("%{}%", content_query))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row_to_result(row, MatchType::Content))
            .collect())
    }

    /// Number of indexed files; 0 when the store is unreachable.
    pub async fn file_count(&self) -> i64 {
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                error!("Error counting files: {}", e);
                0
            }
        }
    }

    /// Tags currently associated with a path, in insertion order.
    pub async fn tags_for_path(&self, path: &str) -> Vec<String> {
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT t.name
            FROM tags t
            JOIN file_tags ft ON ft.tag_id = t.id
            JOIN files f ON f.id = ft.file_id
            WHERE f.path = ?
            ORDER BY ft.rowid
            "#,
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await;

        match result {
            Ok(tags) => tags,
            Err(e) => {
                error!("Error listing tags for {}: {}", path, e);
                Vec::new()
            }
        }
    }
}

fn row_to_result(row: &sqlx::sqlite::SqliteRow, match_type: MatchType) -> SearchResult {
    let creation_time: Option<i64> = row.get("creation_time");
    SearchResult {
        filename: row.get("filename"),
        path: row.get("path"),
        extracted_date: row.get("extracted_date"),
        creation_time: creation_time.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        content_preview: row.get::<Option<String>, _>("content_preview").unwrap_or_default(),
        content: None,
        match_type,
    }
}

/// Build LIKE patterns for the query's date shape.
///
/// `YYYY-MM` also tries the hyphen-stripped form as a substring, since
/// some filenames encode dates without separators.
pub fn build_date_patterns(date_query: &str) -> Vec<String> {
    if MONTH_RE.is_match(date_query) {
        vec![
            format!("{}%", date_query),
            date_query.to_string(),
            format!("%{}%", date_query.replace('-', "")),
        ]
    } else if FULL_DATE_RE.is_match(date_query) {
        vec![date_query.to_string(), format!("{}%", date_query)]
    } else if YEAR_RE.is_match(date_query) {
        vec![format!("{}-%", date_query), date_query.to_string()]
    } else {
        vec![format!("{}%", date_query), format!("%{}%", date_query)]
    }
}
