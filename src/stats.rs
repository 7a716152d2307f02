//! Database statistics.
//!
//! Used by `docsync stats` to show what the last runs stored: file and
//! embedding counts, token usage with an estimated cost, the latest refresh
//! version, and a per-directory breakdown.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use docsync_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Counts for one top-level docs directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirStats {
    pub files: i64,
    pub embeddings: i64,
    pub tokens: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbStats {
    pub files: i64,
    pub embeddings: i64,
    pub tokens: i64,
    /// Millis and version of the most recently refreshed file.
    pub latest_refresh: Option<(i64, String)>,
    pub by_dir: BTreeMap<String, DirStats>,
}

/// First path segment, or `(root)` for files directly under the docs root.
fn top_level_dir(path: &str) -> String {
    match path.split_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => "(root)".to_string(),
    }
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<DbStats> {
    let rows = sqlx::query(
        r#"
        SELECT f.file_path, f.tokens, COUNT(e.chunk_index) AS embedding_count
        FROM files f
        LEFT JOIN embeddings e ON e.file_path = f.file_path
        GROUP BY f.file_path
        ORDER BY f.file_path
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut stats = DbStats::default();
    for row in &rows {
        let path: String = row.try_get("file_path")?;
        let tokens: i64 = row.try_get("tokens")?;
        let embeddings: i64 = row.try_get("embedding_count")?;

        stats.files += 1;
        stats.tokens += tokens;
        stats.embeddings += embeddings;

        let dir = stats.by_dir.entry(top_level_dir(&path)).or_default();
        dir.files += 1;
        dir.tokens += tokens;
        dir.embeddings += embeddings;
    }

    let latest = sqlx::query(
        "SELECT latest_refresh, latest_version FROM files ORDER BY latest_refresh DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    if let Some(row) = latest {
        stats.latest_refresh = Some((row.try_get("latest_refresh")?, row.try_get("latest_version")?));
    }

    Ok(stats)
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let stats = collect_stats(store.pool()).await;
    store.close().await;
    let stats = stats?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let cost = config.embedding.estimate_cost(stats.tokens.max(0) as u64);

    println!("docsync database stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Files:       {}", stats.files);
    println!("  Embeddings:  {}", stats.embeddings);
    println!("  Tokens:      {} (≈ ${:.6})", stats.tokens, cost);
    match &stats.latest_refresh {
        Some((ms, version)) => println!("  Refreshed:   {} ({})", format_ms(*ms), version),
        None => println!("  Refreshed:   never"),
    }

    if !stats.by_dir.is_empty() {
        println!();
        println!("  By directory:");
        println!("  {:<24} {:>6} {:>10} {:>10}", "DIRECTORY", "FILES", "EMBEDDINGS", "TOKENS");
        println!("  {}", "-".repeat(54));
        for (dir, s) in &stats.by_dir {
            println!("  {:<24} {:>6} {:>10} {:>10}", dir, s.files, s.embeddings, s.tokens);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
