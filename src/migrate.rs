use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indexes. Safe to run on every start.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            file_path TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            parent_path TEXT,
            meta_json TEXT,
            latest_refresh INTEGER NOT NULL,
            latest_version TEXT NOT NULL,
            tokens INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            file_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            header TEXT NOT NULL,
            slug TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (file_path, chunk_index),
            FOREIGN KEY (file_path) REFERENCES files(file_path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_slug ON embeddings(slug)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_files_latest_refresh ON files(latest_refresh DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
