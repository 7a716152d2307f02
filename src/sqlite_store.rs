//! SQLite-backed [`Store`] implementation.
//!
//! Tables `files` and `embeddings` (see [`migrate`](crate::migrate)).
//! Vectors are stored as little-endian `f32` BLOBs, `latest_refresh` as
//! unix milliseconds, metadata as a JSON text column.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;

use docsync_core::embedding::{blob_to_vec, vec_to_blob};
use docsync_core::models::{MetadataMap, RefreshInfo, StoredEmbedding, StoredFile};
use docsync_core::store::{FileUpsert, PathScope, Store, StoreOp};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the configured database, creating the schema if needed.
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.db.path).await
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn file_from_row(row: &SqliteRow) -> Result<StoredFile> {
    let meta_json: Option<String> = row.try_get("meta_json")?;
    let meta = meta_json
        .map(|json| serde_json::from_str::<MetadataMap>(&json))
        .transpose()
        .context("Invalid meta_json in files table")?;

    Ok(StoredFile {
        file_path: row.try_get("file_path")?,
        content: row.try_get("content")?,
        file_hash: row.try_get("file_hash")?,
        parent_path: row.try_get("parent_path")?,
        meta,
        latest_refresh: millis_to_datetime(row.try_get("latest_refresh")?),
        latest_version: row.try_get("latest_version")?,
        tokens: row.try_get("tokens")?,
    })
}

async fn delete_scoped(conn: &mut SqliteConnection, table: &str, scope: &PathScope) -> Result<()> {
    match scope {
        PathScope::All => {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *conn)
                .await?;
        }
        PathScope::Only(paths) => {
            let sql = format!("DELETE FROM {} WHERE file_path = ?", table);
            for path in paths {
                sqlx::query(&sql).bind(path).execute(&mut *conn).await?;
            }
        }
    }
    Ok(())
}

async fn upsert_file(conn: &mut SqliteConnection, file: &FileUpsert) -> Result<()> {
    let meta_json = file.meta.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO files (file_path, content, file_hash, parent_path, meta_json,
                           latest_refresh, latest_version, tokens)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(file_path) DO UPDATE SET
            content = excluded.content,
            file_hash = excluded.file_hash,
            parent_path = excluded.parent_path,
            meta_json = excluded.meta_json,
            latest_refresh = excluded.latest_refresh,
            latest_version = excluded.latest_version,
            tokens = excluded.tokens
        "#,
    )
    .bind(&file.path)
    .bind(&file.content)
    .bind(&file.file_hash)
    .bind(&file.parent_path)
    .bind(&meta_json)
    .bind(file.refresh.date.timestamp_millis())
    .bind(&file.refresh.version)
    .bind(file.tokens)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_embeddings(conn: &mut SqliteConnection, rows: &[StoredEmbedding]) -> Result<()> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO embeddings (file_path, chunk_index, header, slug, content, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.file_path)
        .bind(row.chunk_index)
        .bind(&row.header)
        .bind(&row.slug)
        .bind(&row.content)
        .bind(vec_to_blob(&row.embedding))
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert embedding {}#{}", row.file_path, row.chunk_index))?;
    }
    Ok(())
}

async fn apply_op(conn: &mut SqliteConnection, op: &StoreOp) -> Result<()> {
    match op {
        StoreOp::DeleteEmbeddings(scope) => delete_scoped(conn, "embeddings", scope).await,
        StoreOp::DeleteFiles(scope) => delete_scoped(conn, "files", scope).await,
        StoreOp::UpsertFile(file) => upsert_file(conn, file).await,
        StoreOp::CreateEmbeddings(rows) => insert_embeddings(conn, rows).await,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_file(&self, path: &str) -> Result<Option<StoredFile>> {
        let row = sqlx::query(
            r#"
            SELECT file_path, content, file_hash, parent_path, meta_json,
                   latest_refresh, latest_version, tokens
            FROM files WHERE file_path = ?
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    async fn touch_file(&self, path: &str, refresh: &RefreshInfo) -> Result<()> {
        let result =
            sqlx::query("UPDATE files SET latest_refresh = ?, latest_version = ? WHERE file_path = ?")
                .bind(refresh.date.timestamp_millis())
                .bind(&refresh.version)
                .bind(path)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("file not found: {}", path));
        }
        Ok(())
    }

    async fn list_file_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT file_path FROM files ORDER BY file_path")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    async fn count_files(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_embeddings(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_embeddings(&self, path: &str) -> Result<Vec<StoredEmbedding>> {
        let rows = sqlx::query(
            r#"
            SELECT file_path, chunk_index, header, slug, content, embedding
            FROM embeddings WHERE file_path = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let blob: Vec<u8> = row.try_get("embedding")?;
                Ok(StoredEmbedding {
                    file_path: row.try_get("file_path")?,
                    chunk_index: row.try_get("chunk_index")?,
                    header: row.try_get("header")?,
                    slug: row.try_get("slug")?,
                    content: row.try_get("content")?,
                    embedding: blob_to_vec(&blob),
                })
            })
            .collect()
    }

    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for op in &ops {
            apply_op(&mut tx, op).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
