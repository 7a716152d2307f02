//! Stored file retrieval by path.
//!
//! Fetches a file row and its stored sections (without vectors). Used by
//! the `docsync get` command.

use anyhow::{bail, Result};
use serde::Serialize;

use docsync_core::models::MetadataMap;
use docsync_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub file_path: String,
    pub file_hash: String,
    pub parent_path: Option<String>,
    pub meta: Option<MetadataMap>,
    pub latest_refresh: String, // ISO8601
    pub latest_version: String,
    pub tokens: i64,
    pub content: String,
    pub sections: Vec<SectionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionResponse {
    pub chunk_index: i64,
    pub header: String,
    pub slug: String,
    pub content: String,
    pub dims: usize,
}

/// Look up `path` and its sections in chunk order.
pub async fn get_file(store: &dyn Store, path: &str) -> Result<FileResponse> {
    let Some(file) = store.find_file(path).await? else {
        bail!("file not found: {}", path);
    };

    let sections = store
        .get_embeddings(path)
        .await?
        .into_iter()
        .map(|row| SectionResponse {
            chunk_index: row.chunk_index,
            header: row.header,
            slug: row.slug,
            content: row.content,
            dims: row.embedding.len(),
        })
        .collect();

    Ok(FileResponse {
        file_path: file.file_path,
        file_hash: file.file_hash,
        parent_path: file.parent_path,
        meta: file.meta,
        latest_refresh: file.latest_refresh.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        latest_version: file.latest_version,
        tokens: file.tokens,
        content: file.content,
        sections,
    })
}

/// CLI entry point: print the file, or JSON with `json`.
pub async fn run_get(config: &Config, path: &str, json: bool) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let file = get_file(&store, path).await;
    store.close().await;
    let file = file?;

    if json {
        println!("{}", serde_json::to_string_pretty(&file)?);
        return Ok(());
    }

    println!("--- File ---");
    println!("path:           {}", file.file_path);
    println!("hash:           {}", file.file_hash);
    if let Some(ref parent) = file.parent_path {
        println!("parent_path:    {}", parent);
    }
    if let Some(ref meta) = file.meta {
        println!("meta:           {}", serde_json::Value::Object(meta.clone()));
    }
    println!("latest_refresh: {}", file.latest_refresh);
    println!("latest_version: {}", file.latest_version);
    println!("tokens:         {}", file.tokens);
    println!();

    println!("--- Sections ({}) ---", file.sections.len());
    for section in &file.sections {
        println!("[{}] {} #{}", section.chunk_index, section.header, section.slug);
        println!("{}", section.content);
        println!();
    }

    Ok(())
}
