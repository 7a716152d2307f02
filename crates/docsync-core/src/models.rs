//! Core data models used throughout docsync.
//!
//! These types represent the files, sections, and document records that flow
//! from the sectioning pipeline into the reconciler, plus the rows the
//! reconciler reads back from a [`Store`](crate::store::Store).

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::document::ParsedDocument;
use crate::meta::extract_meta_export;
use crate::section::process_sections;

/// Key/value metadata declared by a document's `export const meta = {...}`.
pub type MetadataMap = serde_json::Map<String, serde_json::Value>;

/// A file found by the directory walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
    /// The `.mdx` document that logically owns this file's directory, if any.
    pub parent_path: Option<PathBuf>,
}

/// One heading-delimited span of a document, re-serialized to markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub content: String,
    pub heading: String,
    pub slug: String,
}

/// A fully processed markdown/MDX file, ready for reconciliation.
///
/// Built fresh on every run and never mutated afterwards. `path` is the
/// identity key in the store.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub path: String,
    pub content: String,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetadataMap>,
    pub parent_path: Option<String>,
    pub sections: Vec<Section>,
}

impl DocumentRecord {
    /// Checksum, parse, extract metadata, strip, and section one file's text.
    ///
    /// Fails only when the text cannot be parsed as MDX.
    pub fn from_source(path: String, parent_path: Option<String>, content: String) -> Result<Self> {
        let checksum = checksum(&content);

        let (meta, sections) = {
            let parsed = ParsedDocument::parse(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            let meta = extract_meta_export(parsed.tree());
            let sections = match parsed.strip() {
                Some(stripped) => process_sections(&stripped),
                None => Vec::new(),
            };
            (meta, sections)
        };

        Ok(Self {
            path,
            content,
            checksum,
            meta,
            parent_path,
            sections,
        })
    }
}

/// Version tag and timestamp stamped on every file touched by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshInfo {
    pub version: String,
    pub date: DateTime<Utc>,
}

/// A file row as persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_path: String,
    pub content: String,
    pub file_hash: String,
    pub parent_path: Option<String>,
    pub meta: Option<MetadataMap>,
    pub latest_refresh: DateTime<Utc>,
    pub latest_version: String,
    pub tokens: i64,
}

/// One embedded section row, keyed by `(file_path, chunk_index)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub file_path: String,
    pub chunk_index: i64,
    pub header: String,
    pub slug: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// SHA-256 of the raw text, base64 encoded.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    STANDARD.encode(hasher.finalize())
}
