//! Storage abstraction for docsync.
//!
//! The [`Store`] trait covers everything the reconciler needs from the
//! persistent file/embedding store: lookups by path, the refresh-only
//! update for unchanged files, and an atomic [`transaction`](Store::transaction)
//! over a list of [`StoreOp`]s for every write that must land as a unit.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MetadataMap, RefreshInfo, StoredEmbedding, StoredFile};

/// Which paths a delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathScope {
    All,
    Only(Vec<String>),
}

impl PathScope {
    pub fn contains(&self, path: &str) -> bool {
        match self {
            PathScope::All => true,
            PathScope::Only(paths) => paths.iter().any(|p| p == path),
        }
    }
}

/// Create-or-update payload for a file row.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpsert {
    pub path: String,
    pub content: String,
    pub file_hash: String,
    pub parent_path: Option<String>,
    pub meta: Option<MetadataMap>,
    pub refresh: RefreshInfo,
    pub tokens: i64,
}

/// One write inside a [`Store::transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    DeleteEmbeddings(PathScope),
    DeleteFiles(PathScope),
    UpsertFile(FileUpsert),
    /// Every row must reference a file that exists at that point in the
    /// transaction.
    CreateEmbeddings(Vec<StoredEmbedding>),
}

/// Abstract storage backend for docsync.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_file`](Store::find_file) | Look up one file row by exact path |
/// | [`touch_file`](Store::touch_file) | Update only the refresh date and version |
/// | [`list_file_paths`](Store::list_file_paths) | Every stored path |
/// | [`get_embeddings`](Store::get_embeddings) | A file's rows ordered by chunk index |
/// | [`transaction`](Store::transaction) | Apply ops atomically, in order |
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_file(&self, path: &str) -> Result<Option<StoredFile>>;

    /// Stamp an unchanged file with this run's refresh info.
    async fn touch_file(&self, path: &str, refresh: &RefreshInfo) -> Result<()>;

    async fn list_file_paths(&self) -> Result<Vec<String>>;

    async fn count_files(&self) -> Result<i64>;

    async fn count_embeddings(&self) -> Result<i64>;

    async fn get_embeddings(&self, path: &str) -> Result<Vec<StoredEmbedding>>;

    /// Apply `ops` in order. Either all of them take effect or none do.
    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<()>;

    /// Release connections. Calling it more than once is harmless.
    async fn close(&self) {}
}
