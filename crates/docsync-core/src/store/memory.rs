//! In-memory [`Store`] implementation for tests.
//!
//! State lives in `BTreeMap`s behind a `std::sync::RwLock`. A transaction
//! applies its ops to a clone of the state and swaps it in only when every
//! op succeeded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{RefreshInfo, StoredEmbedding, StoredFile};

use super::{Store, StoreOp};

#[derive(Debug, Clone, Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    /// Keyed by `(file_path, chunk_index)`.
    embeddings: BTreeMap<(String, i64), StoredEmbedding>,
}

/// In-memory store for testing.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    fail_transactions: AtomicBool,
    transactions: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later [`Store::transaction`] fail without applying anything.
    pub fn set_fail_transactions(&self, fail: bool) {
        self.fail_transactions.store(fail, Ordering::SeqCst);
    }

    /// Number of transactions committed so far.
    pub fn transaction_count(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

fn apply(state: &mut State, op: StoreOp) -> Result<()> {
    match op {
        StoreOp::DeleteEmbeddings(scope) => {
            state.embeddings.retain(|(path, _), _| !scope.contains(path));
        }
        StoreOp::DeleteFiles(scope) => {
            if let Some(path) = state
                .embeddings
                .keys()
                .map(|(path, _)| path)
                .find(|path| scope.contains(path))
            {
                bail!("cannot delete file {}: embeddings still reference it", path);
            }
            state.files.retain(|path, _| !scope.contains(path));
        }
        StoreOp::UpsertFile(upsert) => {
            state.files.insert(
                upsert.path.clone(),
                StoredFile {
                    file_path: upsert.path,
                    content: upsert.content,
                    file_hash: upsert.file_hash,
                    parent_path: upsert.parent_path,
                    meta: upsert.meta,
                    latest_refresh: upsert.refresh.date,
                    latest_version: upsert.refresh.version,
                    tokens: upsert.tokens,
                },
            );
        }
        StoreOp::CreateEmbeddings(rows) => {
            for row in rows {
                if !state.files.contains_key(&row.file_path) {
                    bail!("embedding references unknown file {}", row.file_path);
                }
                let key = (row.file_path.clone(), row.chunk_index);
                if state.embeddings.contains_key(&key) {
                    bail!(
                        "duplicate embedding {}#{}",
                        row.file_path,
                        row.chunk_index
                    );
                }
                state.embeddings.insert(key, row);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_file(&self, path: &str) -> Result<Option<StoredFile>> {
        Ok(self.read()?.files.get(path).cloned())
    }

    async fn touch_file(&self, path: &str, refresh: &RefreshInfo) -> Result<()> {
        let mut state = self.write()?;
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| anyhow!("file not found: {}", path))?;
        file.latest_refresh = refresh.date;
        file.latest_version = refresh.version.clone();
        Ok(())
    }

    async fn list_file_paths(&self) -> Result<Vec<String>> {
        Ok(self.read()?.files.keys().cloned().collect())
    }

    async fn count_files(&self) -> Result<i64> {
        Ok(self.read()?.files.len() as i64)
    }

    async fn count_embeddings(&self) -> Result<i64> {
        Ok(self.read()?.embeddings.len() as i64)
    }

    async fn get_embeddings(&self, path: &str) -> Result<Vec<StoredEmbedding>> {
        let state = self.read()?;
        Ok(state
            .embeddings
            .values()
            .filter(|row| row.file_path == path)
            .cloned()
            .collect())
    }

    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<()> {
        if self.fail_transactions.load(Ordering::SeqCst) {
            bail!("transaction rejected");
        }

        let mut state = self.write()?;
        let mut draft = state.clone();
        for op in ops {
            apply(&mut draft, op)?;
        }
        *state = draft;
        self.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileUpsert, PathScope};
    use chrono::{TimeZone, Utc};

    fn refresh(version: &str) -> RefreshInfo {
        RefreshInfo {
            version: version.into(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn upsert(path: &str) -> StoreOp {
        StoreOp::UpsertFile(FileUpsert {
            path: path.into(),
            content: "# A".into(),
            file_hash: "hash".into(),
            parent_path: None,
            meta: None,
            refresh: refresh("v1"),
            tokens: 3,
        })
    }

    fn row(path: &str, index: i64) -> StoredEmbedding {
        StoredEmbedding {
            file_path: path.into(),
            chunk_index: index,
            header: "A".into(),
            slug: "a".into(),
            content: "# A".into(),
            embedding: vec![0.5, 0.25],
        }
    }

    #[tokio::test]
    async fn upsert_then_find() {
        let store = InMemoryStore::new();
        store
            .transaction(vec![upsert("a.md"), StoreOp::CreateEmbeddings(vec![row("a.md", 0)])])
            .await
            .unwrap();

        let file = store.find_file("a.md").await.unwrap().unwrap();
        assert_eq!(file.file_hash, "hash");
        assert_eq!(file.tokens, 3);
        assert_eq!(store.get_embeddings("a.md").await.unwrap().len(), 1);
        assert!(store.find_file("b.md").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_op_rolls_back_whole_transaction() {
        let store = InMemoryStore::new();
        let err = store
            .transaction(vec![
                upsert("a.md"),
                StoreOp::CreateEmbeddings(vec![row("missing.md", 0)]),
            ])
            .await;
        assert!(err.is_err());
        assert_eq!(store.count_files().await.unwrap(), 0);
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn deleting_files_with_live_embeddings_fails() {
        let store = InMemoryStore::new();
        store
            .transaction(vec![upsert("a.md"), StoreOp::CreateEmbeddings(vec![row("a.md", 0)])])
            .await
            .unwrap();

        let result = store
            .transaction(vec![StoreOp::DeleteFiles(PathScope::All)])
            .await;
        assert!(result.is_err());

        store
            .transaction(vec![
                StoreOp::DeleteEmbeddings(PathScope::Only(vec!["a.md".into()])),
                StoreOp::DeleteFiles(PathScope::Only(vec!["a.md".into()])),
            ])
            .await
            .unwrap();
        assert_eq!(store.count_files().await.unwrap(), 0);
        assert_eq!(store.count_embeddings().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn touch_updates_refresh_only() {
        let store = InMemoryStore::new();
        store.transaction(vec![upsert("a.md")]).await.unwrap();
        store.touch_file("a.md", &refresh("v2")).await.unwrap();

        let file = store.find_file("a.md").await.unwrap().unwrap();
        assert_eq!(file.latest_version, "v2");
        assert_eq!(file.file_hash, "hash");
        assert!(store.touch_file("nope.md", &refresh("v2")).await.is_err());
    }

    #[tokio::test]
    async fn fail_switch_rejects_transactions() {
        let store = InMemoryStore::new();
        store.set_fail_transactions(true);
        assert!(store.transaction(vec![upsert("a.md")]).await.is_err());
        assert_eq!(store.count_files().await.unwrap(), 0);
    }
}
