//! Checksum-driven reconciliation of document records against a [`Store`].
//!
//! Each document is classified by comparing its checksum with the stored
//! hash:
//!
//! | State | Effect |
//! |-------|--------|
//! | New | embed every section; upsert file; insert rows |
//! | Changed | embed every section; delete old rows; upsert file; insert rows |
//! | Unchanged | stamp `latest_refresh` / `latest_version` only |
//!
//! The writes for New and Changed land in one [`Store::transaction`], so a
//! failure leaves the file's previous rows untouched. Files whose path is no
//! longer produced by the walker are removed afterwards by
//! [`cleanup_orphaned_data`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Result};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::models::{DocumentRecord, RefreshInfo, Section, StoredEmbedding};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::store::{FileUpsert, PathScope, Store, StoreOp};

/// Default number of documents reconciled concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Result of looking a path up in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumComparison {
    pub is_file_found: bool,
    /// `None` when the file was not found.
    pub is_file_changed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    New,
    Changed,
    Unchanged,
}

impl ChecksumComparison {
    pub fn state(&self) -> FileState {
        match (self.is_file_found, self.is_file_changed) {
            (false, _) => FileState::New,
            (true, Some(false)) => FileState::Unchanged,
            (true, _) => FileState::Changed,
        }
    }
}

/// What happened to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOutcome {
    pub state: FileState,
    pub tokens: u64,
}

/// Totals for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub files_processed: u64,
    pub new: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub orphans_removed: u64,
    pub tokens: u64,
    pub embeddings_total: i64,
    pub files_total: i64,
}

impl SyncReport {
    fn record(&mut self, outcome: FileOutcome) {
        self.files_processed += 1;
        self.tokens += outcome.tokens;
        match outcome.state {
            FileState::New => self.new += 1,
            FileState::Changed => self.changed += 1,
            FileState::Unchanged => self.unchanged += 1,
        }
    }
}

/// Classify `path` by comparing `hash` with the stored file hash.
pub async fn compare_checksum(store: &dyn Store, path: &str, hash: &str) -> Result<ChecksumComparison> {
    let comparison = match store.find_file(path).await? {
        None => ChecksumComparison {
            is_file_found: false,
            is_file_changed: None,
        },
        Some(file) => ChecksumComparison {
            is_file_found: true,
            is_file_changed: Some(file.file_hash != hash),
        },
    };
    Ok(comparison)
}

/// Embed sections in slug order.
///
/// Returns the sorted sections, their vectors at the same positions, and
/// the token usage. An empty slice makes no embedder call.
pub async fn embed_sections(
    embedder: &dyn Embedder,
    sections: &[Section],
) -> Result<(Vec<Section>, Vec<Vec<f32>>, u64)> {
    if sections.is_empty() {
        return Ok((Vec::new(), Vec::new(), 0));
    }

    let mut sorted = sections.to_vec();
    sorted.sort_by(|a, b| a.slug.cmp(&b.slug));

    let values: Vec<String> = sorted.iter().map(|s| s.content.clone()).collect();
    let response = embedder.embed_many(&values).await?;

    if response.embeddings.len() != sorted.len() {
        bail!(
            "embedder returned {} vectors for {} sections",
            response.embeddings.len(),
            sorted.len()
        );
    }

    Ok((sorted, response.embeddings, response.tokens))
}

/// Reconcile a single document with the store.
pub async fn process_file(
    store: &dyn Store,
    embedder: &dyn Embedder,
    record: &DocumentRecord,
    refresh: &RefreshInfo,
) -> Result<FileOutcome> {
    let comparison = compare_checksum(store, &record.path, &record.checksum).await?;
    let state = comparison.state();

    if state == FileState::Unchanged {
        debug!(path = %record.path, "unchanged, refreshing timestamp");
        store.touch_file(&record.path, refresh).await?;
        return Ok(FileOutcome { state, tokens: 0 });
    }

    debug!(path = %record.path, ?state, sections = record.sections.len(), "embedding");
    let (sections, vectors, tokens) = embed_sections(embedder, &record.sections).await?;

    let rows: Vec<StoredEmbedding> = sections
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (section, embedding))| StoredEmbedding {
            file_path: record.path.clone(),
            chunk_index: index as i64,
            header: section.heading,
            slug: section.slug,
            content: section.content,
            embedding,
        })
        .collect();

    let mut ops = Vec::with_capacity(3);
    if state == FileState::Changed {
        ops.push(StoreOp::DeleteEmbeddings(PathScope::Only(vec![record.path.clone()])));
    }
    ops.push(StoreOp::UpsertFile(FileUpsert {
        path: record.path.clone(),
        content: record.content.clone(),
        file_hash: record.checksum.clone(),
        parent_path: record.parent_path.clone(),
        meta: record.meta.clone(),
        refresh: refresh.clone(),
        tokens: tokens as i64,
    }));
    if !rows.is_empty() {
        ops.push(StoreOp::CreateEmbeddings(rows));
    }

    store.transaction(ops).await?;
    Ok(FileOutcome { state, tokens })
}

/// Reconcile one batch concurrently. Outcomes come back in input order and
/// the first failure fails the whole batch. `on_file_done` runs after each
/// file completes.
pub async fn process_batch(
    store: &dyn Store,
    embedder: &dyn Embedder,
    batch: &[DocumentRecord],
    refresh_info: &RefreshInfo,
    on_file_done: &(dyn Fn() + Sync),
) -> Result<Vec<FileOutcome>> {
    try_join_all(batch.iter().map(|record| async move {
        let outcome = process_file(store, embedder, record, refresh_info).await?;
        on_file_done();
        Ok::<_, anyhow::Error>(outcome)
    }))
    .await
}

/// Delete every stored file (and its embeddings) whose path is not in
/// `current_paths`. Returns the removed paths.
pub async fn cleanup_orphaned_data(store: &dyn Store, current_paths: &[&str]) -> Result<Vec<String>> {
    let current: HashSet<&str> = current_paths.iter().copied().collect();
    let orphans: Vec<String> = store
        .list_file_paths()
        .await?
        .into_iter()
        .filter(|path| !current.contains(path.as_str()))
        .collect();

    if orphans.is_empty() {
        return Ok(orphans);
    }

    info!(count = orphans.len(), "removing orphaned files");
    store
        .transaction(vec![
            StoreOp::DeleteEmbeddings(PathScope::Only(orphans.clone())),
            StoreOp::DeleteFiles(PathScope::Only(orphans.clone())),
        ])
        .await?;
    Ok(orphans)
}

/// Delete every file and embedding row.
pub async fn refresh_all(store: &dyn Store) -> Result<()> {
    store
        .transaction(vec![
            StoreOp::DeleteEmbeddings(PathScope::All),
            StoreOp::DeleteFiles(PathScope::All),
        ])
        .await
}

/// Drives a whole run: optional reset, batched per-file reconciliation,
/// then orphan cleanup.
pub struct Reconciler<'a> {
    store: &'a dyn Store,
    embedder: &'a dyn Embedder,
    batch_size: usize,
    progress: &'a dyn SyncProgressReporter,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn Store,
        embedder: &'a dyn Embedder,
        progress: &'a dyn SyncProgressReporter,
    ) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            progress,
        }
    }

    /// Documents reconciled concurrently per batch. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Reconcile `records` with the store.
    ///
    /// With `refresh` set, every stored row is deleted first and orphan
    /// cleanup is skipped. Batches run one after another; files within a
    /// batch run concurrently. The first error aborts the run, leaving
    /// earlier batches committed.
    pub async fn run(
        &self,
        records: &[DocumentRecord],
        refresh: bool,
        refresh_info: &RefreshInfo,
    ) -> Result<SyncReport> {
        if refresh {
            info!("deleting all stored files and embeddings");
            refresh_all(self.store).await?;
        }

        let total = records.len() as u64;
        let done = AtomicU64::new(0);
        let mut report = SyncReport::default();

        let on_file_done = || {
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress.report(SyncProgressEvent::Reconciling { n, total });
        };

        for batch in records.chunks(self.batch_size) {
            let outcomes =
                process_batch(self.store, self.embedder, batch, refresh_info, &on_file_done).await?;
            for outcome in outcomes {
                report.record(outcome);
            }
        }

        if !refresh {
            self.progress.report(SyncProgressEvent::CleaningUp);
            let current: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
            let removed = cleanup_orphaned_data(self.store, &current).await?;
            report.orphans_removed = removed.len() as u64;
        }

        report.files_total = self.store.count_files().await?;
        report.embeddings_total = self.store.count_embeddings().await?;
        Ok(report)
    }
}
