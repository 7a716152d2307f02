//! The `sync` run: validate inputs, build document records, reconcile them
//! with the store, and report the outcome to the host.

use anyhow::{bail, Result};
use chrono::Utc;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use docsync_core::embedding::Embedder;
use docsync_core::models::RefreshInfo;
use docsync_core::progress::{SyncProgressEvent, SyncProgressReporter};
use docsync_core::reconcile::{Reconciler, SyncReport};
use docsync_core::store::Store;

use crate::action::{self, RunInputs};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::progress::ProgressMode;
use crate::sources::generate_markdown_sources;
use crate::sqlite_store::SqliteStore;

/// Placeholder some CI setups export when no commit is available.
const NO_SHA: &str = "NO_SHA_FOUND";

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub files_found: usize,
    pub report: SyncReport,
    pub refresh: RefreshInfo,
    pub duration: Duration,
    pub estimated_cost: f64,
}

/// Fail unless `root` is an accessible directory.
pub async fn validate_inputs(root: &Path) -> Result<()> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => bail!(
            "Invalid docs-root-path: {}. Directory does not exist or is not accessible.",
            root.display()
        ),
    }
}

/// Version tag for this run: the commit SHA when known, otherwise a random UUID.
pub fn generate_version_info() -> RefreshInfo {
    version_info_from(std::env::var("GITHUB_SHA").ok())
}

fn version_info_from(sha: Option<String>) -> RefreshInfo {
    let version = sha
        .filter(|sha| !sha.is_empty() && sha != NO_SHA)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    RefreshInfo {
        version,
        date: Utc::now(),
    }
}

/// Prints the host-facing cleanup notice, then forwards to `inner`.
struct HostNotices<'a> {
    inner: &'a dyn SyncProgressReporter,
}

impl SyncProgressReporter for HostNotices<'_> {
    fn report(&self, event: SyncProgressEvent) {
        if event == SyncProgressEvent::CleaningUp {
            action::info("Cleaning up orphaned data");
        }
        self.inner.report(event);
    }
}

/// Run a sync against an already-open store and embedder.
pub async fn execute(
    config: &Config,
    inputs: &RunInputs,
    store: &dyn Store,
    embedder: &dyn Embedder,
    progress: &dyn SyncProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let root = &inputs.docs_root_path;

    validate_inputs(root).await?;

    let refresh = generate_version_info();
    debug!(version = %refresh.version, "refresh version");

    progress.report(SyncProgressEvent::Discovering {
        root: root.display().to_string(),
    });
    let records = generate_markdown_sources(root, &config.docs).await?;
    action::info(&format!("Found {} markdown files to process", records.len()));

    if inputs.should_refresh {
        action::info("Refreshing all embeddings");
    }

    let notices = HostNotices { inner: progress };
    let reconciler =
        Reconciler::new(store, embedder, &notices).with_batch_size(config.sync.batch_size);
    let report = reconciler
        .run(&records, inputs.should_refresh, &refresh)
        .await?;

    info!(
        new = report.new,
        changed = report.changed,
        unchanged = report.unchanged,
        orphans = report.orphans_removed,
        "sync finished"
    );

    Ok(RunSummary {
        files_found: records.len(),
        estimated_cost: config.embedding.estimate_cost(report.tokens),
        report,
        refresh,
        duration: start.elapsed(),
    })
}

/// Open the SQLite store and OpenAI client, run, and close the store.
pub async fn run(config: &Config, inputs: &RunInputs, mode: ProgressMode) -> Result<RunSummary> {
    validate_inputs(&inputs.docs_root_path).await?;

    let store = SqliteStore::connect(config).await?;
    let result = async {
        let embedder = create_embedder(&config.embedding)?;
        let progress = mode.reporter(&inputs.docs_root_path.display().to_string());
        execute(config, inputs, &store, embedder.as_ref(), progress.as_ref()).await
    }
    .await;
    store.close().await;
    result
}

/// Host-facing summary lines.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let report = &summary.report;
    vec![
        "Embedding generation completed successfully".to_string(),
        format!(
            "\nSummary:\n- Files processed: {}\n- Errors encountered: {}\n- Total duration: {:.2} seconds\n",
            report.files_processed,
            0,
            summary.duration.as_secs_f64()
        ),
        format!(
            "- New: {}, changed: {}, unchanged: {}, orphans removed: {}",
            report.new, report.changed, report.unchanged, report.orphans_removed
        ),
        format!(
            "- Tokens used: {} (estimated cost ${:.6})",
            report.tokens, summary.estimated_cost
        ),
        format!(
            "- Stored: {} files, {} embeddings (version {})",
            report.files_total, report.embeddings_total, summary.refresh.version
        ),
    ]
}

pub fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        action::info(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docsync_core::embedding::EmbedResponse;
    use docsync_core::progress::NoProgress;
    use docsync_core::store::memory::InMemoryStore;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_many(&self, values: &[String]) -> Result<EmbedResponse> {
            Ok(EmbedResponse {
                embeddings: values.iter().map(|v| vec![v.len() as f32]).collect(),
                tokens: 10 * values.len() as u64,
            })
        }
    }

    fn inputs(root: PathBuf, refresh: bool) -> RunInputs {
        RunInputs {
            docs_root_path: root,
            should_refresh: refresh,
        }
    }

    #[test]
    fn version_prefers_commit_sha() {
        assert_eq!(version_info_from(Some("abc123".into())).version, "abc123");
    }

    #[test]
    fn version_falls_back_to_uuid() {
        for sha in [None, Some(NO_SHA.to_string()), Some(String::new())] {
            let version = version_info_from(sha).version;
            assert!(Uuid::parse_str(&version).is_ok(), "not a uuid: {}", version);
        }
    }

    #[tokio::test]
    async fn missing_root_is_rejected_with_host_message() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = validate_inputs(&missing).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Invalid docs-root-path: {}. Directory does not exist or is not accessible.",
                missing.display()
            )
        );
    }

    #[tokio::test]
    async fn execute_reconciles_and_summarizes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "# A\n\nalpha\n\n# B\n\nbeta").unwrap();
        fs::write(dir.path().join("b.md"), "# C").unwrap();

        let store = InMemoryStore::new();
        let config = Config::default();
        let summary = execute(
            &config,
            &inputs(dir.path().to_path_buf(), false),
            &store,
            &LengthEmbedder,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.files_found, 2);
        assert_eq!(summary.report.new, 2);
        assert_eq!(summary.report.tokens, 30);
        assert_eq!(summary.report.embeddings_total, 3);
        assert!((summary.estimated_cost - 30.0 / 1000.0 * 0.00002).abs() < 1e-15);

        let lines = summary_lines(&summary);
        assert_eq!(lines[0], "Embedding generation completed successfully");
        assert!(lines[1].contains("- Files processed: 2"));
        assert!(lines[1].contains("- Errors encountered: 0"));
    }

    #[tokio::test]
    async fn execute_fails_on_missing_root() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let result = execute(
            &Config::default(),
            &inputs(dir.path().join("missing"), false),
            &store,
            &LengthEmbedder,
            &NoProgress,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(store.transaction_count(), 0);
    }
}
