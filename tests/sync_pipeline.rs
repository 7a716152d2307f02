//! End-to-end sync runs through the library: real docs tree on disk, SQLite
//! store in a temp dir, deterministic embedder.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use docsync::action::RunInputs;
use docsync::config::Config;
use docsync::sqlite_store::SqliteStore;
use docsync::sync::execute;
use docsync_core::embedding::{EmbedResponse, Embedder};
use docsync_core::progress::NoProgress;
use docsync_core::store::Store;

/// `[len, first byte]` per input, one token per input.
#[derive(Default)]
struct DeterministicEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    fn model_name(&self) -> &str {
        "deterministic"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed_many(&self, values: &[String]) -> Result<EmbedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbedResponse {
            embeddings: values
                .iter()
                .map(|v| vec![v.len() as f32, v.bytes().next().unwrap_or(0) as f32])
                .collect(),
            tokens: values.len() as u64,
        })
    }
}

struct Fixture {
    _tmp: TempDir,
    docs: std::path::PathBuf,
    config: Config,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();

    fs::write(
        docs.join("getting-started.md"),
        "# Getting Started\n\nInstall the CLI.\n\n## Configuration\n\nCreate a config file.",
    )
    .unwrap();
    fs::write(
        docs.join("api-docs.md"),
        "# API\n\nThe REST API.\n\n## Authentication\n\nUse a bearer token.\n\n## Endpoints\n\nGET /items",
    )
    .unwrap();
    fs::write(
        docs.join("troubleshooting.md"),
        "# Troubleshooting\n\nCommon problems and fixes.",
    )
    .unwrap();

    let mut config = Config::default();
    config.db.path = tmp.path().join("data/docsync.sqlite");
    config.docs.root = docs.clone();

    Fixture {
        _tmp: tmp,
        docs,
        config,
    }
}

fn inputs(docs: &Path, refresh: bool) -> RunInputs {
    RunInputs {
        docs_root_path: docs.to_path_buf(),
        should_refresh: refresh,
    }
}

#[tokio::test]
async fn first_run_stores_every_file_with_embeddings() {
    let fx = fixture();
    let store = SqliteStore::connect(&fx.config).await.unwrap();
    let embedder = DeterministicEmbedder::default();

    let summary = execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.files_found, 3);
    assert_eq!(summary.report.new, 3);
    assert_eq!(store.count_files().await.unwrap(), 3);
    for path in ["getting-started.md", "api-docs.md", "troubleshooting.md"] {
        assert!(
            !store.get_embeddings(path).await.unwrap().is_empty(),
            "no embeddings for {}",
            path
        );
    }
    assert_eq!(store.count_embeddings().await.unwrap(), 6);
}

#[tokio::test]
async fn unchanged_rerun_does_not_embed() {
    let fx = fixture();
    let store = SqliteStore::connect(&fx.config).await.unwrap();
    let embedder = DeterministicEmbedder::default();

    execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();
    let calls = embedder.calls.load(Ordering::SeqCst);
    let before = store.get_embeddings("api-docs.md").await.unwrap();

    let summary = execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.report.unchanged, 3);
    assert_eq!(summary.report.tokens, 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
    assert_eq!(store.get_embeddings("api-docs.md").await.unwrap(), before);
}

#[tokio::test]
async fn append_then_refresh_grows_embeddings_and_aligns_refresh_dates() {
    let fx = fixture();
    let store = SqliteStore::connect(&fx.config).await.unwrap();
    let embedder = DeterministicEmbedder::default();

    execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();
    let before = store.count_embeddings().await.unwrap();

    let path = fx.docs.join("troubleshooting.md");
    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("\n\n## Network errors\n\nCheck the proxy settings.");
    fs::write(&path, text).unwrap();

    let summary = execute(&fx.config, &inputs(&fx.docs, true), &store, &embedder, &NoProgress)
        .await
        .unwrap();
    assert_eq!(summary.report.new, 3);
    assert!(store.count_embeddings().await.unwrap() > before);

    let mut dates = Vec::new();
    for path in store.list_file_paths().await.unwrap() {
        let file = store.find_file(&path).await.unwrap().unwrap();
        dates.push(file.latest_refresh);
    }
    assert_eq!(dates.len(), 3);
    assert!(dates.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn edited_file_rows_are_fully_replaced() {
    let fx = fixture();
    let store = SqliteStore::connect(&fx.config).await.unwrap();
    let embedder = DeterministicEmbedder::default();

    execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();
    assert_eq!(store.get_embeddings("api-docs.md").await.unwrap().len(), 3);

    fs::write(fx.docs.join("api-docs.md"), "# API\n\nNow a single section.").unwrap();
    let summary = execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();
    assert_eq!(summary.report.changed, 1);
    assert_eq!(summary.report.unchanged, 2);

    let rows = store.get_embeddings("api-docs.md").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].chunk_index, 0);
    assert_eq!(rows[0].slug, "api");
}

#[tokio::test]
async fn deleted_file_is_removed_as_orphan() {
    let fx = fixture();
    let store = SqliteStore::connect(&fx.config).await.unwrap();
    let embedder = DeterministicEmbedder::default();

    execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();

    fs::remove_file(fx.docs.join("getting-started.md")).unwrap();
    let summary = execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.report.orphans_removed, 1);
    assert_eq!(
        store.list_file_paths().await.unwrap(),
        vec!["api-docs.md", "troubleshooting.md"]
    );
    assert!(store
        .get_embeddings("getting-started.md")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn mdx_metadata_and_parent_path_are_persisted() {
    let fx = fixture();
    fs::write(
        fx.docs.join("guides.mdx"),
        "export const meta = { title: \"Guides\", order: 1 };\n\n# Guides\n\nAll guides.",
    )
    .unwrap();
    fs::create_dir_all(fx.docs.join("guides")).unwrap();
    fs::write(
        fx.docs.join("guides/deploy.mdx"),
        "# Deploy [#deploying]\n\n<Callout>Read first</Callout>\n\nShip it.",
    )
    .unwrap();

    let store = SqliteStore::connect(&fx.config).await.unwrap();
    let embedder = DeterministicEmbedder::default();
    execute(&fx.config, &inputs(&fx.docs, false), &store, &embedder, &NoProgress)
        .await
        .unwrap();

    let guides = store.find_file("guides.mdx").await.unwrap().unwrap();
    let meta = guides.meta.unwrap();
    assert_eq!(meta["title"], "Guides");
    assert_eq!(meta["order"], 1);

    let deploy = store.find_file("guides/deploy.mdx").await.unwrap().unwrap();
    assert_eq!(deploy.parent_path.as_deref(), Some("guides.mdx"));
    let rows = store.get_embeddings("guides/deploy.mdx").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].header, "Deploy");
    assert_eq!(rows[0].slug, "deploying");
    assert_eq!(rows[0].content, "# Deploy [#deploying]\n\nShip it.");
}
