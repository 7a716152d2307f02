//! Turning a docs directory into [`DocumentRecord`]s.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use docsync_core::models::{DocumentRecord, FileRef};

use crate::config::DocsConfig;
use crate::walk::walk;

fn markdown_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.mdx?$").expect("markdown suffix regex is valid"))
}

/// Walk `root`, keep `.md`/`.mdx` files not excluded by `docs`, and build a
/// record for each one.
///
/// Files are read and parsed concurrently; the result keeps the walker's
/// sorted order. Paths in the records are relative to `root` and use `/`.
pub async fn generate_markdown_sources(root: &Path, docs: &DocsConfig) -> Result<Vec<DocumentRecord>> {
    let exclude_set = build_globset(&docs.exclude_globs)?;

    let files: Vec<(FileRef, String)> = walk(root, docs.follow_symlinks)?
        .into_iter()
        .map(|file| {
            let rel = relative_path(root, &file.path);
            (file, rel)
        })
        .filter(|(_, rel)| markdown_suffix().is_match(rel))
        .filter(|(_, rel)| !docs.ignored_files.iter().any(|ignored| ignored == rel))
        .filter(|(_, rel)| !exclude_set.is_match(rel))
        .collect();

    debug!(count = files.len(), root = %root.display(), "markdown files matched");

    try_join_all(files.into_iter().map(|(file, rel)| async move {
        let content = tokio::fs::read_to_string(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let parent = file.parent_path.as_deref().map(|p| relative_path(root, p));
        DocumentRecord::from_source(rel, parent, content)
    }))
    .await
}

/// Read and section a single file, outside of any docs tree.
pub async fn load_document(path: &Path) -> Result<DocumentRecord> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    DocumentRecord::from_source(path.to_string_lossy().replace('\\', "/"), None, content)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid exclude glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.mdx", "export const meta = { title: \"Home\" };\n\n# Home\n\nWelcome.");
        write(dir.path(), "guide.md", "# Guide\n\nSteps.");
        write(dir.path(), "guide/install.md", "# Install\n\nRun it.");
        write(dir.path(), "pages/404.mdx", "# Not found");
        write(dir.path(), "notes.txt", "not markdown");
        write(dir.path(), "drafts/wip.md", "# WIP");
        dir
    }

    #[tokio::test]
    async fn filters_and_orders_records() {
        let dir = fixture();
        let records = generate_markdown_sources(dir.path(), &DocsConfig::default())
            .await
            .unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["drafts/wip.md", "guide.md", "guide/install.md", "index.mdx"]);

        let home = records.iter().find(|r| r.path == "index.mdx").unwrap();
        assert_eq!(home.meta.as_ref().unwrap()["title"], "Home");
        assert_eq!(home.sections[0].slug, "home");
    }

    #[tokio::test]
    async fn applies_exclude_globs() {
        let dir = fixture();
        let docs = DocsConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..DocsConfig::default()
        };
        let records = generate_markdown_sources(dir.path(), &docs).await.unwrap();
        assert!(records.iter().all(|r| !r.path.starts_with("drafts/")));
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn ignored_files_are_exact_matches() {
        let dir = fixture();
        let docs = DocsConfig {
            ignored_files: vec!["guide.md".to_string()],
            ..DocsConfig::default()
        };
        let records = generate_markdown_sources(dir.path(), &docs).await.unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert!(paths.contains(&"pages/404.mdx"));
        assert!(paths.contains(&"guide/install.md"));
        assert!(!paths.contains(&"guide.md"));
    }

    #[tokio::test]
    async fn parent_paths_are_relative() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "api.mdx", "# API");
        write(dir.path(), "api/auth.mdx", "# Auth");
        let records = generate_markdown_sources(dir.path(), &DocsConfig::default())
            .await
            .unwrap();
        let auth = records.iter().find(|r| r.path == "api/auth.mdx").unwrap();
        assert_eq!(auth.parent_path.as_deref(), Some("api.mdx"));
    }

    #[tokio::test]
    async fn invalid_mdx_fails_the_run() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.mdx", "<Callout>\n\nnever closed");
        let err = generate_markdown_sources(dir.path(), &DocsConfig::default())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("broken.mdx"));
    }
}
