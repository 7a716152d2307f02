//! TOML configuration.
//!
//! Every section and field is optional; a missing file section falls back
//! to the defaults below. [`load_config`] parses and validates a file,
//! [`Config::default`] is used when no `--config` is given.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/docsync.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_docs_root")]
    pub root: PathBuf,
    /// Docs-relative paths skipped by exact match.
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_follow_symlinks")]
    pub follow_symlinks: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: default_docs_root(),
            ignored_files: default_ignored_files(),
            exclude_globs: Vec::new(),
            follow_symlinks: default_follow_symlinks(),
        }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("docs/")
}
fn default_ignored_files() -> Vec<String> {
    vec!["pages/404.mdx".to_string()]
}
fn default_follow_symlinks() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// End-user identifier sent with every request.
    #[serde(default = "default_user")]
    pub user: String,
    /// USD per 1K tokens, used for cost estimates only.
    #[serde(default = "default_pricing")]
    pub pricing: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Maximum inputs per HTTP request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            user: default_user(),
            pricing: default_pricing(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_user() -> String {
    "user-id".to_string()
}
fn default_pricing() -> f64 {
    0.00002
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    2048
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Documents reconciled concurrently per batch.
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_sync_batch_size(),
        }
    }
}

fn default_sync_batch_size() -> usize {
    docsync_core::reconcile::DEFAULT_BATCH_SIZE
}

impl EmbeddingConfig {
    /// Estimated USD cost of `tokens`.
    pub fn estimate_cost(&self, tokens: u64) -> f64 {
        tokens as f64 / 1000.0 * self.pricing
    }
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` when given, otherwise use defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.sync.batch_size == 0 {
        bail!("sync.batch_size must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.provider != "openai" {
        bail!(
            "Unknown embedding provider: '{}'. Must be openai.",
            config.embedding.provider
        );
    }
    Ok(())
}
