//! # docsync CLI
//!
//! ## Usage
//!
//! ```bash
//! docsync [--config ./docsync.toml] [command]
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync` / `docsync sync` | Section the docs tree and sync the embedding store |
//! | `docsync init` | Create the SQLite database and schema |
//! | `docsync stats` | Show what the store holds |
//! | `docsync get <path>` | Print a stored file and its sections |
//! | `docsync sections <file>` | Parse one file and print its record as JSON |
//!
//! In CI the sync inputs can also come from `INPUT_DOCS-ROOT-PATH` and
//! `INPUT_SHOULD-REFRESH`; an explicit flag wins over both.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use docsync::action::{self, RunInputs};
use docsync::progress::ProgressMode;
use docsync::{config, get, migrate, sources, stats, sync};

#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Section markdown/MDX docs and keep an embedding store in sync",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Section the docs tree and reconcile it with the store (default).
    Sync {
        /// Docs root; overrides INPUT_DOCS-ROOT-PATH and `docs.root`.
        #[arg(long)]
        docs_root: Option<PathBuf>,

        /// Delete everything and re-embed every document.
        #[arg(long)]
        refresh: bool,
    },

    /// Initialize the database schema. Idempotent.
    Init,

    /// Show file, embedding and token totals.
    Stats,

    /// Print a stored file and its sections.
    Get {
        /// Docs-relative path, e.g. `guide/intro.mdx`.
        path: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Parse one markdown/MDX file and print its record as JSON.
    Sections {
        file: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run_sync(cli: &Cli, docs_root: Option<PathBuf>, refresh: bool) -> ExitCode {
    let outcome = async {
        let cfg = config::load_or_default(cli.config.as_deref())?;
        let inputs = RunInputs::resolve(&cfg, docs_root, refresh);
        let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
        sync::run(&cfg, &inputs, mode).await
    }
    .await;

    match outcome {
        Ok(summary) => {
            sync::print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            action::set_failed(&format!("Error: {}", err));
            tracing::error!("{:?}", err);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.as_ref();
    match command {
        None => return Ok(run_sync(&cli, None, false).await),
        Some(Commands::Sync { docs_root, refresh }) => {
            return Ok(run_sync(&cli, docs_root.clone(), *refresh).await);
        }
        Some(Commands::Sections { file }) => {
            let record = sources::load_document(file).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match command {
        Some(Commands::Init) => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Some(Commands::Stats) => {
            stats::run_stats(&cfg).await?;
        }
        Some(Commands::Get { path, json }) => {
            get::run_get(&cfg, path, *json).await?;
        }
        // Handled above (before config loading)
        None | Some(Commands::Sync { .. }) | Some(Commands::Sections { .. }) => {}
    }

    Ok(ExitCode::SUCCESS)
}
