//! Host automation surface: named inputs, status lines, failure reports.
//!
//! Inputs arrive as `INPUT_<NAME>` environment variables, with the name
//! upper-cased and spaces replaced by `_` (`docs-root-path` is read from
//! `INPUT_DOCS-ROOT-PATH`). Failures are reported with the `::error::`
//! workflow command.

use std::path::PathBuf;

use crate::config::Config;

pub const DOCS_ROOT_PATH_INPUT: &str = "docs-root-path";
pub const SHOULD_REFRESH_INPUT: &str = "should-refresh";

/// Environment variable name for input `name`.
pub fn input_env_name(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Trimmed value of input `name`; empty when unset.
pub fn get_input(name: &str) -> String {
    get_input_from(name, |key| std::env::var(key).ok())
}

fn get_input_from(name: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(&input_env_name(name))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Inputs for one sync run after applying precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub docs_root_path: PathBuf,
    pub should_refresh: bool,
}

impl RunInputs {
    /// CLI flag, then host input, then config.
    pub fn resolve(config: &Config, docs_root: Option<PathBuf>, refresh: bool) -> Self {
        Self::resolve_with(config, docs_root, refresh, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        config: &Config,
        docs_root: Option<PathBuf>,
        refresh: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let docs_root_path = docs_root.unwrap_or_else(|| {
            let input = get_input_from(DOCS_ROOT_PATH_INPUT, &lookup);
            if input.is_empty() {
                config.docs.root.clone()
            } else {
                PathBuf::from(input)
            }
        });
        let should_refresh = refresh || get_input_from(SHOULD_REFRESH_INPUT, &lookup) == "true";

        Self {
            docs_root_path,
            should_refresh,
        }
    }
}

/// Informational status line on stdout.
pub fn info(message: &str) {
    println!("{}", message);
}

/// Report a run failure to the host.
pub fn set_failed(message: &str) {
    println!("{}", error_command(message));
}

fn error_command(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
