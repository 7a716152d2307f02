//! Sync progress reporting.
//!
//! Progress is emitted on **stderr** so stdout stays reserved for the
//! host-facing status lines and command output.

use std::io::Write;

use clap::ValueEnum;
use docsync_core::progress::{NoProgress, SyncProgressEvent, SyncProgressReporter};

/// Human-friendly progress on stderr: "sync docs/  reconciling  12 / 140 files".
pub struct StderrProgress {
    label: String,
}

impl StderrProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Discovering { root } => format!("sync {}  discovering...\n", root),
            SyncProgressEvent::Reconciling { n, total } => format!(
                "sync {}  reconciling  {} / {} files\n",
                self.label,
                format_number(*n),
                format_number(*total)
            ),
            SyncProgressEvent::CleaningUp => format!("sync {}  cleaning up\n", self.label),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            SyncProgressEvent::Reconciling { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "reconciling",
                "n": n,
                "total": total
            }),
            SyncProgressEvent::CleaningUp => serde_json::json!({
                "event": "progress",
                "phase": "cleanup"
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self, label: &str) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress::new(label)),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
