//! Progress events emitted during a sync run.
//!
//! The reconciler reports through [`SyncProgressReporter`]; the app crate
//! decides whether that means human text on stderr, JSON lines, or nothing.

/// A single progress event for sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncProgressEvent {
    /// Walking the docs root. Total unknown.
    Discovering { root: String },
    /// `n` of `total` documents reconciled so far.
    Reconciling { n: u64, total: u64 },
    /// Removing stored files that are no longer on disk.
    CleaningUp,
}

/// Receives progress events from the sync pipeline.
pub trait SyncProgressReporter: Send + Sync {
    fn report(&self, event: SyncProgressEvent);
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}
