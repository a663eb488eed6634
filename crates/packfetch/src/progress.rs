//! Progress tracking and reporting for resolution and sync operations

use std::sync::Arc;

/// Progress callback shared by the resolver and the sync engine
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while resolving a manifest or syncing a resolved set
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ResolveStarted {
        entries: usize,
    },
    ModResolved {
        slug: String,
        name: String,
        id: u32,
    },
    DependencyResolved {
        slug: String,
        name: String,
    },
    ModLeftBehind {
        slug: String,
    },
    SyncStarted {
        to_download: usize,
        total: usize,
    },
    DownloadStarted {
        name: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        name: String,
        downloaded: u64,
        total: Option<u64>,
    },
    DownloadComplete {
        name: String,
        final_size: u64,
    },
    RetryAttempt {
        name: String,
        attempt: usize,
        max_attempts: usize,
    },
    TaskFailed {
        name: String,
        error: String,
    },
}

/// Emit an event through an optional callback
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
