//! Download service types and events.

use std::path::PathBuf;

use crate::http_client::RetryPolicy;

/// Events emitted during download operations.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Batch prepared; `pending` entries will be fetched.
    Queued { pending: usize, skipped: usize },
    /// Fetch started for an entry
    Started {
        worker_id: usize,
        url: String,
        local_path: String,
    },
    /// A transient failure; the entry will be fetched again
    Retrying {
        worker_id: usize,
        url: String,
        attempt: u32,
        error: String,
    },
    /// File written and recorded in the download state
    Saved {
        worker_id: usize,
        url: String,
        local_path: String,
        bytes: u64,
    },
    /// Download failed
    Failed {
        worker_id: usize,
        url: String,
        error: String,
    },
}

/// Result of a download operation.
#[derive(Debug, Default)]
pub struct DownloadResult {
    pub downloaded: usize,
    /// Entries already present in the download state.
    pub skipped: usize,
    pub failed: usize,
    /// Archive URLs of failed entries, for a later rerun.
    pub failed_urls: Vec<String>,
}

/// Configuration for download service.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub backup_dir: PathBuf,
    pub workers: usize,
    /// Maximum number of files saved in one run.
    pub limit: Option<usize>,
    pub retry: RetryPolicy,
    /// Strip non-essential `<meta>` tags from saved HTML.
    pub prune_meta: bool,
}
