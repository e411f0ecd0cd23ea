//! Snapshot index acquisition.
//!
//! A [`SnapshotSource`] lists what the archive holds for a site; the
//! [`index`] module layers the on-disk `.cdx.json` cache on top of it so
//! reruns do not hit the CDX API again.

pub mod cdx;
pub mod index;
mod wayback;

pub use index::{load_or_fetch, SnapshotCache, CDX_CACHE_FILE};
pub use wayback::WaybackSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_client::FetchError;

/// Errors that can occur when querying the archive index.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("HTTP error: {0}")]
    Http(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One archived capture of a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    /// 14-digit capture timestamp (`YYYYMMDDhhmmss`).
    pub timestamp: String,
    /// URL as it was originally captured.
    pub original_url: String,
}

impl Snapshot {
    pub fn new(timestamp: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            original_url: original_url.into(),
        }
    }
}

/// Parameters of one snapshot index query.
///
/// Also serves as the cache key: a cached index is only reused when it was
/// built for an identical query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub url: String,
    /// Only query the exact URL, no `url/*` prefix pages.
    pub exact_url: bool,
    pub from_timestamp: Option<String>,
    pub to_timestamp: Option<String>,
    /// Include captures with any HTTP status, not just 200.
    pub all_statuses: bool,
    pub all_timestamps: bool,
    /// Cap on prefix pages requested from the CDX API.
    pub maximum_pages: usize,
}

/// Result of listing snapshots.
#[derive(Debug, Clone, Default)]
pub struct SnapshotListing {
    pub snapshots: Vec<Snapshot>,
    /// False when pagination stopped early because a page could not be fetched.
    pub complete: bool,
}

/// Anything that can list the snapshots the archive holds for a query.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// List snapshots in the order the index returns them.
    async fn list_snapshots(&self, query: &SnapshotQuery) -> Result<SnapshotListing, ArchiveError>;
}
