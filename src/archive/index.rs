//! Snapshot index with an on-disk `.cdx.json` cache.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::{Snapshot, SnapshotQuery, SnapshotSource};

/// File name of the snapshot cache inside the backup directory.
pub const CDX_CACHE_FILE: &str = ".cdx.json";

/// Errors reading or writing the snapshot cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid cache contents: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cache was built for a different query")]
    QueryMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    query: SnapshotQuery,
    snapshots: Vec<Snapshot>,
}

/// The `.cdx.json` snapshot cache.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at the default location inside a backup directory.
    pub fn in_dir(backup_dir: &Path) -> Self {
        Self::new(backup_dir.join(CDX_CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the cached snapshots for `query`.
    pub fn load(&self, query: &SnapshotQuery) -> Result<Vec<Snapshot>, CacheError> {
        let content = std::fs::read_to_string(&self.path)?;
        let cached: CacheFile = serde_json::from_str(&content)?;
        if &cached.query != query {
            return Err(CacheError::QueryMismatch);
        }
        Ok(cached.snapshots)
    }

    /// Persist snapshots for `query`, creating the parent directory if needed.
    pub fn store(&self, query: &SnapshotQuery, snapshots: &[Snapshot]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            query: query.clone(),
            snapshots: snapshots.to_vec(),
        };
        std::fs::write(&self.path, serde_json::to_string(&file)?)?;
        Ok(())
    }

    /// Remove the cache file. Returns whether a file was removed.
    pub fn discard(&self) -> io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Return the snapshot index for `query`, from cache when possible.
///
/// Never fails: cache problems fall back to a fresh fetch, fetch problems
/// yield an empty index. Only complete listings are written back.
pub async fn load_or_fetch(
    source: &dyn SnapshotSource,
    query: &SnapshotQuery,
    cache: &SnapshotCache,
) -> Vec<Snapshot> {
    if cache.exists() {
        info!("Loading snapshot list from {}", cache.path().display());
        match cache.load(query) {
            Ok(snapshots) => {
                info!("Loaded {} snapshots from cache.", snapshots.len());
                return snapshots;
            }
            Err(CacheError::QueryMismatch) => {
                info!(
                    "Snapshot cache {} was built for different options. Refetching...",
                    cache.path().display()
                );
            }
            Err(CacheError::Parse(e)) => {
                warn!(
                    "Error reading snapshot cache file {}: {}. Refetching...",
                    cache.path().display(),
                    e
                );
                discard_quietly(cache);
            }
            Err(CacheError::Io(e)) => {
                warn!(
                    "Error loading snapshot cache {}: {}. Refetching...",
                    cache.path().display(),
                    e
                );
                discard_quietly(cache);
            }
        }
    }

    info!("Getting snapshot pages from the Wayback Machine for {}", query.url);
    let listing = match source.list_snapshots(query).await {
        Ok(listing) => listing,
        Err(e) => {
            error!("Failed to list snapshots for {}: {}", query.url, e);
            return Vec::new();
        }
    };
    info!("Found {} snapshots to consider.", listing.snapshots.len());

    if !listing.complete {
        warn!(
            "Snapshot listing for {} is incomplete; not caching it",
            query.url
        );
    } else if !listing.snapshots.is_empty() {
        match cache.store(query, &listing.snapshots) {
            Ok(()) => info!(
                "Saved snapshot list to cache ({}).",
                cache.path().display()
            ),
            Err(e) => warn!(
                "Error saving snapshot cache to {}: {}",
                cache.path().display(),
                e
            ),
        }
    }

    listing.snapshots
}

fn discard_quietly(cache: &SnapshotCache) {
    if let Err(e) = cache.discard() {
        warn!("Could not remove {}: {}", cache.path().display(), e);
    }
}
