//! Persisted download state (`.downloaded.txt`).
//!
//! One `timestamp<TAB>local_path` line per saved file. The file only grows
//! between resets, which is what makes reruns resumable.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::archive::CDX_CACHE_FILE;
use crate::curate::CuratedEntry;

/// File name of the download state inside the backup directory.
pub const DOWNLOAD_STATE_FILE: &str = ".downloaded.txt";

/// Identity of a saved file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadId {
    pub local_path: String,
    pub timestamp: String,
}

impl DownloadId {
    fn to_line(&self) -> String {
        format!("{}\t{}\n", self.timestamp, self.local_path)
    }

    fn from_line(line: &str) -> Option<Self> {
        let (timestamp, local_path) = line.split_once('\t')?;
        if timestamp.is_empty() || local_path.is_empty() {
            return None;
        }
        Some(Self {
            local_path: local_path.to_string(),
            timestamp: timestamp.to_string(),
        })
    }
}

impl From<&CuratedEntry> for DownloadId {
    fn from(entry: &CuratedEntry) -> Self {
        Self {
            local_path: entry.local_path.clone(),
            timestamp: entry.timestamp.clone(),
        }
    }
}

/// Set of already-downloaded files, loaded once and appended to as files are saved.
pub struct DownloadStateStore {
    path: PathBuf,
    known: HashSet<DownloadId>,
    append_lock: Mutex<()>,
}

impl DownloadStateStore {
    /// Load the store from `path`.
    ///
    /// A missing file is an empty store. Bytes that are not UTF-8 are decoded
    /// lossily and malformed lines skipped; an unreadable file is logged and
    /// treated as empty, so the affected entries are simply downloaded again.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let known = match std::fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .filter_map(|line| {
                    let id = DownloadId::from_line(line);
                    if id.is_none() && !line.trim().is_empty() {
                        warn!("Ignoring malformed line in {}: {:?}", path.display(), line);
                    }
                    id
                })
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                warn!(
                    "Error reading download state {}, starting fresh: {}",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };

        Self {
            path,
            known,
            append_lock: Mutex::new(()),
        }
    }

    /// Store at the default location inside a backup directory.
    pub fn open_in(backup_dir: &Path) -> Self {
        Self::open(backup_dir.join(DOWNLOAD_STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries loaded at open time.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Whether `id` was recorded when the store was opened.
    pub fn contains(&self, id: &DownloadId) -> bool {
        self.known.contains(id)
    }

    /// Append `id` to the state file.
    pub async fn mark_downloaded(&self, id: &DownloadId) -> io::Result<()> {
        let _guard = self.append_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(id.to_line().as_bytes()).await?;
        file.flush().await
    }
}

/// Delete the snapshot cache and download state in `backup_dir`.
///
/// Returns the files that were actually removed.
pub fn reset(backup_dir: &Path) -> io::Result<Vec<PathBuf>> {
    info!("Resetting download state...");

    let mut removed = Vec::new();
    for name in [CDX_CACHE_FILE, DOWNLOAD_STATE_FILE] {
        let path = backup_dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    if removed.is_empty() {
        info!("No state files to remove in {}", backup_dir.display());
    } else {
        let list: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
        info!("Removed state files: {}", list.join(", "));
    }

    Ok(removed)
}
