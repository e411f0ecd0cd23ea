//! Turning a raw snapshot index into the list of files to download.
//!
//! The curator deduplicates snapshots by local path, keeps either the latest
//! capture or every capture, and applies the only/exclude filters. Output
//! order is the order in which each path was first seen.

mod filter;
mod path;

pub use filter::UrlFilter;
pub use path::{file_id, local_path};

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::archive::Snapshot;

/// One file selected for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CuratedEntry {
    /// Path relative to the backup directory. Unique within a list.
    pub local_path: String,
    /// URL as originally captured.
    pub file_url: String,
    pub timestamp: String,
}

/// Curated entries keyed by local path, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CuratedList {
    entries: Vec<CuratedEntry>,
    index: HashMap<String, usize>,
}

impl CuratedList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, local_path: &str) -> Option<&CuratedEntry> {
        self.index.get(local_path).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[CuratedEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CuratedEntry> {
        self.entries
    }

    /// Insert or, if `keep_latest`, replace with a newer capture in place.
    fn upsert(&mut self, entry: CuratedEntry, keep_latest: bool) {
        match self.index.get(&entry.local_path) {
            Some(&i) => {
                if keep_latest && entry.timestamp > self.entries[i].timestamp {
                    self.entries[i] = entry;
                }
            }
            None => {
                self.index.insert(entry.local_path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

/// Builds a [`CuratedList`] from a snapshot index.
#[derive(Debug, Clone, Default)]
pub struct FileListCurator {
    only: Option<UrlFilter>,
    exclude: Option<UrlFilter>,
    all_timestamps: bool,
}

impl FileListCurator {
    pub fn new(only: Option<&str>, exclude: Option<&str>, all_timestamps: bool) -> Self {
        Self {
            only: only.map(UrlFilter::parse),
            exclude: exclude.map(UrlFilter::parse),
            all_timestamps,
        }
    }

    /// Whether `url` passes both filters.
    pub fn accepts(&self, url: &str) -> bool {
        self.only.as_ref().map_or(true, |f| f.matches(url))
            && !self.exclude.as_ref().map_or(false, |f| f.matches(url))
    }

    pub fn curate(&self, snapshots: &[Snapshot]) -> CuratedList {
        let mut list = CuratedList::default();
        let mut excluded = 0usize;

        for snapshot in snapshots {
            let url = snapshot.original_url.as_str();

            let path = match (url.is_empty(), local_path(url)) {
                (false, Some(path)) => path,
                _ => {
                    warn!("Malformed file url, ignoring: {}", snapshot.timestamp);
                    continue;
                }
            };

            if let Some(ref only) = self.only {
                if !only.matches(url) {
                    info!("File url doesn't match only filter, ignoring: {}", url);
                    continue;
                }
            }

            if let Some(ref exclude) = self.exclude {
                if exclude.matches(url) {
                    excluded += 1;
                    continue;
                }
            }

            let local_path = if self.all_timestamps {
                format!("{}/{}", snapshot.timestamp, path)
            } else {
                path
            };

            list.upsert(
                CuratedEntry {
                    local_path,
                    file_url: snapshot.original_url.clone(),
                    timestamp: snapshot.timestamp.clone(),
                },
                !self.all_timestamps,
            );
        }

        if excluded > 0 {
            info!("Excluded {} file urls matching the exclude filter", excluded);
        }

        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshots() -> Vec<Snapshot> {
        vec![
            Snapshot::new("20160521102332", "https://thomaston4thofjuly.com/sitemap.xml"),
            Snapshot::new("20080820032318", "http://www.thomaston4thofjuly.com:80/pix/Flair4.jpg"),
            Snapshot::new("20080820032329", "http://www.thomaston4thofjuly.com:80/sponsors.cfm"),
            Snapshot::new("20180314104022", "http://www.thomaston4thofjuly.com/assets/img/vendors-1.jpg"),
            Snapshot::new("20180314104024", "http://www.thomaston4thofjuly.com/assets/crafter2018.pdf"),
            Snapshot::new("20190101000000", "https://www.thomaston4thofjuly.com/assets/img/android-icon-192x192.png"),
            Snapshot::new("20180314104030", "http://www.thomaston4thofjuly.com/assets/css/main.css"),
            Snapshot::new("20050101000000", "http://www.thomaston4thofjuly.com/"),
            Snapshot::new("20200101000000", "https://thomaston4thofjuly.com/"),
            Snapshot::new("20190505000000", "https://thomaston4thofjuly.com/sitemap.xml"),
            Snapshot::new("20100101000000", ""),
        ]
    }

    #[test]
    fn keeps_latest_capture_per_path() {
        let list = FileListCurator::default().curate(&snapshots());

        assert_eq!(list.get("sitemap.xml").unwrap().timestamp, "20190505000000");
        assert_eq!(list.get("index.html").unwrap().timestamp, "20200101000000");
        assert_eq!(
            list.get("index.html").unwrap().file_url,
            "https://thomaston4thofjuly.com/"
        );

        let mut paths: Vec<_> = list.entries().iter().map(|e| e.local_path.clone()).collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn preserves_first_seen_order() {
        let list = FileListCurator::default().curate(&snapshots());
        let paths: Vec<_> = list.entries().iter().map(|e| e.local_path.as_str()).collect();
        assert_eq!(paths[0], "sitemap.xml");
        assert_eq!(paths[1], "pix/Flair4.jpg");
        assert_eq!(paths.last(), Some(&"index.html"));
    }

    #[test]
    fn skips_malformed_entries() {
        let list = FileListCurator::default().curate(&snapshots());
        assert_eq!(list.len(), 8);
        assert!(list.entries().iter().all(|e| !e.file_url.is_empty()));
    }

    #[test]
    fn only_filter_selects_images() {
        let list = FileListCurator::new(Some(r"/\.(jpg|png)/i"), None, false).curate(&snapshots());

        assert_eq!(
            list.get("pix/Flair4.jpg").unwrap().file_url,
            "http://www.thomaston4thofjuly.com:80/pix/Flair4.jpg"
        );
        assert_eq!(
            list.get("assets/img/vendors-1.jpg").unwrap().file_url,
            "http://www.thomaston4thofjuly.com/assets/img/vendors-1.jpg"
        );
        assert_eq!(
            list.get("assets/img/android-icon-192x192.png").unwrap().file_url,
            "https://www.thomaston4thofjuly.com/assets/img/android-icon-192x192.png"
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn invalid_only_filter_yields_nothing() {
        let list = FileListCurator::new(Some("/unclosed["), None, false).curate(&snapshots());
        assert!(list.is_empty());
    }

    #[test]
    fn exclude_filter_drops_images() {
        let list =
            FileListCurator::new(None, Some(r"/\.(gif|png|jpg|jpeg)+/i"), false).curate(&snapshots());
        assert!(list
            .entries()
            .iter()
            .all(|e| !e.file_url.ends_with(".jpg") && !e.file_url.ends_with(".png")));
        assert!(list.get("assets/crafter2018.pdf").is_some());
        assert!(list.get("assets/css/main.css").is_some());
    }

    #[test]
    fn invalid_exclude_filter_keeps_everything() {
        let unfiltered = FileListCurator::default().curate(&snapshots());
        let list = FileListCurator::new(None, Some(r"\./unclosed["), false).curate(&snapshots());
        assert_eq!(list.entries(), unfiltered.entries());
        assert_eq!(
            list.get("sponsors.cfm").unwrap().file_url,
            "http://www.thomaston4thofjuly.com:80/sponsors.cfm"
        );
    }

    #[test]
    fn only_and_not_exclude() {
        let curator = FileListCurator::new(Some("assets"), Some("/\\.pdf$/"), false);
        assert!(curator.accepts("http://x.com/assets/a.css"));
        assert!(!curator.accepts("http://x.com/assets/a.pdf"));
        assert!(!curator.accepts("http://x.com/index.html"));
    }

    #[test]
    fn all_timestamps_keeps_every_capture() {
        let list = FileListCurator::new(None, None, true).curate(&snapshots());
        assert!(list.get("20160521102332/sitemap.xml").is_some());
        assert!(list.get("20190505000000/sitemap.xml").is_some());
        assert!(list.get("20050101000000/index.html").is_some());
        assert!(list.get("20200101000000/index.html").is_some());
        assert_eq!(list.len(), 10);
    }
}
