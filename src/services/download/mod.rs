//! Concurrent snapshot download service.
//!
//! Fetches curated entries from the archive with a fixed pool of workers.
//! Separated from UI concerns - emits events for progress tracking.

mod types;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::archive::cdx::build_raw_archive_url;
use crate::curate::CuratedEntry;
use crate::http_client::{ContentFetcher, FetchError, FetchedContent};
use crate::state::{DownloadId, DownloadStateStore};
use crate::utils::html::prune_meta_tags;
use crate::utils::{is_html_content, is_text_content, tidy_bytes};

pub use types::{DownloadConfig, DownloadEvent, DownloadResult};

/// Service for downloading curated entries into the backup directory.
pub struct DownloadService {
    fetcher: Arc<dyn ContentFetcher>,
    store: Arc<DownloadStateStore>,
    config: DownloadConfig,
}

impl DownloadService {
    /// Create a new download service.
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        store: Arc<DownloadStateStore>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Download every entry not already recorded in the download state.
    ///
    /// Spawns `workers` tasks that pull from a shared queue and report
    /// progress on `event_tx`. A failed entry never stops the others.
    pub async fn download(
        &self,
        entries: Vec<CuratedEntry>,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> DownloadResult {
        let total = entries.len();
        let pending: VecDeque<CuratedEntry> = entries
            .into_iter()
            .filter(|entry| !self.store.contains(&DownloadId::from(entry)))
            .collect();
        let skipped = total - pending.len();

        if skipped > 0 {
            tracing::info!("Skipping {} files already downloaded", skipped);
        }
        let _ = event_tx
            .send(DownloadEvent::Queued {
                pending: pending.len(),
                skipped,
            })
            .await;

        let queue = Arc::new(Mutex::new(pending));
        let downloaded = Arc::new(AtomicUsize::new(0));
        let reserved = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let failed_urls = Arc::new(Mutex::new(Vec::new()));

        let workers = self.config.workers.max(1);
        let limit = self.config.limit;
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let queue = queue.clone();
            let fetcher = self.fetcher.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            let downloaded = downloaded.clone();
            let reserved = reserved.clone();
            let failed = failed.clone();
            let failed_urls = failed_urls.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                loop {
                    // Check limit
                    if let Some(max) = limit {
                        if downloaded.load(Ordering::SeqCst) >= max {
                            break;
                        }
                    }

                    // Claim an entry; a slot under the limit is reserved while it is in flight
                    let claimed = {
                        let mut queue = queue.lock().await;
                        if queue.is_empty() {
                            break;
                        }
                        if limit.is_some_and(|max| reserved.load(Ordering::SeqCst) >= max) {
                            None
                        } else {
                            reserved.fetch_add(1, Ordering::SeqCst);
                            queue.pop_front()
                        }
                    };
                    let Some(entry) = claimed else {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    };

                    let url = build_raw_archive_url(&entry.timestamp, &entry.file_url);

                    let _ = event_tx
                        .send(DownloadEvent::Started {
                            worker_id,
                            url: url.clone(),
                            local_path: entry.local_path.clone(),
                        })
                        .await;

                    let content = match config
                        .retry
                        .run(
                            &url,
                            || fetcher.fetch(&url),
                            |attempt, e: &FetchError| {
                                let event = DownloadEvent::Retrying {
                                    worker_id,
                                    url: url.clone(),
                                    attempt,
                                    error: e.to_string(),
                                };
                                let event_tx = event_tx.clone();
                                async move {
                                    let _ = event_tx.send(event).await;
                                }
                            },
                        )
                        .await
                    {
                        Ok(content) => content,
                        Err(e) => {
                            reserved.fetch_sub(1, Ordering::SeqCst);
                            send_failure_event(
                                &url,
                                &failed,
                                &failed_urls,
                                &event_tx,
                                worker_id,
                                &e.to_string(),
                            )
                            .await;
                            continue;
                        }
                    };

                    let bytes = match save_entry(
                        &config.backup_dir,
                        &entry,
                        content,
                        config.prune_meta,
                    )
                    .await
                    {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            reserved.fetch_sub(1, Ordering::SeqCst);
                            send_failure_event(
                                &url,
                                &failed,
                                &failed_urls,
                                &event_tx,
                                worker_id,
                                &format!("writing {}: {}", entry.local_path, e),
                            )
                            .await;
                            continue;
                        }
                    };

                    if let Err(e) = store.mark_downloaded(&DownloadId::from(&entry)).await {
                        reserved.fetch_sub(1, Ordering::SeqCst);
                        send_failure_event(
                            &url,
                            &failed,
                            &failed_urls,
                            &event_tx,
                            worker_id,
                            &format!("recording {} in {}: {}", entry.local_path, store.path().display(), e),
                        )
                        .await;
                        continue;
                    }

                    downloaded.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!("Saved {} ({} bytes)", entry.local_path, bytes);
                    let _ = event_tx
                        .send(DownloadEvent::Saved {
                            worker_id,
                            url,
                            local_path: entry.local_path,
                            bytes,
                        })
                        .await;
                }
            });

            handles.push(handle);
        }

        // Wait for all workers
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Download worker panicked: {}", e);
            }
        }

        let failed_urls = std::mem::take(&mut *failed_urls.lock().await);

        DownloadResult {
            downloaded: downloaded.load(Ordering::SeqCst),
            skipped,
            failed: failed.load(Ordering::SeqCst),
            failed_urls,
        }
    }
}

/// Write fetched content to its place under `backup_dir`.
async fn save_entry(
    backup_dir: &Path,
    entry: &CuratedEntry,
    content: FetchedContent,
    prune_meta: bool,
) -> std::io::Result<u64> {
    let path = backup_dir.join(&entry.local_path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = prepare_content(&path, content, prune_meta);
    tokio::fs::write(&path, &bytes).await?;
    Ok(bytes.len() as u64)
}

/// Normalize text encodings and optionally prune HTML; binary passes through.
fn prepare_content(path: &Path, content: FetchedContent, prune_meta: bool) -> Vec<u8> {
    let content_type = content.content_type.as_deref();
    if !is_text_content(content_type, path) {
        return content.bytes;
    }

    let text = tidy_bytes(&content.bytes, content_type);
    if !(prune_meta && is_html_content(content_type, path)) {
        return text;
    }

    match String::from_utf8(text) {
        Ok(html) => prune_meta_tags(&html).into_bytes(),
        Err(e) => e.into_bytes(),
    }
}

async fn send_failure_event(
    url: &str,
    failed: &AtomicUsize,
    failed_urls: &Mutex<Vec<String>>,
    event_tx: &mpsc::Sender<DownloadEvent>,
    worker_id: usize,
    error: &str,
) {
    tracing::warn!("Failed to download {}: {}", url, error);
    failed.fetch_add(1, Ordering::SeqCst);
    failed_urls.lock().await.push(url.to_string());
    let _ = event_tx
        .send(DownloadEvent::Failed {
            worker_id,
            url: url.to_string(),
            error: error.to_string(),
        })
        .await;
}
