//! The mirror pipeline: index, curate, download, rewrite, subdomains.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::archive::{load_or_fetch, Snapshot, SnapshotCache, SnapshotSource, WaybackSource};
use crate::config::MirrorConfig;
use crate::curate::{CuratedList, FileListCurator};
use crate::http_client::{ContentFetcher, HttpClient};
use crate::rewrite::rewrite_directory;
use crate::services::download::{DownloadConfig, DownloadEvent, DownloadService};
use crate::state::{self, DownloadStateStore};
use crate::subdomains::{process_subdomains, SubdomainReport};

/// Summary of one pipeline run.
#[derive(Debug, Default)]
pub struct MirrorReport {
    pub backup_path: PathBuf,
    pub snapshots: usize,
    pub curated: usize,
    pub downloaded: usize,
    /// Entries already present from an earlier run.
    pub skipped: usize,
    pub failed: usize,
    pub failed_urls: Vec<String>,
    /// Files whose archive links were rewritten.
    pub rewritten: usize,
    pub subdomains: Option<SubdomainReport>,
}

/// One site being mirrored, with the backends it talks to.
pub struct Mirror {
    config: MirrorConfig,
    source: Arc<dyn SnapshotSource>,
    fetcher: Arc<dyn ContentFetcher>,
    events: Option<mpsc::Sender<DownloadEvent>>,
}

impl Mirror {
    /// Create a mirror backed by the Wayback Machine.
    pub fn new(config: MirrorConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let client = HttpClient::new(
            config.request_timeout,
            config.request_delay,
            config.user_agent.as_deref(),
        )
        .context("Failed to create HTTP client")?;

        let mut source = WaybackSource::new(client.clone(), config.retry_policy());
        if let Some(ref api_url) = config.cdx_api_url {
            source = source.with_api_url(api_url.as_str());
        }

        Ok(Self::with_backends(config, Arc::new(source), Arc::new(client)))
    }

    /// Create a mirror with explicit backends.
    pub fn with_backends(
        config: MirrorConfig,
        source: Arc<dyn SnapshotSource>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            config,
            source,
            fetcher,
            events: None,
        }
    }

    /// Forward download progress events to `events`.
    pub fn with_events(mut self, events: mpsc::Sender<DownloadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// A mirror for another config sharing this one's backends and event sink.
    pub fn nested(&self, config: MirrorConfig) -> Mirror {
        Mirror {
            config,
            source: self.source.clone(),
            fetcher: self.fetcher.clone(),
            events: self.events.clone(),
        }
    }

    /// The snapshot index for this site, cached in the backup directory.
    pub async fn snapshots(&self) -> Vec<Snapshot> {
        let cache = SnapshotCache::new(self.config.cdx_path());
        load_or_fetch(self.source.as_ref(), &self.config.snapshot_query(), &cache).await
    }

    pub fn curator(&self) -> FileListCurator {
        FileListCurator::new(
            self.config.only_filter.as_deref(),
            self.config.exclude_filter.as_deref(),
            self.config.all_timestamps,
        )
    }

    /// The curated list of files this run would download.
    pub async fn curated_file_list(&self) -> CuratedList {
        let snapshots = self.snapshots().await;
        self.curator().curate(&snapshots)
    }

    /// Remove the state files of this site's backup.
    pub fn reset(&self) -> anyhow::Result<Vec<PathBuf>> {
        let backup_path = self.config.backup_path();
        state::reset(&backup_path)
            .with_context(|| format!("Failed to reset state in {}", backup_path.display()))
    }

    /// Run the pipeline for this site only, without subdomains.
    pub async fn download_files(&self) -> anyhow::Result<MirrorReport> {
        self.config.validate()?;
        let backup_path = self.config.backup_path();

        if self.config.reset {
            if let Err(e) = self.reset() {
                warn!("{:#}; continuing with existing state", e);
            }
        }

        info!(
            "Downloading {} to {} from Wayback Machine archives.",
            self.config.base_url,
            backup_path.display()
        );

        let snapshots = self.snapshots().await;
        let curated = self.curator().curate(&snapshots);

        let mut report = MirrorReport {
            backup_path: backup_path.clone(),
            snapshots: snapshots.len(),
            curated: curated.len(),
            ..Default::default()
        };

        if curated.is_empty() {
            info!("No files to download for {}.", self.config.base_url);
            return Ok(report);
        }
        info!("{} files to consider.", curated.len());

        tokio::fs::create_dir_all(&backup_path)
            .await
            .with_context(|| format!("Failed to create {}", backup_path.display()))?;
        let store = DownloadStateStore::open(self.config.db_path());

        let service = DownloadService::new(
            self.fetcher.clone(),
            Arc::new(store),
            DownloadConfig {
                backup_dir: backup_path.clone(),
                workers: self.config.threads_count,
                limit: self.config.download_limit,
                retry: self.config.retry_policy(),
                prune_meta: self.config.prune_meta,
            },
        );

        let event_tx = match self.events {
            Some(ref tx) => tx.clone(),
            None => mpsc::channel(1).0,
        };
        let result = service.download(curated.into_entries(), event_tx).await;

        report.downloaded = result.downloaded;
        report.skipped = result.skipped;
        report.failed = result.failed;
        report.failed_urls = result.failed_urls;

        if self.config.rewrite {
            report.rewritten = rewrite_directory(&backup_path);
        }

        info!(
            "Download of {} complete: {} saved, {} already present, {} failed.",
            self.config.base_url, report.downloaded, report.skipped, report.failed
        );

        Ok(report)
    }

    /// Run the full pipeline, including subdomains when enabled.
    pub async fn run(&self) -> anyhow::Result<MirrorReport> {
        let mut report = self.download_files().await?;
        if self.config.recursive_subdomains {
            report.subdomains = Some(process_subdomains(self).await);
        }
        Ok(report)
    }
}
