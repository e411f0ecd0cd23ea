//! Wayback Machine CDX API snapshot source.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::cdx::{self, CdxQuery, WAYBACK_CDX_API_URL};
use super::{ArchiveError, Snapshot, SnapshotListing, SnapshotQuery, SnapshotSource};
use crate::http_client::{FetchError, HttpClient, RetryPolicy};

/// Snapshot source backed by the Wayback Machine CDX API.
pub struct WaybackSource {
    client: HttpClient,
    retry: RetryPolicy,
    api_url: String,
}

impl WaybackSource {
    /// Create a new Wayback source.
    pub fn new(client: HttpClient, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            api_url: WAYBACK_CDX_API_URL.to_string(),
        }
    }

    /// Point the source at a different CDX endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn fetch_page(&self, cdx_url: &str) -> Result<Vec<Snapshot>, ArchiveError> {
        debug!("Querying Wayback CDX API: {}", cdx_url);

        let body = self
            .retry
            .run(cdx_url, || self.client.get_text(cdx_url), |_, _: &FetchError| async {})
            .await?;

        cdx::parse_snapshots(&body).map_err(|e| ArchiveError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SnapshotSource for WaybackSource {
    async fn list_snapshots(&self, query: &SnapshotQuery) -> Result<SnapshotListing, ArchiveError> {
        let exact = CdxQuery::exact(&self.api_url, query).build();
        let mut snapshots = self.fetch_page(&exact).await?;
        let mut complete = true;

        if !query.exact_url {
            for page in 0..query.maximum_pages {
                let cdx_url = CdxQuery::prefix_page(&self.api_url, query, page).build();
                match self.fetch_page(&cdx_url).await {
                    Ok(batch) if batch.is_empty() => break,
                    Ok(batch) => {
                        debug!("CDX page {} returned {} snapshots", page, batch.len());
                        snapshots.extend(batch);
                    }
                    Err(e) => {
                        warn!(
                            "Stopping snapshot listing for {} at page {}: {}",
                            query.url, page, e
                        );
                        complete = false;
                        break;
                    }
                }
            }
        }

        Ok(SnapshotListing {
            snapshots,
            complete,
        })
    }
}

