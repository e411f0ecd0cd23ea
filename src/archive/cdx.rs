//! CDX API request building and response decoding.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::warn;

use super::{Snapshot, SnapshotQuery};

/// Wayback Machine CDX API base URL.
pub const WAYBACK_CDX_API_URL: &str = "https://web.archive.org/cdx/search/cdx";

/// Columns requested from the CDX API.
const FIELDS: &str = "timestamp,original";

/// CDX marker for a missing value.
const NULL_MARKER: &str = "-";

/// One CDX request for a site's snapshots.
///
/// Results are collapsed by content digest, so identical captures of a URL
/// are listed once.
pub struct CdxQuery<'a> {
    api_url: &'a str,
    query: &'a SnapshotQuery,
    pattern: String,
    page: Option<usize>,
}

impl<'a> CdxQuery<'a> {
    /// Captures of exactly `query.url`.
    pub fn exact(api_url: &'a str, query: &'a SnapshotQuery) -> Self {
        Self {
            api_url,
            query,
            pattern: query.url.clone(),
            page: None,
        }
    }

    /// One page of captures of everything below `query.url`.
    pub fn prefix_page(api_url: &'a str, query: &'a SnapshotQuery, page: usize) -> Self {
        Self {
            api_url,
            query,
            pattern: format!("{}/*", query.url.trim_end_matches('/')),
            page: Some(page),
        }
    }

    pub fn build(&self) -> String {
        // CDX wildcards must stay literal
        let pattern = urlencoding::encode(&self.pattern).replace("%2A", "*");
        let mut url = format!(
            "{}?url={}&output=json&fl={}&collapse=digest",
            self.api_url, pattern, FIELDS
        );

        if !self.query.all_statuses {
            url.push_str("&filter=statuscode:200");
        }
        if let Some(ref from) = self.query.from_timestamp {
            url.push_str(&format!("&from={}", from));
        }
        if let Some(ref to) = self.query.to_timestamp {
            url.push_str(&format!("&to={}", to));
        }
        if let Some(page) = self.page {
            url.push_str(&format!("&page={}", page));
        }
        url
    }
}

/// Errors from decoding a CDX response.
#[derive(Debug, Error)]
pub enum CdxParseError {
    #[error("Failed to parse CDX JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDX response has no {0} column")]
    MissingColumn(&'static str),
}

/// Decode a CDX JSON body (a header row, then one row per capture).
///
/// An empty body is an empty page. Rows whose timestamp is not a valid
/// `YYYYMMDDhhmmss` are logged and dropped; a null `original` becomes an
/// empty URL, which curation reports as malformed.
pub fn parse_snapshots(body: &str) -> Result<Vec<Snapshot>, CdxParseError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Vec<String>> = serde_json::from_str(body)?;
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let column = |name: &'static str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or(CdxParseError::MissingColumn(name))
    };
    let ts_col = column("timestamp")?;
    let url_col = column("original")?;

    let mut snapshots = Vec::new();
    for row in rows {
        let timestamp = row.get(ts_col).map(String::as_str).unwrap_or_default();
        if parse_cdx_timestamp(timestamp).is_none() {
            warn!("Skipping CDX row with invalid timestamp {:?}", timestamp);
            continue;
        }
        let original = row
            .get(url_col)
            .map(String::as_str)
            .filter(|url| *url != NULL_MARKER)
            .unwrap_or_default();
        snapshots.push(Snapshot::new(timestamp, original));
    }
    Ok(snapshots)
}

/// Parse a full CDX timestamp (`YYYYMMDDhhmmss`).
pub fn parse_cdx_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if ts.len() != 14 || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(ts, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Check a `from`/`to` bound: 1 to 14 digits, any prefix of `YYYYMMDDhhmmss`.
pub fn is_valid_timestamp_bound(ts: &str) -> bool {
    !ts.is_empty() && ts.len() <= 14 && ts.bytes().all(|b| b.is_ascii_digit())
}

/// Archive URL serving the capture's original bytes, without the Wayback toolbar.
pub fn build_raw_archive_url(timestamp: &str, original_url: &str) -> String {
    format!("https://web.archive.org/web/{}id_/{}", timestamp, original_url)
}
