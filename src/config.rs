//! Configuration management for wayback-mirror.
//!
//! Three layers, later ones winning: built-in [`Settings`] defaults, an
//! optional config file ([`Config`]), and command-line flags. The result of
//! merging them for one site is a [`MirrorConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::cdx::is_valid_timestamp_bound;
use crate::archive::{SnapshotQuery, CDX_CACHE_FILE};
use crate::http_client::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::state::DOWNLOAD_STATE_FILE;

/// Config file name looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "wayback-mirror.toml";

/// Directory (under the platform config dir) holding the user config file.
const APP_CONFIG_DIR: &str = "wayback-mirror";

/// Default root under which per-site backups are created.
pub const DEFAULT_BACKUP_ROOT: &str = "websites";

/// Default cap on CDX prefix pages.
pub const DEFAULT_MAXIMUM_PAGES: usize = 100;

/// Floor for the page cap handed to nested subdomain runs.
const MIN_SUBDOMAIN_PAGES: usize = 10;

/// Default subdomain traversal depth.
pub const DEFAULT_SUBDOMAIN_DEPTH: usize = 1;

/// Name of the directory holding mirrored subdomains inside a backup.
pub const SUBDOMAINS_DIR: &str = "subdomains";

/// Configuration errors. Any of these aborts a run before work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("base URL must not be empty")]
    EmptyBaseUrl,

    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("invalid {name} timestamp {value:?}: expected 1 to 14 digits (YYYYMMDDhhmmss)")]
    InvalidTimestamp { name: &'static str, value: String },
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root under which `<backup_name>/` directories are created.
    pub backup_root: PathBuf,
    /// Number of concurrent download workers.
    pub threads_count: usize,
    /// Cap on CDX prefix pages.
    pub maximum_pages: usize,
    /// Subdomain traversal depth.
    pub subdomain_depth: usize,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay after each request in milliseconds.
    pub request_delay_ms: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// User agent: `None` for the default, `"impersonate"`, or a literal string.
    pub user_agent: Option<String>,
    /// Alternative CDX endpoint.
    pub cdx_api_url: Option<String>,
    /// Rewrite archive links after downloading.
    pub rewrite: bool,
    /// Prune non-essential meta tags from saved HTML.
    pub prune_meta: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_root: PathBuf::from(DEFAULT_BACKUP_ROOT),
            threads_count: 1,
            maximum_pages: DEFAULT_MAXIMUM_PAGES,
            subdomain_depth: DEFAULT_SUBDOMAIN_DEPTH,
            request_timeout: 30,
            request_delay_ms: 250,
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: None,
            cdx_api_url: None,
            rewrite: false,
            prune_meta: false,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for backups.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "directory")]
    pub backup_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain_depth: Option<usize>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// User agent string, or `impersonate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdx_api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune_meta: Option<bool>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Otherwise the first of
    /// `./wayback-mirror.toml` and `<config_dir>/wayback-mirror/config.toml`
    /// that exists is used, falling back to defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path).await;
        }

        match Self::discover() {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                Self::load_from_path(&path).await
            }
            None => Ok(Self::default()),
        }
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_CONFIG_DIR).join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            _ => toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        resolve_path(path_str, base_dir)
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref root) = self.backup_root {
            settings.backup_root = self.resolve_path(root, base_dir);
        }
        if let Some(threads) = self.threads_count {
            settings.threads_count = threads;
        }
        if let Some(pages) = self.maximum_pages {
            settings.maximum_pages = pages;
        }
        if let Some(depth) = self.subdomain_depth {
            settings.subdomain_depth = depth;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(retries) = self.max_retries {
            settings.max_retries = retries;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(ref url) = self.cdx_api_url {
            settings.cdx_api_url = Some(url.clone());
        }
        if let Some(rewrite) = self.rewrite {
            settings.rewrite = rewrite;
        }
        if let Some(prune_meta) = self.prune_meta {
            settings.prune_meta = prune_meta;
        }
    }
}

/// Expand `~` and make relative paths relative to `base_dir`.
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Fully resolved options for mirroring one site.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorConfig {
    pub base_url: String,
    /// Explicit backup directory; defaults to `<backup_root>/<backup_name>`.
    pub directory: Option<PathBuf>,
    pub backup_root: PathBuf,
    pub from_timestamp: Option<String>,
    pub to_timestamp: Option<String>,
    pub exact_url: bool,
    /// Include captures with any HTTP status.
    pub all: bool,
    pub all_timestamps: bool,
    pub only_filter: Option<String>,
    pub exclude_filter: Option<String>,
    pub threads_count: usize,
    pub maximum_pages: usize,
    /// Cap on files saved in one run.
    pub download_limit: Option<usize>,
    pub reset: bool,
    pub rewrite: bool,
    pub recursive_subdomains: bool,
    pub subdomain_depth: usize,
    pub prune_meta: bool,
    pub request_timeout: Duration,
    pub request_delay: Duration,
    pub max_retries: u32,
    pub user_agent: Option<String>,
    pub cdx_api_url: Option<String>,
}

impl MirrorConfig {
    /// Config for `base_url` with everything else taken from `settings`.
    pub fn new(base_url: impl Into<String>, settings: &Settings) -> Self {
        Self {
            base_url: base_url.into(),
            directory: None,
            backup_root: settings.backup_root.clone(),
            from_timestamp: None,
            to_timestamp: None,
            exact_url: false,
            all: false,
            all_timestamps: false,
            only_filter: None,
            exclude_filter: None,
            threads_count: settings.threads_count,
            maximum_pages: settings.maximum_pages,
            download_limit: None,
            reset: false,
            rewrite: settings.rewrite,
            recursive_subdomains: false,
            subdomain_depth: settings.subdomain_depth,
            prune_meta: settings.prune_meta,
            request_timeout: Duration::from_secs(settings.request_timeout),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            max_retries: settings.max_retries,
            user_agent: settings.user_agent.clone(),
            cdx_api_url: settings.cdx_api_url.clone(),
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.threads_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        for (name, value) in [("from", &self.from_timestamp), ("to", &self.to_timestamp)] {
            if let Some(value) = value {
                if !is_valid_timestamp_bound(value) {
                    return Err(ConfigError::InvalidTimestamp {
                        name,
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Host part of the base URL, or the base URL itself if it has no scheme.
    pub fn backup_name(&self) -> String {
        if self.base_url.contains("//") {
            self.base_url
                .split('/')
                .nth(2)
                .unwrap_or_default()
                .to_string()
        } else {
            self.base_url.clone()
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        match self.directory {
            Some(ref dir) => dir.clone(),
            None => self.backup_root.join(self.backup_name()),
        }
    }

    pub fn cdx_path(&self) -> PathBuf {
        self.backup_path().join(CDX_CACHE_FILE)
    }

    pub fn db_path(&self) -> PathBuf {
        self.backup_path().join(DOWNLOAD_STATE_FILE)
    }

    /// Directory holding mirrored subdomains.
    pub fn subdomains_path(&self) -> PathBuf {
        self.backup_path().join(SUBDOMAINS_DIR)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    pub fn snapshot_query(&self) -> SnapshotQuery {
        SnapshotQuery {
            url: self.base_url.clone(),
            exact_url: self.exact_url,
            from_timestamp: self.from_timestamp.clone(),
            to_timestamp: self.to_timestamp.clone(),
            all_statuses: self.all,
            all_timestamps: self.all_timestamps,
            maximum_pages: self.maximum_pages,
        }
    }

    /// Non-recursive config for mirroring `host` into `<backup>/subdomains/<host>/`.
    ///
    /// URL filters, all-timestamps mode and the download limit describe the
    /// parent site only and start from their defaults.
    pub fn for_subdomain(&self, host: &str) -> Self {
        Self {
            base_url: format!("https://{}/", host),
            directory: Some(self.subdomains_path().join(host)),
            backup_root: self.backup_root.clone(),
            from_timestamp: self.from_timestamp.clone(),
            to_timestamp: self.to_timestamp.clone(),
            exact_url: false,
            all: self.all,
            all_timestamps: false,
            only_filter: None,
            exclude_filter: None,
            threads_count: self.threads_count,
            maximum_pages: (self.maximum_pages / 2).max(MIN_SUBDOMAIN_PAGES),
            download_limit: None,
            reset: self.reset,
            rewrite: self.rewrite,
            recursive_subdomains: false,
            subdomain_depth: self.subdomain_depth,
            prune_meta: self.prune_meta,
            request_timeout: self.request_timeout,
            request_delay: self.request_delay,
            max_retries: self.max_retries,
            user_agent: self.user_agent.clone(),
            cdx_api_url: self.cdx_api_url.clone(),
        }
    }
}
