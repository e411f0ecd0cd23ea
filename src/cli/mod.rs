//! Command-line interface.
//!
//! This module contains the CLI parser and dispatches to the command implementations.

mod commands;
mod progress;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use wayback_mirror::config::{resolve_path, Config, MirrorConfig, Settings};

#[derive(Parser)]
#[command(name = "wayback-mirror")]
#[command(about = "Download an entire website from the Wayback Machine")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a site into a local directory
    Download {
        #[command(flatten)]
        site: SiteArgs,

        /// Delete the snapshot cache and download state before starting
        #[arg(long)]
        reset: bool,

        /// Number of concurrent download workers
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Stop after saving this many files
        #[arg(short, long)]
        limit: Option<usize>,

        /// Rewrite archive links to local relative paths
        #[arg(short, long)]
        rewrite: bool,

        /// Also mirror subdomains linked from the site
        #[arg(long)]
        recursive_subdomains: bool,

        /// How many levels of subdomain links to follow
        #[arg(long)]
        subdomain_depth: Option<usize>,

        /// Strip non-essential <meta> tags from saved pages
        #[arg(long)]
        prune_meta: bool,

        /// Retries for transient failures
        #[arg(long)]
        retries: Option<u32>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Delay after each request in milliseconds
        #[arg(long)]
        delay: Option<u64>,

        /// User agent, or "impersonate" for a browser user agent
        #[arg(long, env = "WAYBACK_USER_AGENT")]
        user_agent: Option<String>,

        /// Show progress bars
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Print the curated file list as JSON without downloading
    List {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Remove the snapshot cache and download state of a site
    Reset {
        /// Base URL or domain of the site
        url: String,

        /// Backup directory (default: websites/<host>)
        #[arg(short, long)]
        directory: Option<String>,
    },
}

/// Options selecting what to mirror.
#[derive(Args)]
struct SiteArgs {
    /// Base URL or domain of the site
    url: String,

    /// Backup directory (default: websites/<host>)
    #[arg(short, long)]
    directory: Option<String>,

    /// Only captures at or after this timestamp (1-14 digits of YYYYMMDDhhmmss)
    #[arg(short, long)]
    from: Option<String>,

    /// Only captures at or before this timestamp
    #[arg(short, long)]
    to: Option<String>,

    /// Only the exact URL, no pages below it
    #[arg(short, long)]
    exact_url: bool,

    /// Include captures with any HTTP status
    #[arg(short, long)]
    all: bool,

    /// Keep every capture under <timestamp>/<path>
    #[arg(short = 's', long)]
    all_timestamps: bool,

    /// Only URLs matching this filter (substring or /regex/flags)
    #[arg(short, long)]
    only: Option<String>,

    /// Skip URLs matching this filter (substring or /regex/flags)
    #[arg(short = 'x', long)]
    exclude: Option<String>,

    /// Maximum number of snapshot index pages
    #[arg(short = 'p', long)]
    maximum_pages: Option<usize>,

    /// Alternative CDX endpoint
    #[arg(long, env = "WAYBACK_CDX_API_URL")]
    cdx_api_url: Option<String>,
}

impl SiteArgs {
    fn to_mirror_config(&self, settings: &Settings, cwd: &Path) -> MirrorConfig {
        let mut config = MirrorConfig::new(self.url.trim(), settings);
        config.directory = self.directory.as_deref().map(|d| resolve_path(d, cwd));
        config.from_timestamp = self.from.clone();
        config.to_timestamp = self.to.clone();
        config.exact_url = self.exact_url;
        config.all = self.all;
        config.all_timestamps = self.all_timestamps;
        config.only_filter = self.only.clone();
        config.exclude_filter = self.exclude.clone();
        if let Some(pages) = self.maximum_pages {
            config.maximum_pages = pages;
        }
        if let Some(ref url) = self.cdx_api_url {
            config.cdx_api_url = Some(url.clone());
        }
        config
    }
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = Config::load(cli.config.as_deref()).await?;
    let cwd = std::env::current_dir()?;
    let base_dir = file_config.base_dir().unwrap_or_else(|| cwd.clone());
    let mut settings = Settings::default();
    file_config.apply_to_settings(&mut settings, &base_dir);

    match cli.command {
        Commands::Download {
            site,
            reset,
            threads,
            limit,
            rewrite,
            recursive_subdomains,
            subdomain_depth,
            prune_meta,
            retries,
            timeout,
            delay,
            user_agent,
            progress,
        } => {
            let mut config = site.to_mirror_config(&settings, &cwd);
            config.reset = reset;
            config.download_limit = limit;
            config.rewrite |= rewrite;
            config.recursive_subdomains = recursive_subdomains;
            config.prune_meta |= prune_meta;
            if let Some(threads) = threads {
                config.threads_count = threads;
            }
            if let Some(depth) = subdomain_depth {
                config.subdomain_depth = depth;
            }
            if let Some(retries) = retries {
                config.max_retries = retries;
            }
            if let Some(timeout) = timeout {
                config.request_timeout = std::time::Duration::from_secs(timeout);
            }
            if let Some(delay) = delay {
                config.request_delay = std::time::Duration::from_millis(delay);
            }
            if user_agent.is_some() {
                config.user_agent = user_agent;
            }
            commands::cmd_download(config, progress).await
        }
        Commands::List { site } => commands::cmd_list(site.to_mirror_config(&settings, &cwd)).await,
        Commands::Reset { url, directory } => {
            let mut config = MirrorConfig::new(url.trim(), &settings);
            config.directory = directory.as_deref().map(|d| resolve_path(d, &cwd));
            commands::cmd_reset(config)
        }
    }
}
