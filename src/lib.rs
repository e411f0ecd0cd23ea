//! wayback-mirror - rebuild websites from the Wayback Machine.
//!
//! The pipeline lists a site's captures through the CDX API, picks one
//! capture per local path, downloads them concurrently and resumably, and
//! rewrites archive links so the mirror works offline. Subdomains linked from
//! the site can be mirrored the same way, breadth first.

pub mod archive;
pub mod config;
pub mod curate;
pub mod http_client;
pub mod mirror;
pub mod rewrite;
pub mod services;
pub mod state;
pub mod subdomains;
pub mod utils;

pub use config::{Config, ConfigError, MirrorConfig, Settings};
pub use mirror::{Mirror, MirrorReport};
