//! Service layer.
//!
//! Domain logic separated from UI concerns; the CLI drives services and
//! renders the events they emit.

pub mod download;

pub use download::{DownloadConfig, DownloadEvent, DownloadResult, DownloadService};
