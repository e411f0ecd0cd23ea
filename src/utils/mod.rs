//! Shared utility functions.
//!
//! This module contains reusable utilities used across the pipeline:
//! - `encoding`: best-effort conversion of downloaded text to UTF-8
//! - `html`: meta-tag pruning for mirrored pages
//! - `mime`: text vs binary classification of downloaded files
//! - `fs`: enumeration of rewritable files under a backup directory

mod encoding;
pub mod fs;
pub mod html;
mod mime;

pub use encoding::{is_binary_data, tidy_bytes};
pub use fs::collect_rewritable_files;
pub use mime::{is_html_content, is_rewritable_path, is_text_content};
