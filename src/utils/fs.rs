//! Filesystem helpers for walking a mirror.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::is_rewritable_path;

/// Collect every HTML/CSS/JS file below `root`, sorted for stable processing.
///
/// Unreadable directory entries are logged and skipped. A missing root yields
/// an empty list.
pub fn collect_rewritable_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_rewritable_path(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("index.html"), "x").unwrap();
        std::fs::write(root.join("a/b/site.css"), "x").unwrap();
        std::fs::write(root.join("a/logo.png"), "x").unwrap();
        std::fs::write(root.join(".cdx.json"), "[]").unwrap();

        let files = collect_rewritable_files(root);
        assert_eq!(
            files,
            vec![root.join("a/b/site.css"), root.join("index.html")]
        );
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_rewritable_files(&dir.path().join("nope")).is_empty());
    }
}
