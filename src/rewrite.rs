//! Rewriting archive-wrapped URLs into local relative references.
//!
//! Downloaded pages still point at `https://web.archive.org/web/<ts>/<url>`.
//! Each context (HTML attributes, CSS `url()`, JS string literals) has its
//! own pattern; all three share [`localize`] for the actual mapping.

use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::utils::collect_rewritable_files;

static HTML_ATTR_ARCHIVE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(\b(?:href|src|action|data-src|data-url|content)\s*=\s*["'])https?://web\.archive\.org/web/[0-9]+(?:[a-z]{2}_)?/([^"']+)(["'])"#,
    )
    .unwrap()
});

static CSS_ARCHIVE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)url\(\s*["']?https?://web\.archive\.org/web/[0-9]+(?:[a-z]{2}_)?/([^"')]+)["']?\s*\)"#,
    )
    .unwrap()
});

static JS_ARCHIVE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(["'])https?://web\.archive\.org/web/[0-9]+(?:[a-z]{2}_)?/([^"']+)(["'])"#,
    )
    .unwrap()
});

/// Map the URL wrapped by an archive link to a local reference.
///
/// Full URLs become their path without the leading `/` (query and fragment
/// dropped, root becomes `index.html`); root-relative paths become `./path`;
/// anything else is returned as is.
pub fn localize(url: &str) -> String {
    let url = url.trim_start();
    let lower = url.to_ascii_lowercase();

    let after_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        url.find("://").map(|i| &url[i + 3..])
    } else {
        url.strip_prefix("//")
    };

    if let Some(rest) = after_scheme {
        let path = rest.find('/').map(|i| &rest[i + 1..]).unwrap_or("");
        let path = path.split(['?', '#']).next().unwrap_or("");
        return if path.is_empty() {
            "index.html".to_string()
        } else {
            path.to_string()
        };
    }

    match url.strip_prefix('/') {
        Some(rest) => format!("./{}", rest),
        None => url.to_string(),
    }
}

/// Rewrite archive URLs inside HTML attribute values.
pub fn rewrite_html_attr_urls(content: &str) -> String {
    HTML_ATTR_ARCHIVE_URL
        .replace_all(content, |caps: &Captures| {
            format!("{}{}{}", &caps[1], localize(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Rewrite archive URLs inside CSS `url(...)`.
pub fn rewrite_css_urls(content: &str) -> String {
    CSS_ARCHIVE_URL
        .replace_all(content, |caps: &Captures| {
            format!("url(\"{}\")", localize(&caps[1]))
        })
        .into_owned()
}

/// Rewrite archive URLs inside quoted JS string literals.
pub fn rewrite_js_urls(content: &str) -> String {
    JS_ARCHIVE_URL
        .replace_all(content, |caps: &Captures| {
            format!("{}{}{}", &caps[1], localize(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Apply every archive URL rewrite to `content`.
pub fn rewrite_archive_urls(content: &str) -> String {
    let content = rewrite_html_attr_urls(content);
    let content = rewrite_css_urls(&content);
    rewrite_js_urls(&content)
}

/// Apply `transform` to a text file, writing only when the content changes.
///
/// Files that are not valid UTF-8 are left alone. Returns whether the file
/// was rewritten.
pub fn rewrite_file_with<F>(path: &Path, transform: F) -> io::Result<bool>
where
    F: FnOnce(&str) -> String,
{
    let bytes = std::fs::read(path)?;
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(_) => {
            debug!("Skipping non-UTF-8 file {}", path.display());
            return Ok(false);
        }
    };

    let rewritten = transform(&content);
    if rewritten == content {
        return Ok(false);
    }
    std::fs::write(path, rewritten)?;
    Ok(true)
}

/// Rewrite archive URLs in one file.
pub fn rewrite_file(path: &Path) -> io::Result<bool> {
    rewrite_file_with(path, rewrite_archive_urls)
}

/// Rewrite archive URLs in every HTML/CSS/JS file under `backup_dir`.
///
/// Per-file errors are logged and skipped. Returns the number of files changed.
pub fn rewrite_directory(backup_dir: &Path) -> usize {
    let mut rewritten = 0;
    for path in collect_rewritable_files(backup_dir) {
        match rewrite_file(&path) {
            Ok(true) => rewritten += 1,
            Ok(false) => {}
            Err(e) => warn!("Error rewriting file {}: {}", path.display(), e),
        }
    }
    info!("Rewrote archive links in {} files", rewritten);
    rewritten
}
