//! Finding links to sibling subdomains in downloaded files.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use tracing::warn;
use url::Url;

use crate::utils::collect_rewritable_files;

/// Lowercased host of a URL; bare domains are accepted.
pub fn host_of(url: &str) -> Option<String> {
    let with_scheme = if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Registrable domain of a URL's host.
///
/// Keeps the last two labels, or the last three when both of the final two
/// are at most three characters long (`example.co.uk`). Hosts with two or
/// fewer labels are returned unchanged.
pub fn extract_base_domain(url: &str) -> Option<String> {
    let host = host_of(url)?;
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return Some(host);
    }

    let keep = if labels[n - 2].len() <= 3 && labels[n - 1].len() <= 3 {
        3
    } else {
        2
    };
    Some(labels[n - keep..].join("."))
}

/// Scans text for absolute links to `<label>.<base_domain>`.
#[derive(Debug, Clone)]
pub struct SubdomainScanner {
    base_domain: String,
    patterns: Vec<Regex>,
}

impl SubdomainScanner {
    pub fn new(base_domain: &str) -> Result<Self, regex::Error> {
        let base = regex::escape(base_domain);
        let patterns = vec![
            // HTML attributes
            Regex::new(&format!(
                r#"(?i)(?:href|src|action|data-src)\s*=\s*["']https?://([^/."'\s]+)\.{}[/"':?#]"#,
                base
            ))?,
            // CSS url()
            Regex::new(&format!(
                r#"(?i)url\(\s*["']?https?://([^/."'\s)]+)\.{}[/"'):?#]"#,
                base
            ))?,
            // JS strings
            Regex::new(&format!(
                r#"(?i)["']https?://([^/."'\s]+)\.{}[/"':?#]"#,
                base
            ))?,
        ];

        Ok(Self {
            base_domain: base_domain.to_lowercase(),
            patterns,
        })
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Distinct subdomain hosts linked from `content`, `www` excluded.
    pub fn scan(&self, content: &str) -> BTreeSet<String> {
        let mut hosts = BTreeSet::new();
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(content) {
                let label = caps[1].to_lowercase();
                if label != "www" {
                    hosts.insert(format!("{}.{}", label, self.base_domain));
                }
            }
        }
        hosts
    }

    /// Scan every HTML/CSS/JS file under `dir`.
    pub fn scan_directory(&self, dir: &Path) -> BTreeSet<String> {
        let mut hosts = BTreeSet::new();
        for path in collect_rewritable_files(dir) {
            match std::fs::read(&path) {
                Ok(bytes) => hosts.extend(self.scan(&String::from_utf8_lossy(&bytes))),
                Err(e) => warn!("Error scanning {} for subdomains: {}", path.display(), e),
            }
        }
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn base_domain_rules() {
        assert_eq!(
            extract_base_domain("https://shop.example.co.uk/").as_deref(),
            Some("example.co.uk")
        );
        assert_eq!(
            extract_base_domain("https://a.b.example.com/").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            extract_base_domain("https://Example.com").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            extract_base_domain("www.example.org").as_deref(),
            Some("example.org")
        );
        assert_eq!(extract_base_domain("localhost").as_deref(), Some("localhost"));
        assert_eq!(extract_base_domain(""), None);
    }

    #[test]
    fn host_of_lowercases() {
        assert_eq!(
            host_of("http://WWW.Example.com:80/a").as_deref(),
            Some("www.example.com")
        );
    }

    #[test]
    fn finds_links_in_each_context() {
        let scanner = SubdomainScanner::new("example.com").unwrap();
        let content = r#"
            <a href="https://blog.example.com/post">x</a>
            <img src='http://img.example.com/a.png'>
            <style>body { background: url(https://static.example.com/bg.png) }</style>
            <script>fetch("https://api.example.com/v1")</script>
            <a href="https://www.example.com/">home</a>
            <a href="https://example.com/">root</a>
            <a href="https://blog.example.community/">other</a>
        "#;

        let hosts: Vec<_> = scanner.scan(content).into_iter().collect();
        assert_eq!(
            hosts,
            vec![
                "api.example.com",
                "blog.example.com",
                "img.example.com",
                "static.example.com",
            ]
        );
    }

    #[test]
    fn scans_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(
            dir.path().join("a/index.html"),
            r#"<a href="https://docs.example.com/">d</a>"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("notes.txt"),
            r#""https://ignored.example.com/""#,
        )
        .unwrap();

        let scanner = SubdomainScanner::new("example.com").unwrap();
        let hosts: Vec<_> = scanner.scan_directory(dir.path()).into_iter().collect();
        assert_eq!(hosts, vec!["docs.example.com"]);
    }
}
