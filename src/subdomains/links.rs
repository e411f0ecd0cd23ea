//! Rewriting absolute links to mirrored subdomains into local paths.

use std::path::Path;

use regex::{Captures, Regex};
use tracing::{info, warn};

use crate::config::SUBDOMAINS_DIR;
use crate::rewrite::rewrite_file_with;
use crate::utils::collect_rewritable_files;

struct HostRules {
    host: String,
    html_attr: Regex,
    css_url: Regex,
    js_string: Regex,
}

impl HostRules {
    fn new(host: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(host);
        Ok(Self {
            host: host.to_string(),
            html_attr: Regex::new(&format!(
                r#"(?i)(\s(?:href|src|action|data-src|data-url)\s*=\s*["'])https?://{}((?:[/?#][^"']*)?)(["'])"#,
                escaped
            ))?,
            css_url: Regex::new(&format!(
                r#"(?i)url\(\s*["']?https?://{}((?:[/?#][^"')]*?)?)["']?\s*\)"#,
                escaped
            ))?,
            js_string: Regex::new(&format!(
                r#"(?i)(["'])https?://{}((?:[/?#][^"']*)?)(["'])"#,
                escaped
            ))?,
        })
    }

    fn local(&self, path: &str) -> String {
        let path = if path.is_empty() || path == "/" {
            "/index.html"
        } else {
            path
        };
        format!("../{}/{}{}", SUBDOMAINS_DIR, self.host, path)
    }

    fn apply(&self, content: &str) -> String {
        let content = self
            .html_attr
            .replace_all(content, |caps: &Captures| {
                format!("{}{}{}", &caps[1], self.local(&caps[2]), &caps[3])
            });
        let content = self.css_url.replace_all(&content, |caps: &Captures| {
            format!("url(\"{}\")", self.local(&caps[1]))
        });
        self.js_string
            .replace_all(&content, |caps: &Captures| {
                format!("{}{}{}", &caps[1], self.local(&caps[2]), &caps[3])
            })
            .into_owned()
    }
}

/// Rewrites links to a set of mirrored subdomain hosts.
pub struct SubdomainLinkRewriter {
    rules: Vec<HostRules>,
}

impl SubdomainLinkRewriter {
    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a str>) -> Self {
        let rules = hosts
            .into_iter()
            .filter_map(|host| match HostRules::new(host) {
                Ok(rules) => Some(rules),
                Err(e) => {
                    warn!("Cannot build link rules for {}: {}", host, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn rewrite(&self, content: &str) -> String {
        self.rules
            .iter()
            .fold(content.to_string(), |acc, rules| rules.apply(&acc))
    }

    /// Apply to every HTML/CSS/JS file under `dir`. Returns files changed.
    pub fn rewrite_directory(&self, dir: &Path) -> usize {
        if self.rules.is_empty() {
            return 0;
        }

        let mut rewritten = 0;
        for path in collect_rewritable_files(dir) {
            match rewrite_file_with(&path, |content| self.rewrite(content)) {
                Ok(true) => rewritten += 1,
                Ok(false) => {}
                Err(e) => warn!("Error rewriting file {}: {}", path.display(), e),
            }
        }
        info!("Rewrote subdomain links in {} files", rewritten);
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> SubdomainLinkRewriter {
        SubdomainLinkRewriter::new(["blog.example.com"])
    }

    #[test]
    fn html_attributes() {
        assert_eq!(
            rewriter().rewrite(r#"<a href="https://blog.example.com/post/1.html">x</a>"#),
            r#"<a href="../subdomains/blog.example.com/post/1.html">x</a>"#
        );
        assert_eq!(
            rewriter().rewrite(r#"<a href='http://blog.example.com/'>x</a>"#),
            r#"<a href='../subdomains/blog.example.com/index.html'>x</a>"#
        );
    }

    #[test]
    fn css_urls() {
        assert_eq!(
            rewriter().rewrite("div { background: url( 'https://blog.example.com/bg.png' ) }"),
            r#"div { background: url("../subdomains/blog.example.com/bg.png") }"#
        );
    }

    #[test]
    fn js_strings() {
        assert_eq!(
            rewriter().rewrite(r#"location = "https://blog.example.com";"#),
            r#"location = "../subdomains/blog.example.com/index.html";"#
        );
    }

    #[test]
    fn other_hosts_untouched() {
        let content = r#"<a href="https://blog.example.community/">x</a><a href="https://shop.example.com/">y</a>"#;
        assert_eq!(rewriter().rewrite(content), content);
    }

    #[test]
    fn rewriting_is_idempotent() {
        let content = r#"<a href="https://blog.example.com/a">x</a><script>u='https://blog.example.com/b'</script>"#;
        let once = rewriter().rewrite(content);
        assert_eq!(rewriter().rewrite(&once), once);
    }
}
