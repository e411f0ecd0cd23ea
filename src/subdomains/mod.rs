//! Breadth-first mirroring of subdomains linked from a mirrored site.
//!
//! Links to `<label>.<base_domain>` found in downloaded HTML/CSS/JS become
//! nested, non-recursive mirror runs under `<backup>/subdomains/<host>/`.
//! Every host at depth `d` is downloaded before depth `d + 1` is scanned.

mod links;
mod scan;

pub use links::SubdomainLinkRewriter;
pub use scan::{extract_base_domain, host_of, SubdomainScanner};

use std::collections::{HashSet, VecDeque};

use tracing::{info, warn};

use crate::mirror::Mirror;

/// A subdomain host and the depth at which it was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainRecord {
    pub host: String,
    pub depth: usize,
}

/// Processed set and pending queue for one traversal.
#[derive(Debug)]
pub struct TraversalState {
    base_domain: String,
    processed: HashSet<String>,
    queued: HashSet<String>,
    queue: VecDeque<SubdomainRecord>,
}

impl TraversalState {
    /// Start a traversal; the base domain and the site's own host count as processed.
    pub fn new(base_domain: &str, base_host: &str) -> Self {
        let processed = [base_domain, base_host]
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        Self {
            base_domain: base_domain.to_lowercase(),
            processed,
            queued: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Queue `host` at `depth` unless it was already processed or queued.
    pub fn enqueue(&mut self, host: &str, depth: usize) -> bool {
        let host = host.to_lowercase();
        if self.processed.contains(&host) || self.queued.contains(&host) {
            return false;
        }
        self.queued.insert(host.clone());
        self.queue.push_back(SubdomainRecord { host, depth });
        true
    }

    /// Take every queued record at the shallowest pending depth.
    pub fn next_level(&mut self) -> Vec<SubdomainRecord> {
        let Some(depth) = self.queue.front().map(|r| r.depth) else {
            return Vec::new();
        };
        let mut level = Vec::new();
        while self.queue.front().is_some_and(|r| r.depth == depth) {
            if let Some(record) = self.queue.pop_front() {
                level.push(record);
            }
        }
        level
    }

    pub fn mark_processed(&mut self, host: &str) {
        let host = host.to_lowercase();
        self.queued.remove(&host);
        self.processed.insert(host);
    }

    pub fn is_processed(&self, host: &str) -> bool {
        self.processed.contains(&host.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Outcome of a subdomain traversal.
#[derive(Debug, Default)]
pub struct SubdomainReport {
    /// Hosts with at least one file on disk, in processing order.
    pub mirrored: Vec<SubdomainRecord>,
    /// Hosts whose nested run failed.
    pub failed: Vec<String>,
    /// Hosts the archive had no files for.
    pub empty: Vec<String>,
    /// Files whose subdomain links were rewritten.
    pub rewritten: usize,
}

/// Mirror subdomains linked from `mirror`'s backup, breadth first.
///
/// Per-host failures are logged and recorded; they never stop the traversal.
pub async fn process_subdomains(mirror: &Mirror) -> SubdomainReport {
    let config = mirror.config();
    let mut report = SubdomainReport::default();

    let Some(base_domain) = extract_base_domain(&config.base_url) else {
        warn!("Cannot determine base domain of {}", config.base_url);
        return report;
    };
    let scanner = match SubdomainScanner::new(&base_domain) {
        Ok(scanner) => scanner,
        Err(e) => {
            warn!("Cannot scan for subdomains of {}: {}", base_domain, e);
            return report;
        }
    };
    let base_host = host_of(&config.base_url).unwrap_or_else(|| base_domain.clone());
    let max_depth = config.subdomain_depth;
    let backup_path = config.backup_path();

    let mut state = TraversalState::new(&base_domain, &base_host);
    if max_depth > 0 {
        for host in scanner.scan_directory(&backup_path) {
            state.enqueue(&host, 1);
        }
    }

    while !state.is_empty() {
        let level = state.next_level();
        let depth = level.first().map_or(0, |r| r.depth);
        info!(
            "Processing {} subdomains of {} at depth {}",
            level.len(),
            state.base_domain(),
            depth
        );

        for record in level {
            state.mark_processed(&record.host);
            let nested = mirror.nested(config.for_subdomain(&record.host));
            match nested.download_files().await {
                Ok(nested_report) => {
                    info!(
                        "Subdomain {}: {} downloaded, {} skipped, {} failed",
                        record.host,
                        nested_report.downloaded,
                        nested_report.skipped,
                        nested_report.failed
                    );
                    if nested_report.downloaded + nested_report.skipped > 0 {
                        report.mirrored.push(record);
                    } else {
                        report.empty.push(record.host);
                    }
                }
                Err(e) => {
                    warn!("Error processing subdomain {}: {:#}", record.host, e);
                    report.failed.push(record.host);
                }
            }
        }

        if depth < max_depth {
            for host in scanner.scan_directory(&config.subdomains_path()) {
                state.enqueue(&host, depth + 1);
            }
        }
    }

    if config.rewrite && !report.mirrored.is_empty() {
        let rewriter = SubdomainLinkRewriter::new(report.mirrored.iter().map(|r| r.host.as_str()));
        report.rewritten = rewriter.rewrite_directory(&backup_path);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_hosts_are_never_queued() {
        let mut state = TraversalState::new("example.com", "www.example.com");
        assert!(!state.enqueue("example.com", 1));
        assert!(!state.enqueue("WWW.example.com", 1));
        assert!(state.enqueue("blog.example.com", 1));
        assert!(!state.enqueue("blog.example.com", 1));
    }

    #[test]
    fn processed_hosts_are_not_requeued() {
        let mut state = TraversalState::new("example.com", "example.com");
        state.enqueue("blog.example.com", 1);
        let level = state.next_level();
        assert_eq!(level.len(), 1);
        state.mark_processed("blog.example.com");

        assert!(!state.enqueue("blog.example.com", 2));
        assert!(state.is_processed("blog.example.com"));
        assert!(state.is_empty());
    }

    #[test]
    fn levels_come_out_in_depth_order() {
        let mut state = TraversalState::new("example.com", "example.com");
        state.enqueue("a.example.com", 1);
        state.enqueue("b.example.com", 1);
        state.enqueue("c.example.com", 2);

        let first: Vec<_> = state.next_level().into_iter().map(|r| r.host).collect();
        assert_eq!(first, vec!["a.example.com", "b.example.com"]);
        let second = state.next_level();
        assert_eq!(
            second,
            vec![SubdomainRecord {
                host: "c.example.com".to_string(),
                depth: 2
            }]
        );
        assert!(state.next_level().is_empty());
    }
}
