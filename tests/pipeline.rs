//! End-to-end runs of the mirror pipeline against in-memory backends.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use wayback_mirror::archive::cdx::build_raw_archive_url;
use wayback_mirror::archive::{ArchiveError, Snapshot, SnapshotListing, SnapshotQuery, SnapshotSource};
use wayback_mirror::http_client::{ContentFetcher, FetchError, FetchedContent};
use wayback_mirror::{Mirror, MirrorConfig, Settings};

const TS: &str = "20200101000000";

#[derive(Default)]
struct FakeArchive {
    listings: HashMap<String, Vec<Snapshot>>,
    bodies: HashMap<String, (String, &'static str)>,
    index_calls: AtomicUsize,
}

impl FakeArchive {
    fn page(mut self, site: &str, url: &str, body: &str, content_type: &'static str) -> Self {
        self.listings
            .entry(site.to_string())
            .or_default()
            .push(Snapshot::new(TS, url));
        self.bodies.insert(
            build_raw_archive_url(TS, url),
            (body.to_string(), content_type),
        );
        self
    }

    fn missing(mut self, site: &str, url: &str) -> Self {
        self.listings
            .entry(site.to_string())
            .or_default()
            .push(Snapshot::new(TS, url));
        self
    }
}

#[async_trait]
impl SnapshotSource for FakeArchive {
    async fn list_snapshots(&self, query: &SnapshotQuery) -> Result<SnapshotListing, ArchiveError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SnapshotListing {
            snapshots: self.listings.get(&query.url).cloned().unwrap_or_default(),
            complete: true,
        })
    }
}

#[async_trait]
impl ContentFetcher for FakeArchive {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        match self.bodies.get(url) {
            Some((body, content_type)) => Ok(FetchedContent {
                bytes: body.as_bytes().to_vec(),
                content_type: Some(content_type.to_string()),
            }),
            None => Err(FetchError::Status(404)),
        }
    }
}

fn site() -> FakeArchive {
    FakeArchive::default()
        .page(
            "https://example.com",
            "https://example.com/",
            r#"<html><body><a href="https://web.archive.org/web/20200101000000/https://example.com/about/">About</a> <a href="https://blog.example.com/">Blog</a></body></html>"#,
            "text/html",
        )
        .page(
            "https://example.com",
            "https://example.com/style.css",
            "body { background: url(https://web.archive.org/web/20200101000000im_/https://example.com/bg.png); }",
            "text/css",
        )
        .page(
            "https://example.com",
            "https://example.com/about/",
            "<html><body>About us</body></html>",
            "text/html",
        )
        .page(
            "https://blog.example.com/",
            "https://blog.example.com/",
            r#"<html><body><a href="https://shop.example.com/">Shop</a></body></html>"#,
            "text/html",
        )
        .page(
            "https://shop.example.com/",
            "https://shop.example.com/",
            "<html><body>Shop</body></html>",
            "text/html",
        )
}

fn config(dir: &Path) -> MirrorConfig {
    let mut config = MirrorConfig::new("https://example.com", &Settings::default());
    config.directory = Some(dir.to_path_buf());
    config.threads_count = 2;
    config
}

fn mirror(archive: &Arc<FakeArchive>, config: MirrorConfig) -> Mirror {
    Mirror::with_backends(config, archive.clone(), archive.clone())
}

fn read(dir: &Path, path: &str) -> String {
    std::fs::read_to_string(dir.join(path)).unwrap()
}

#[tokio::test]
async fn downloads_every_curated_file() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());

    let report = mirror(&archive, config(dir.path())).run().await.unwrap();

    assert_eq!(report.snapshots, 3);
    assert_eq!(report.curated, 3);
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.failed, 0);
    assert!(report.subdomains.is_none());
    assert!(read(dir.path(), "index.html").contains("About"));
    assert!(read(dir.path(), "about/index.html").contains("About us"));
    assert!(dir.path().join("style.css").exists());
    assert!(dir.path().join(".cdx.json").exists());
    assert_eq!(read(dir.path(), ".downloaded.txt").lines().count(), 3);
}

#[tokio::test]
async fn rerun_skips_downloaded_files() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());

    mirror(&archive, config(dir.path())).run().await.unwrap();
    let state_before = read(dir.path(), ".downloaded.txt");

    let report = mirror(&archive, config(dir.path())).run().await.unwrap();

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(read(dir.path(), ".downloaded.txt"), state_before);
    // Second run is served from the snapshot cache
    assert_eq!(archive.index_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_files_are_retried_on_next_run() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site().missing("https://example.com", "https://example.com/gone.pdf"));

    let report = mirror(&archive, config(dir.path())).run().await.unwrap();
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failed_urls.len(), 1);
    assert!(report.failed_urls[0].contains("gone.pdf"));

    let report = mirror(&archive, config(dir.path())).run().await.unwrap();
    assert_eq!(report.skipped, 3);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn rewrite_localizes_archive_links() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());
    let mut config = config(dir.path());
    config.rewrite = true;

    let report = mirror(&archive, config).run().await.unwrap();

    assert!(report.rewritten >= 2);
    let index = read(dir.path(), "index.html");
    assert!(index.contains(r#"href="about/""#));
    assert!(!index.contains("web.archive.org"));
    assert!(read(dir.path(), "style.css").contains(r#"url("bg.png")"#));
}

#[tokio::test]
async fn limit_caps_saved_files() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());
    let mut config = config(dir.path());
    config.download_limit = Some(2);

    let report = mirror(&archive, config).run().await.unwrap();

    assert_eq!(report.downloaded, 2);
    assert_eq!(read(dir.path(), ".downloaded.txt").lines().count(), 2);
}

#[tokio::test]
async fn subdomains_follow_depth_limit() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());
    let mut config = config(dir.path());
    config.recursive_subdomains = true;
    config.subdomain_depth = 1;

    let report = mirror(&archive, config).run().await.unwrap();
    let subdomains = report.subdomains.unwrap();

    let hosts: Vec<&str> = subdomains.mirrored.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(hosts, vec!["blog.example.com"]);
    assert!(dir
        .path()
        .join("subdomains/blog.example.com/index.html")
        .exists());
    assert!(!dir.path().join("subdomains/shop.example.com").exists());
}

#[tokio::test]
async fn deeper_traversal_reaches_nested_subdomains() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());
    let mut config = config(dir.path());
    config.recursive_subdomains = true;
    config.subdomain_depth = 2;
    config.rewrite = true;

    let report = mirror(&archive, config).run().await.unwrap();
    let subdomains = report.subdomains.unwrap();

    let mirrored: Vec<(&str, usize)> = subdomains
        .mirrored
        .iter()
        .map(|r| (r.host.as_str(), r.depth))
        .collect();
    assert_eq!(
        mirrored,
        vec![("blog.example.com", 1), ("shop.example.com", 2)]
    );
    assert!(subdomains.failed.is_empty());
    assert!(read(dir.path(), "subdomains/shop.example.com/index.html").contains("Shop"));
    assert!(read(dir.path(), "index.html")
        .contains(r#"href="../subdomains/blog.example.com/index.html""#));
}

#[tokio::test]
async fn reset_forces_full_redownload() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());

    mirror(&archive, config(dir.path())).run().await.unwrap();

    let mut config = config(dir.path());
    config.reset = true;
    let report = mirror(&archive, config).run().await.unwrap();

    assert_eq!(report.downloaded, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(archive.index_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn corrupt_state_file_does_not_abort_run() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".downloaded.txt"), [0xff, 0xfe, b'\n']).unwrap();
    let archive = Arc::new(site());

    let report = mirror(&archive, config(dir.path())).run().await.unwrap();

    assert_eq!(report.downloaded, 3);
    assert!(dir.path().join("index.html").exists());
}

#[tokio::test]
async fn subdomains_ignore_site_only_filter() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(site());
    let mut config = config(dir.path());
    config.only_filter = Some(r"/^https://example\.com/".to_string());
    config.recursive_subdomains = true;
    config.rewrite = true;

    let report = mirror(&archive, config).run().await.unwrap();
    let subdomains = report.subdomains.unwrap();

    assert_eq!(report.downloaded, 3);
    assert_eq!(subdomains.mirrored.len(), 1);
    assert!(dir
        .path()
        .join("subdomains/blog.example.com/index.html")
        .exists());
}

#[tokio::test]
async fn empty_subdomains_are_not_linked() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(FakeArchive::default().page(
        "https://example.com",
        "https://example.com/",
        r#"<html><body><a href="https://ghost.example.com/">Gone</a></body></html>"#,
        "text/html",
    ));
    let mut config = config(dir.path());
    config.recursive_subdomains = true;
    config.rewrite = true;

    let report = mirror(&archive, config).run().await.unwrap();
    let subdomains = report.subdomains.unwrap();

    assert!(subdomains.mirrored.is_empty());
    assert_eq!(subdomains.empty, vec!["ghost.example.com".to_string()]);
    assert!(read(dir.path(), "index.html").contains(r#"href="https://ghost.example.com/""#));
}
