//! Command implementations.

use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use wayback_mirror::config::MirrorConfig;
use wayback_mirror::mirror::{Mirror, MirrorReport};
use wayback_mirror::services::download::DownloadEvent;

use super::progress::DownloadProgress;

/// Mirror a site, printing a summary when done.
pub async fn cmd_download(config: MirrorConfig, show_progress: bool) -> anyhow::Result<()> {
    println!(
        "{} Mirroring {} into {}",
        style("→").cyan(),
        config.base_url,
        config.backup_path().display()
    );

    // Event channel for progress updates
    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);

    // Set up progress display (UI concern)
    let progress_display = if show_progress {
        Some(Arc::new(DownloadProgress::new(config.threads_count)))
    } else {
        None
    };

    // Spawn event handler task (UI layer)
    let progress_clone = progress_display.clone();
    let event_handler = tokio::spawn(async move {
        let mut downloaded = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::Queued {
                    pending,
                    skipped: already,
                } => {
                    skipped += already;
                    if let Some(ref progress) = progress_clone {
                        progress.add_pending(pending);
                        progress.set_summary(downloaded, skipped, failed);
                    }
                }
                DownloadEvent::Started {
                    worker_id,
                    local_path,
                    ..
                } => {
                    if let Some(ref progress) = progress_clone {
                        progress.start_download(worker_id, &local_path);
                    }
                }
                DownloadEvent::Retrying {
                    worker_id, attempt, ..
                } => {
                    if let Some(ref progress) = progress_clone {
                        progress.retrying(worker_id, attempt);
                    }
                }
                DownloadEvent::Saved { worker_id, .. } => {
                    downloaded += 1;
                    if let Some(ref progress) = progress_clone {
                        progress.set_summary(downloaded, skipped, failed);
                        progress.finish_download(worker_id);
                    }
                }
                DownloadEvent::Failed {
                    worker_id,
                    url,
                    error,
                } => {
                    failed += 1;
                    let message = format!(
                        "{} Failed to download {}: {}",
                        style("✗").red(),
                        url,
                        error
                    );
                    if let Some(ref progress) = progress_clone {
                        progress.println(&message);
                        progress.set_summary(downloaded, skipped, failed);
                        progress.finish_download(worker_id);
                    } else {
                        eprintln!("{}", message);
                    }
                }
            }
        }
    });

    let mirror = Mirror::new(config)?.with_events(event_tx);
    let result = mirror.run().await;

    // Close the channel so the handler drains and exits
    drop(mirror);
    let _ = event_handler.await;
    if let Some(progress) = progress_display {
        progress.finish();
    }

    print_report(&result?);
    Ok(())
}

fn print_report(report: &MirrorReport) {
    if report.curated == 0 {
        println!(
            "{} No files to download ({} snapshots found)",
            style("!").yellow(),
            report.snapshots
        );
    } else {
        println!(
            "{} Saved {} files to {} ({} already present, {} failed)",
            style("✓").green(),
            report.downloaded,
            report.backup_path.display(),
            report.skipped,
            report.failed
        );
    }

    if report.rewritten > 0 {
        println!(
            "  {} Rewrote archive links in {} files",
            style("→").dim(),
            report.rewritten
        );
    }

    if let Some(ref subdomains) = report.subdomains {
        println!(
            "{} Mirrored {} subdomains ({} failed, {} empty)",
            style("✓").green(),
            subdomains.mirrored.len(),
            subdomains.failed.len(),
            subdomains.empty.len()
        );
        for record in &subdomains.mirrored {
            println!("  {} {} (depth {})", style("→").dim(), record.host, record.depth);
        }
        for host in &subdomains.failed {
            println!("  {} {}", style("✗").red(), host);
        }
    }

    if !report.failed_urls.is_empty() {
        println!(
            "{} {} files could not be downloaded; rerun to retry them:",
            style("!").yellow(),
            report.failed_urls.len()
        );
        for url in &report.failed_urls {
            println!("  {}", url);
        }
    }
}

/// Print the curated file list as JSON.
pub async fn cmd_list(config: MirrorConfig) -> anyhow::Result<()> {
    let mirror = Mirror::new(config)?;
    let list = mirror.curated_file_list().await;
    println!("{}", serde_json::to_string_pretty(list.entries())?);
    Ok(())
}

/// Remove the state files of a site's backup.
pub fn cmd_reset(config: MirrorConfig) -> anyhow::Result<()> {
    let mirror = Mirror::new(config)?;
    let removed = mirror.reset()?;

    if removed.is_empty() {
        println!(
            "{} No state files in {}",
            style("!").yellow(),
            mirror.config().backup_path().display()
        );
    } else {
        let names: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
        println!(
            "{} Removed state files: {}",
            style("✓").green(),
            names.join(", ")
        );
    }
    Ok(())
}
