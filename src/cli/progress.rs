//! Multi-progress display for concurrent downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// One summary bar plus a spinner per download worker.
pub struct DownloadProgress {
    multi: MultiProgress,
    workers: Vec<ProgressBar>,
    summary_bar: ProgressBar,
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl DownloadProgress {
    /// Create a progress display with one slot per worker.
    pub fn new(num_workers: usize) -> Self {
        let multi = MultiProgress::new();

        // Summary bar at the top
        let summary_bar = multi.add(ProgressBar::new(0));
        summary_bar.set_style(
            style("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}").progress_chars("█▓░"),
        );
        summary_bar.set_message("Downloading");

        let workers = (0..num_workers.max(1))
            .map(|_| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(style("  {spinner:.dim} {wide_msg}"));
                bar.set_message("idle");
                bar
            })
            .collect();

        Self {
            multi,
            workers,
            summary_bar,
        }
    }

    /// Grow the summary bar by a newly queued batch.
    pub fn add_pending(&self, pending: usize) {
        self.summary_bar.inc_length(pending as u64);
    }

    pub fn start_download(&self, worker_id: usize, local_path: &str) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.set_style(style("  {spinner:.cyan} {wide_msg}"));
            bar.set_message(truncate_filename(local_path, 50));
            bar.enable_steady_tick(Duration::from_millis(100));
        }
    }

    pub fn retrying(&self, worker_id: usize, attempt: u32) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.set_message(format!("{} (retry {})", bar.message(), attempt));
        }
    }

    /// Mark a worker idle again and advance the summary.
    pub fn finish_download(&self, worker_id: usize) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.disable_steady_tick();
            bar.set_style(style("  {spinner:.dim} {wide_msg}"));
            bar.set_message("idle");
        }
        self.summary_bar.inc(1);
    }

    /// Update the summary message.
    pub fn set_summary(&self, downloaded: usize, skipped: usize, failed: usize) {
        self.summary_bar.set_message(format!(
            "Downloaded: {} | Skipped: {} | Failed: {}",
            downloaded, skipped, failed
        ));
    }

    /// Finish all progress bars and clear the display.
    pub fn finish(&self) {
        for bar in &self.workers {
            bar.finish_and_clear();
        }
        self.summary_bar.finish_and_clear();
    }

    /// Print a message that coordinates with the progress display.
    pub fn println(&self, message: &str) {
        let _ = self.multi.println(message);
    }
}

/// Truncate a path for display, keeping the extension visible.
fn truncate_filename(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        return name.to_string();
    }

    // Try to keep the extension
    if let Some(dot_pos) = chars.iter().rposition(|&c| c == '.') {
        let ext: String = chars[dot_pos..].iter().collect();
        let ext_len = chars.len() - dot_pos;
        if ext_len + 4 < max_len {
            let prefix: String = chars[..max_len - ext_len - 3].iter().collect();
            return format!("{}...{}", prefix, ext);
        }
    }

    let prefix: String = chars[..max_len.saturating_sub(3)].iter().collect();
    format!("{}...", prefix)
}
