use crate::game::installer::config::{DEFAULT_CONCURRENCY, POLITENESS_DELAY_MS};
use crate::game::installer::core::downloader::{download_to_path, DownloadOutcome};
use crate::game::installer::types::ProgressReporter;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct BatchArtifact {
    pub name: String,
    /// Tried in order until one succeeds.
    pub urls: Vec<String>,
    pub path: PathBuf,
    pub sha1: Option<String>,
}

/// Outcome of a batch. Individual failures never abort the batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Bounded-concurrency worker pool over a list of downloads.
pub struct BatchDownloader {
    client: Client,
    concurrency: usize,
    delay: Duration,
    report_every: usize,
}

enum ItemResult {
    Downloaded,
    Skipped,
    Failed(String),
}

impl BatchDownloader {
    pub fn new(client: Client, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            delay: Duration::from_millis(POLITENESS_DELAY_MS),
            report_every: 10,
        }
    }

    pub fn sequential(client: Client) -> Self {
        Self::new(client, DEFAULT_CONCURRENCY)
    }

    /// Report progress every `n` completed items (and at the end).
    pub fn report_every(mut self, n: usize) -> Self {
        self.report_every = n.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn download_all(
        &self,
        label: &str,
        artifacts: Vec<BatchArtifact>,
        reporter: Arc<dyn ProgressReporter>,
        base_progress: i32,
        progress_weight: f32,
    ) -> BatchReport {
        // Deduplicate artifacts by path to avoid concurrent writes to the same file
        let mut unique_artifacts = Vec::new();
        let mut seen_paths = std::collections::HashSet::new();
        for artifact in artifacts {
            if seen_paths.insert(artifact.path.clone()) {
                unique_artifacts.push(artifact);
            }
        }

        let total = unique_artifacts.len();
        let mut report = BatchReport::default();
        if total == 0 {
            return report;
        }

        let completed = Arc::new(AtomicUsize::new(0));
        reporter.set_step_count(0, Some(total as u32));

        let results = stream::iter(unique_artifacts)
            .map(|artifact| {
                let client = self.client.clone();
                let reporter = reporter.clone();
                let completed = completed.clone();
                let delay = self.delay;
                let report_every = self.report_every;

                async move {
                    let result = if reporter.is_cancelled() {
                        ItemResult::Failed(format!("{}: cancelled", artifact.name))
                    } else {
                        fetch_artifact(&client, &artifact, &*reporter, delay).await
                    };

                    let count = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if count % report_every == 0 || count == total {
                        let progress = base_progress
                            + ((count as f32 / total as f32) * progress_weight) as i32;
                        reporter.set_percent(progress);
                        reporter.set_step_count(count as u32, Some(total as u32));
                        reporter.set_message(&format!("{} ({}/{})", label, count, total));
                        log::info!("[batch] {}: {}/{}", label, count, total);
                    }
                    result
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        for result in results {
            match result {
                ItemResult::Downloaded => report.downloaded += 1,
                ItemResult::Skipped => report.skipped += 1,
                ItemResult::Failed(name) => report.failed.push(name),
            }
        }

        if !report.failed.is_empty() {
            log::warn!(
                "[batch] {}: {} of {} items failed and were skipped",
                label,
                report.failed.len(),
                total
            );
        }
        report
    }
}

async fn fetch_artifact(
    client: &Client,
    artifact: &BatchArtifact,
    reporter: &dyn ProgressReporter,
    delay: Duration,
) -> ItemResult {
    if artifact.path.exists() {
        return ItemResult::Skipped;
    }

    let mut last_err = None;
    for url in &artifact.urls {
        match download_to_path(client, url, &artifact.path, artifact.sha1.as_deref(), reporter)
            .await
        {
            Ok(DownloadOutcome::Skipped) => return ItemResult::Skipped,
            Ok(DownloadOutcome::Downloaded(_)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                return ItemResult::Downloaded;
            }
            Err(e) => {
                log::warn!("Failed to download {} from {}: {:#}", artifact.name, url, e);
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => log::error!("Giving up on {}: {:#}", artifact.name, e),
        None => log::error!("No download URLs provided for {}", artifact.name),
    }
    ItemResult::Failed(artifact.name.clone())
}
