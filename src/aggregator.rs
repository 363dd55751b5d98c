use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::record::{Record, TaskResult};

/// Task and record counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RunStatistics {
    pub succeeded: usize,
    pub failed: usize,
    pub total_records: usize,
}

/// Snapshot published after every completed task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunProgress {
    pub completed: usize,
    pub total: usize,
    pub stats: RunStatistics,
}

/// Owns the run-wide counters and the collected records. Workers never touch
/// these directly; they send [`TaskResult`]s over a channel instead.
pub struct Aggregator {
    total: usize,
    progress_every: usize,
    started: Instant,
    completed: usize,
    stats: RunStatistics,
    records: Vec<Record>,
    progress: Option<watch::Sender<RunProgress>>,
}

impl Aggregator {
    pub fn new(total: usize, progress_every: usize, progress: Option<watch::Sender<RunProgress>>) -> Self {
        Self {
            total,
            progress_every: progress_every.max(1),
            started: Instant::now(),
            completed: 0,
            stats: RunStatistics::default(),
            records: Vec::new(),
            progress,
        }
    }

    /// Drains the channel until every worker has hung up.
    pub async fn consume(mut self, mut results: mpsc::Receiver<TaskResult>) -> (RunStatistics, Vec<Record>) {
        while let Some(result) = results.recv().await {
            self.absorb(result);
        }
        (self.stats, self.records)
    }

    pub fn absorb(&mut self, result: TaskResult) {
        self.completed += 1;
        let TaskResult {
            task,
            success,
            records,
            source_url,
        } = result;

        if success {
            self.stats.succeeded += 1;
            self.stats.total_records += records.len();
            info!(
                "[{}/{}] OK {} {}: {} athletes",
                self.completed,
                self.total,
                task.category,
                task.year,
                records.len()
            );
            debug!("{} {} accepted from {}", task.category, task.year, source_url.unwrap_or_default());
            self.records.extend(records);
        } else {
            self.stats.failed += 1;
            debug!("[{}/{}] MISS {} {}: not found", self.completed, self.total, task.category, task.year);
        }

        if self.completed % self.progress_every == 0 {
            self.log_progress();
        }

        if let Some(progress) = &self.progress {
            progress.send_replace(RunProgress {
                completed: self.completed,
                total: self.total,
                stats: self.stats,
            });
        }
    }

    fn log_progress(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let pct = self.completed as f64 / self.total.max(1) as f64 * 100.0;
        let eta_min = if elapsed > 0.0 {
            let rate = self.completed as f64 / elapsed;
            self.total.saturating_sub(self.completed) as f64 / rate / 60.0
        } else {
            0.0
        };
        info!(
            "Progress: {}/{} ({:.1}%) - ETA: {:.1} min",
            self.completed, self.total, pct, eta_min
        );
    }
}

/// Sorts by (category, year, name) and keeps one record per
/// (name, category, year). Returns the records and how many were dropped.
pub fn finalize(mut records: Vec<Record>) -> (Vec<Record>, usize) {
    let before = records.len();
    // Full ordering first so the surviving duplicate does not depend on
    // which task finished first.
    records.sort();
    records.dedup_by(|a, b| a.identity() == b.identity());
    let removed = before - records.len();
    (records, removed)
}

/// Final outcome of a run, ready for the sink.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStatistics,
    pub records: Vec<Record>,
    pub duplicates_removed: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunReport {
    /// Record counts per category, largest first.
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &self.records {
            *counts.entry(record.category.as_str()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(category, n)| (category.to_string(), n))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    pub fn log_summary(&self) {
        info!("{}", "=".repeat(50));
        if self.cancelled {
            warn!("SCRAPE CANCELLED (partial results)");
        } else {
            info!("SCRAPE COMPLETE");
        }
        info!("{}", "=".repeat(50));
        info!("Time elapsed: {:.1} minutes", self.elapsed.as_secs_f64() / 60.0);
        info!("Successful pages: {}", self.stats.succeeded);
        info!("Failed pages: {}", self.stats.failed);
        info!("Total records: {}", self.records.len());
        if self.duplicates_removed > 0 {
            info!("Duplicates removed: {}", self.duplicates_removed);
        }
        if self.records.is_empty() {
            warn!("No data extracted. Check connectivity or the site structure.");
            return;
        }
        info!("Records by category:");
        for (category, count) in self.category_counts() {
            info!("   {}: {}", category, count);
        }
    }
}
