use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::aggregator::{finalize, Aggregator, RunProgress, RunReport};
use crate::config::{Config, RunPlan};
use crate::crawler::{HttpFetcher, PageFetcher};
use crate::queue;
use crate::resolver::UrlResolver;
use crate::sink::{CsvSink, RecordSink};
use crate::worker::{self, Jitter};

/// Runs every task of `plan` across a fixed pool of workers.
///
/// `make_fetcher` is called once per worker; each worker owns the client it
/// gets. Task misses never fail the run: only an invalid plan or a client
/// that cannot be built does.
pub async fn run<P, F>(
    plan: &RunPlan,
    resolver: UrlResolver,
    make_fetcher: F,
    cancel: CancellationToken,
    progress: Option<watch::Sender<RunProgress>>,
) -> Result<RunReport>
where
    P: PageFetcher + 'static,
    F: Fn() -> Result<P>,
{
    let started = Instant::now();
    let tasks = queue::enumerate(plan)?;
    let total = tasks.len();

    info!(
        "🚀 Starting scrape: {} to {}, {} categories, {} tasks, {} workers",
        plan.start_year,
        plan.end_year,
        plan.categories.len(),
        total,
        plan.workers
    );

    let fetchers = (0..plan.workers)
        .map(|id| make_fetcher().with_context(|| format!("building fetch client for worker {id}")))
        .collect::<Result<Vec<P>>>()?;

    let resolver = Arc::new(resolver);
    let jitter = Jitter {
        min: plan.min_delay,
        max: plan.max_delay,
    };
    let (tx, rx) = mpsc::channel(plan.workers * 4);

    let handles: Vec<_> = fetchers
        .into_iter()
        .zip(queue::assign_round_robin(tasks, plan.workers))
        .enumerate()
        .map(|(id, (fetcher, queue))| {
            tokio::spawn(worker::run_worker(
                id,
                fetcher,
                queue,
                resolver.clone(),
                jitter,
                tx.clone(),
                cancel.clone(),
            ))
        })
        .collect();
    // Workers hold the only senders now; the aggregator stops when they finish.
    drop(tx);

    let aggregator = Aggregator::new(total, plan.progress_every, progress);
    let (stats, records) = aggregator.consume(rx).await;

    for handle in handles {
        if let Err(e) = handle.await {
            error!("🔥 Worker ended abnormally: {}", e);
        }
    }

    let (records, duplicates_removed) = finalize(records);

    Ok(RunReport {
        stats,
        records,
        duplicates_removed,
        elapsed: started.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}

/// Live run against the configured site, summary logged, records to CSV.
pub async fn run_to_csv(
    config: &Config,
    plan: &RunPlan,
    cancel: CancellationToken,
    progress: Option<watch::Sender<RunProgress>>,
    output: &Path,
) -> Result<RunReport> {
    let fetch = config.fetch.clone();
    let report = run(
        plan,
        UrlResolver::new(&config.base_url),
        move || HttpFetcher::new(fetch.clone()),
        cancel,
        progress,
    )
    .await?;

    report.log_summary();

    let mut sink = CsvSink::create(output)?;
    sink.accept_all(&report.records)?;
    Ok(report)
}
