use rand::Rng;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::crawler::{FetchedPage, PageFetcher};
use crate::extractor;
use crate::record::{Record, Task, TaskResult};
use crate::resolver::UrlResolver;
use crate::validator;

/// Bounds of the random pause before each task.
#[derive(Debug, Clone, Copy)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Jitter {
    fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let ms = rand::thread_rng().gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(ms)
    }
}

/// Drains one worker's pre-assigned queue with a fetcher it owns outright.
///
/// Stops taking new tasks once `cancel` fires; a task already past its jitter
/// runs to completion.
pub async fn run_worker<P: PageFetcher>(
    id: usize,
    fetcher: P,
    tasks: Vec<Task>,
    resolver: Arc<UrlResolver>,
    jitter: Jitter,
    results: mpsc::Sender<TaskResult>,
    cancel: CancellationToken,
) {
    info!("👷 [Worker {}] started with {} tasks", id, tasks.len());
    let mut done = 0usize;

    for task in tasks {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(jitter.sample()) => {}
        }

        let result = run_task(&fetcher, &resolver, task).await;
        done += 1;
        if results.send(result).await.is_err() {
            debug!("[Worker {}] aggregator gone, stopping", id);
            break;
        }
    }

    info!("👷 [Worker {}] finished after {} tasks", id, done);
}

/// Walks the candidate URLs for one task and stops at the first page that is
/// a 2xx, passes validation and yields records.
pub async fn run_task<P: PageFetcher + ?Sized>(fetcher: &P, resolver: &UrlResolver, task: Task) -> TaskResult {
    for url in resolver.resolve(&task.category, task.year) {
        let page = match fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                debug!("Abandoning {}: {}", e.url(), e);
                continue;
            }
        };

        if !page.is_success() {
            debug!("{} answered {}, trying next candidate", url, page.status);
            continue;
        }

        match inspect_page(&page, &task, &url) {
            PageOutcome::Accepted(records) => return TaskResult::hit(task, url, records),
            PageOutcome::Rejected => debug!("{} is not the {} roster (not found or redirected)", url, task.year),
            PageOutcome::Empty => debug!("{} (served from {}) validated but no strategy found records", url, page.url),
        }
    }

    TaskResult::miss(task)
}

enum PageOutcome {
    Accepted(Vec<Record>),
    Rejected,
    Empty,
}

// Kept synchronous: the parsed document must never live across an await.
fn inspect_page(page: &FetchedPage, task: &Task, url: &str) -> PageOutcome {
    let document = Html::parse_document(&page.content);
    if !validator::validate(&document, Some(task.year)) {
        return PageOutcome::Rejected;
    }
    let records = extractor::extract(&document, &task.category, task.year, url);
    if records.is_empty() {
        PageOutcome::Empty
    } else {
        PageOutcome::Accepted(records)
    }
}
