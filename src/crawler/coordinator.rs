use crate::config::CrawlerConfig;
use crate::crawler::fetcher::PageFetcher;
use crate::frontier::{Frontier, UrlTask};
use crate::politeness::{RateLimiter, RobotsGuard};
use crate::retry::{Decision, FailureKind, RetryPolicy};
use crate::sink::CrawlRecord;
use crate::state::{CrawlReport, CrawlState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// The worker pool driving a crawl
///
/// Spawns a fixed number of workers that pull from the frontier, pass the
/// politeness gates, fetch, and feed discovered links back in. Concurrency
/// is bounded by the worker count alone: no extra semaphore, a worker is
/// one in-flight fetch at most.
///
/// Shutdown is cooperative. The deadline (when configured) closes the
/// frontier and raises a flag that workers check between await points;
/// a fetch already on the wire runs to completion or timeout, never
/// cancelled mid-request.
pub struct FetchCoordinator {
    config: CrawlerConfig,
    frontier: Arc<Frontier>,
    limiter: Arc<RateLimiter>,
    robots: Arc<RobotsGuard>,
    retry: Arc<RetryPolicy>,
    fetcher: Arc<dyn PageFetcher>,
    state: Arc<CrawlState>,
    records: mpsc::UnboundedSender<CrawlRecord>,
}

impl FetchCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CrawlerConfig,
        frontier: Arc<Frontier>,
        limiter: Arc<RateLimiter>,
        robots: Arc<RobotsGuard>,
        retry: Arc<RetryPolicy>,
        fetcher: Arc<dyn PageFetcher>,
        state: Arc<CrawlState>,
        records: mpsc::UnboundedSender<CrawlRecord>,
    ) -> Self {
        Self {
            config,
            frontier,
            limiter,
            robots,
            retry,
            fetcher,
            state,
            records,
        }
    }

    /// Runs the crawl to completion
    ///
    /// Returns once every worker has exited: either the frontier drained
    /// naturally or the deadline closed it and the in-flight tail settled.
    pub async fn run(self) -> CrawlReport {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let deadline_task = self.config.crawl_deadline().map(|deadline| {
            let frontier = Arc::clone(&self.frontier);
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!("Crawl deadline of {:?} reached, shutting down", deadline);
                // Raising the flag before closing lets workers blocked in
                // dequeue observe shutdown as soon as they wake.
                let _ = shutdown_tx.send(true);
                frontier.close();
            })
        });

        let worker_count = self.config.max_concurrent.max(1);
        tracing::info!("Starting crawl with {} workers", worker_count);

        let mut workers = Vec::with_capacity(worker_count as usize);
        for worker_id in 0..worker_count {
            let worker = Worker {
                timeout: self.config.per_request_timeout(),
                frontier: Arc::clone(&self.frontier),
                limiter: Arc::clone(&self.limiter),
                robots: Arc::clone(&self.robots),
                retry: Arc::clone(&self.retry),
                fetcher: Arc::clone(&self.fetcher),
                state: Arc::clone(&self.state),
                records: self.records.clone(),
                shutdown: shutdown_rx.clone(),
            };
            workers.push(tokio::spawn(worker.run(worker_id)));
        }

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker panicked: {}", e);
            }
        }

        // Retries cut off by close() never reached a worker again; settle
        // them as abandoned so every dispatched task gets a terminal record.
        self.frontier.wait_retries_settled().await;
        for task in self.frontier.take_abandoned() {
            tracing::debug!("Abandoning {} (retry cancelled by shutdown)", task.url);
            if self
                .records
                .send(CrawlRecord::abandoned(task.url.to_string(), task.depth))
                .is_err()
            {
                tracing::debug!("Record channel closed, output dropped");
            }
            self.state.record_abandoned();
        }

        if let Some(task) = deadline_task {
            task.abort();
        }

        self.state.report()
    }
}

/// One fetch worker
struct Worker {
    timeout: Duration,
    frontier: Arc<Frontier>,
    limiter: Arc<RateLimiter>,
    robots: Arc<RobotsGuard>,
    retry: Arc<RetryPolicy>,
    fetcher: Arc<dyn PageFetcher>,
    state: Arc<CrawlState>,
    records: mpsc::UnboundedSender<CrawlRecord>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(self, worker_id: u32) {
        tracing::debug!("Worker {} started", worker_id);
        while let Some(task) = self.frontier.dequeue().await {
            self.process(task).await;
        }
        tracing::debug!("Worker {} finished", worker_id);
    }

    fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn process(&self, mut task: UrlTask) {
        if self.shutting_down() {
            self.abandon(task);
            return;
        }

        self.limiter.acquire(&task.domain).await;

        // The rate-limit wait can be long; re-check before spending a fetch.
        if self.shutting_down() {
            self.abandon(task);
            return;
        }

        if !self.robots.is_allowed(&task.url).await {
            tracing::info!("Skipping {} (disallowed by robots.txt)", task.url);
            self.settle_failed(&task, None, FailureKind::RobotsDenied.to_string());
            return;
        }

        if let Some(delay) = self.robots.crawl_delay(&task.domain) {
            self.limiter.apply_crawl_delay(&task.domain, delay);
        }

        if self.shutting_down() {
            self.abandon(task);
            return;
        }

        task.attempts += 1;
        match self.fetcher.fetch(&task.url, self.timeout).await {
            Ok(page) => {
                tracing::info!(
                    "Crawled {} (depth {}, {} links, attempt {})",
                    task.url,
                    task.depth,
                    page.links.len(),
                    task.attempts
                );
                tracing::debug!(
                    "{} settled {}ms after admission",
                    task.url,
                    task.enqueued_at.elapsed().as_millis()
                );

                for link in &page.links {
                    self.frontier.enqueue(link, task.depth + 1);
                }

                self.send_record(CrawlRecord::completed(
                    task.url.to_string(),
                    task.depth,
                    page.status,
                    task.attempts,
                    page.links.len(),
                    page.title,
                ));
                self.state.record_completed();
                self.frontier.task_done();
            }
            Err(failure) => match self.retry.classify(&failure.kind, task.attempts) {
                Decision::Retry => {
                    let delay = self.retry.next_delay(task.attempts);
                    tracing::info!(
                        "Retrying {} in {:.1}s ({}, attempt {}/{})",
                        task.url,
                        delay.as_secs_f64(),
                        failure.kind,
                        task.attempts,
                        self.retry.max_attempts()
                    );
                    self.frontier.requeue(task, delay);
                }
                Decision::Fatal => {
                    tracing::warn!(
                        "Giving up on {} after {} attempt(s): {}",
                        task.url,
                        task.attempts,
                        failure.detail
                    );
                    let status = match failure.kind {
                        FailureKind::HttpStatus(code) => Some(code),
                        _ => None,
                    };
                    self.settle_failed(&task, status, failure.kind.to_string());
                }
            },
        }
    }

    fn settle_failed(&self, task: &UrlTask, status: Option<u16>, error: String) {
        self.send_record(CrawlRecord::failed(
            task.url.to_string(),
            task.depth,
            status,
            task.attempts,
            error,
        ));
        self.state.record_failed();
        self.frontier.task_done();
    }

    fn abandon(&self, task: UrlTask) {
        tracing::debug!("Abandoning {} (shutdown)", task.url);
        self.send_record(CrawlRecord::abandoned(task.url.to_string(), task.depth));
        self.state.record_abandoned();
        self.frontier.task_done();
    }

    fn send_record(&self, record: CrawlRecord) {
        if self.records.send(record).is_err() {
            tracing::debug!("Record channel closed, output dropped");
        }
    }
}
