//! Frontier: the URL work queue
//!
//! The frontier owns the pending queue, the visited set, and the admission
//! bookkeeping (depth bound, page cap, same-domain filter). It is the only
//! place URLs enter the crawl, and it is internally synchronized: callers
//! see the atomic operations here, never the queue or set underneath.
//!
//! Admission marks the visited set immediately, so two workers discovering
//! the same URL concurrently can never both enqueue it. The pending queue
//! is FIFO, which gives breadth-first depth progression. Retries re-enter
//! at the back of the queue without a second visited check and without
//! counting against the page cap.

use crate::config::CrawlerConfig;
use crate::url::{extract_domain, normalize_url};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use url::Url;

/// A unit of crawl work: one URL awaiting fetch
#[derive(Debug, Clone)]
pub struct UrlTask {
    /// Normalized, absolute URL
    pub url: Url,

    /// Link depth from the seeds (seeds are depth 0)
    pub depth: u32,

    /// Politeness domain this URL belongs to
    pub domain: String,

    /// Fetch attempts made so far (0 until first dispatch)
    pub attempts: u32,

    /// When this task was admitted
    pub enqueued_at: Instant,
}

/// Mutable frontier state, guarded by one short-held mutex
struct Inner {
    pending: VecDeque<UrlTask>,
    visited: HashSet<String>,
    admitted: usize,
    in_flight: usize,
    pending_retries: usize,
    // Retries overtaken by close(); the coordinator settles these as
    // abandoned so every dispatched task still gets a terminal record.
    orphaned: Vec<UrlTask>,
    closed: bool,
}

/// The URL work queue shared by all workers
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    close_notify: Notify,
    max_depth: u32,
    max_pages: usize,
    same_domain_only: bool,
    seed_domains: HashSet<String>,
}

impl Frontier {
    /// Creates a new frontier
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler bounds (max_depth, max_pages, same_domain_only)
    /// * `seed_domains` - The domains of the seed URLs; the same-domain
    ///   filter compares candidates against this whole set
    pub fn new(config: &CrawlerConfig, seed_domains: HashSet<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                visited: HashSet::new(),
                admitted: 0,
                in_flight: 0,
                pending_retries: 0,
                orphaned: Vec::new(),
                closed: false,
            }),
            notify: Notify::new(),
            close_notify: Notify::new(),
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            same_domain_only: config.same_domain_only,
            seed_domains,
        }
    }

    /// Offers a URL for admission
    ///
    /// The URL is normalized first, so fragment/case/default-port variants
    /// of an already-seen URL are rejected as duplicates. Admission requires
    /// all of:
    ///
    /// - the URL parses and has a host
    /// - `depth <= max_depth`
    /// - the domain matches a seed domain, when `same_domain_only` is set
    /// - the URL is not in the visited set
    /// - fewer than `max_pages` URLs have been admitted
    /// - the frontier is not closed
    ///
    /// Non-admission is silent (a debug event, not an error): dropping
    /// out-of-bounds links is normal operation.
    ///
    /// # Returns
    ///
    /// `true` if the task was admitted
    pub fn enqueue(&self, raw_url: &str, depth: u32) -> bool {
        let url = match normalize_url(raw_url) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!("Dropping malformed URL {}: {}", raw_url, e);
                return false;
            }
        };

        let domain = match extract_domain(&url) {
            Some(d) => d,
            None => {
                tracing::debug!("Dropping URL without host: {}", url);
                return false;
            }
        };

        if depth > self.max_depth {
            tracing::debug!("Dropping {} (depth {} > {})", url, depth, self.max_depth);
            return false;
        }

        if self.same_domain_only && !self.seed_domains.contains(&domain) {
            tracing::debug!("Dropping off-domain URL {}", url);
            return false;
        }

        let key = url.as_str().to_string();
        {
            let mut inner = self.inner.lock().unwrap();

            if inner.closed {
                return false;
            }
            if inner.visited.contains(&key) {
                return false;
            }
            if inner.admitted >= self.max_pages {
                tracing::debug!("Page cap {} reached, dropping {}", self.max_pages, url);
                return false;
            }

            inner.visited.insert(key);
            inner.admitted += 1;
            inner.pending.push_back(UrlTask {
                url: url.clone(),
                depth,
                domain,
                attempts: 0,
                enqueued_at: Instant::now(),
            });
        }

        tracing::debug!("Admitted {} at depth {}", url, depth);
        self.notify.notify_one();
        true
    }

    /// Takes the next task, waiting until one is available
    ///
    /// Blocks the calling worker (as a suspension, not a busy wait) until a
    /// task is ready or the frontier is closed. The frontier closes itself
    /// when the queue is empty, nothing is in flight, and no delayed retry
    /// is pending: at that point no task can ever arrive again.
    ///
    /// The returned task counts as in flight until the caller either calls
    /// [`task_done`](Self::task_done) or hands it back via
    /// [`requeue`](Self::requeue).
    ///
    /// # Returns
    ///
    /// * `Some(UrlTask)` - The next task in FIFO order
    /// * `None` - The frontier is closed
    pub async fn dequeue(&self) -> Option<UrlTask> {
        loop {
            // Register for notification before checking state, otherwise a
            // notify between the check and the await would be lost.
            let notified = self.notify.notified();

            {
                let mut inner = self.inner.lock().unwrap();

                if let Some(task) = inner.pending.pop_front() {
                    inner.in_flight += 1;
                    return Some(task);
                }

                if inner.closed {
                    return None;
                }

                if inner.in_flight == 0 && inner.pending_retries == 0 {
                    // Drained: nothing pending, nothing that could produce
                    // more work. Close and wake the other dequeuers.
                    inner.closed = true;
                    drop(inner);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Re-admits a task for retry after `delay` elapses
    ///
    /// The task keeps its in-flight accounting alive as a pending retry, so
    /// the frontier cannot close underneath it. No visited check and no page
    /// cap check: the URL was already admitted once.
    ///
    /// A retry overtaken by [`close`](Self::close) is not dropped: it moves
    /// to the orphan list for the coordinator to settle as abandoned (see
    /// [`take_abandoned`](Self::take_abandoned)), and its backoff sleep is
    /// cut short so shutdown never waits out a full backoff.
    pub fn requeue(self: &Arc<Self>, task: UrlTask, delay: Duration) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.in_flight -= 1;
            if inner.closed {
                // Shutdown already in progress; hand the task over for an
                // abandoned record instead of losing it.
                inner.orphaned.push(task);
                drop(inner);
                self.notify.notify_waiters();
                return;
            }
            inner.pending_retries += 1;
        }

        let frontier = Arc::clone(self);
        tokio::spawn(async move {
            // Register for the close signal before re-checking, otherwise a
            // close between the check and the select would be missed.
            let closed_wake = frontier.close_notify.notified();
            tokio::pin!(closed_wake);

            let expired = if frontier.is_closed() {
                false
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => true,
                    _ = &mut closed_wake => false,
                }
            };

            {
                let mut inner = frontier.inner.lock().unwrap();
                inner.pending_retries -= 1;
                if expired && !inner.closed {
                    inner.pending.push_back(task);
                } else {
                    inner.orphaned.push(task);
                }
            }

            // notify_waiters rather than notify_one: besides dequeuers,
            // wait_retries_settled may be blocked on this counter.
            frontier.notify.notify_waiters();
        });
    }

    /// Marks an in-flight task as terminally finished
    ///
    /// Called once per dequeued task that is not requeued. If this was the
    /// last live task and the queue is empty, the frontier closes.
    pub fn task_done(&self) {
        let drained = {
            let mut inner = self.inner.lock().unwrap();
            inner.in_flight -= 1;
            if !inner.closed
                && inner.pending.is_empty()
                && inner.in_flight == 0
                && inner.pending_retries == 0
            {
                inner.closed = true;
                true
            } else {
                false
            }
        };

        if drained {
            self.notify.notify_waiters();
        }
    }

    /// Closes the frontier and wakes all blocked dequeuers
    ///
    /// Used for cancellation. Pending tasks are discarded; in-flight tasks
    /// are unaffected (their fetches run to completion or timeout).
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.closed = true;
            inner.pending.clear();
        }
        self.notify.notify_waiters();
        // Wake sleeping retry timers so they orphan their tasks now.
        self.close_notify.notify_waiters();
    }

    /// Waits until no delayed retry is outstanding
    ///
    /// Called after the workers exit so the coordinator can collect orphaned
    /// retries; after `close()` the backoff sleeps are interrupted, so this
    /// settles promptly.
    pub async fn wait_retries_settled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.inner.lock().unwrap().pending_retries == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Takes the retries that were cancelled by `close()`
    ///
    /// Each returned task was dispatched at least once but never reached a
    /// terminal outcome; the caller settles them as abandoned.
    pub fn take_abandoned(&self) -> Vec<UrlTask> {
        std::mem::take(&mut self.inner.lock().unwrap().orphaned)
    }

    /// Total URLs admitted so far (the page-cap counter)
    pub fn admitted(&self) -> usize {
        self.inner.lock().unwrap().admitted
    }

    /// Number of tasks currently queued
    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Whether the frontier has closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}
