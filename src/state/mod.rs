//! Shared crawl counters
//!
//! Lock-free counters shared by every worker. Outcome tallies are
//! monotonic, so relaxed atomics are enough; the snapshot at the end of a
//! run is taken after all workers have joined.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for a running crawl
#[derive(Debug)]
pub struct CrawlState {
    completed: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    started_at: Instant,
}

impl CrawlState {
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Records a page fetched and parsed successfully
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a page that failed permanently
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a page dropped by shutdown before it was fetched
    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    /// Total pages with a final outcome so far
    pub fn settled(&self) -> u64 {
        self.completed() + self.failed() + self.abandoned()
    }

    /// Freezes the counters into a report
    pub fn report(&self) -> CrawlReport {
        CrawlReport {
            completed: self.completed(),
            failed: self.failed(),
            abandoned: self.abandoned(),
            elapsed: self.started_at.elapsed(),
        }
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

/// Final tallies for a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub completed: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let state = CrawlState::new();
        assert_eq!(state.completed(), 0);
        assert_eq!(state.failed(), 0);
        assert_eq!(state.abandoned(), 0);
        assert_eq!(state.settled(), 0);
    }

    #[test]
    fn test_report_reflects_counts() {
        let state = CrawlState::new();
        state.record_completed();
        state.record_completed();
        state.record_failed();
        state.record_abandoned();

        let report = state.report();
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.abandoned, 1);
        assert_eq!(state.settled(), 4);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;

        let state = Arc::new(CrawlState::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    state.record_completed();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.completed(), 8000);
    }
}
