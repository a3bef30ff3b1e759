use crate::config::PolitenessConfig;
use crate::politeness::bucket::TokenBucket;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate-limit waits longer than this are surfaced as warnings.
const LONG_WAIT_WARN_THRESHOLD: Duration = Duration::from_secs(10);

/// Mutable limiter state: one global bucket plus a per-domain arena
///
/// Keeping both under a single mutex makes "consume one token from each"
/// atomic: either both buckets have a token and both are debited, or
/// neither is touched.
struct LimiterState {
    global: TokenBucket,
    domains: HashMap<String, TokenBucket>,
}

/// Per-domain and global token-bucket rate limiter
///
/// `acquire(domain)` suspends the calling worker (on a tokio timer, never a
/// busy wait, never holding the lock across an await) until both the global
/// bucket and the domain's bucket hold at least one token, then consumes
/// one from each.
///
/// Domain buckets are created lazily on first reference and never removed
/// during a run, so memory is bounded by the distinct-domain count.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    domain_rate: f64,
    burst: u32,
}

impl RateLimiter {
    /// Creates a rate limiter from the politeness configuration
    pub fn new(config: &PolitenessConfig) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                global: TokenBucket::new(config.requests_per_second, config.burst),
                domains: HashMap::new(),
            }),
            domain_rate: config.per_domain_requests_per_second,
            burst: config.burst,
        }
    }

    /// Waits until a fetch to `domain` is permitted, then consumes tokens
    ///
    /// Consumes one token from the global bucket and one from the domain
    /// bucket atomically. Independent domains wait on independent refill
    /// schedules, so one slow domain never delays another beyond the global
    /// bound.
    pub async fn acquire(&self, domain: &str) {
        let mut total_waited = Duration::ZERO;
        let mut warned = false;

        loop {
            let wait = {
                let mut guard = self.state.lock().unwrap();
                let LimiterState { global, domains } = &mut *guard;
                let now = Instant::now();

                let domain_bucket = domains
                    .entry(domain.to_string())
                    .or_insert_with(|| TokenBucket::new(self.domain_rate, self.burst));

                let domain_wait = domain_bucket.time_until_available(now);
                let global_wait = global.time_until_available(now);

                if domain_wait.is_zero() && global_wait.is_zero() {
                    // Both have a token; debit both and go.
                    domain_bucket.try_acquire(now);
                    global.try_acquire(now);
                    return;
                }

                domain_wait.max(global_wait)
            };

            total_waited += wait;
            if !warned && total_waited > LONG_WAIT_WARN_THRESHOLD {
                tracing::warn!(
                    "Rate-limit wait for {} has exceeded {:?}",
                    domain,
                    LONG_WAIT_WARN_THRESHOLD
                );
                warned = true;
            }

            // Small floor so a race with another worker does not turn into
            // a tight loop.
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Applies a robots.txt crawl-delay to a domain
    ///
    /// The domain bucket's refill rate is lowered to `1 / delay_secs`
    /// requests per second when that is stricter than the configured
    /// per-domain rate. Robots.txt can only tighten the bound.
    pub fn apply_crawl_delay(&self, domain: &str, delay_secs: f64) {
        if delay_secs <= 0.0 || !delay_secs.is_finite() {
            return;
        }
        let implied_rate = 1.0 / delay_secs;

        let mut state = self.state.lock().unwrap();
        let bucket = state
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| TokenBucket::new(self.domain_rate, self.burst));

        if implied_rate < bucket.rate() {
            tracing::debug!(
                "Lowering {} to {:.3} req/s per robots.txt crawl-delay",
                domain,
                implied_rate
            );
            bucket.lower_rate(implied_rate);
        }
    }

    /// Number of distinct domains seen so far
    pub fn domain_count(&self) -> usize {
        self.state.lock().unwrap().domains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn limiter(global_rps: f64, domain_rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(&PolitenessConfig {
            requests_per_second: global_rps,
            per_domain_requests_per_second: domain_rps,
            burst,
            ..PolitenessConfig::default()
        })
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = limiter(10.0, 10.0, 1);
        let start = Instant::now();
        limiter.acquire("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_domain_rate_enforced() {
        // 5 req/s, burst 1: 4 waits of ~200ms for 5 acquires.
        let limiter = limiter(100.0, 5.0, 1);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire("example.com").await;
        }
        assert!(
            start.elapsed() >= Duration::from_millis(700),
            "5 acquires at 5 req/s finished in {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_burst_allows_initial_rush() {
        let limiter = limiter(100.0, 1.0, 3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire("example.com").await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_domains_wait_independently() {
        // Per-domain 2 req/s but a generous global bucket: hitting two
        // different domains back to back should not wait.
        let limiter = limiter(100.0, 2.0, 1);
        limiter.acquire("a.com").await;

        let start = Instant::now();
        limiter.acquire("b.com").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_global_rate_caps_across_domains() {
        // Global 2 req/s, burst 1: four acquires across distinct domains
        // still need ~1.5s of global refill.
        let limiter = limiter(2.0, 100.0, 1);
        let start = Instant::now();
        for domain in ["a.com", "b.com", "c.com", "d.com"] {
            limiter.acquire(domain).await;
        }
        assert!(
            start.elapsed() >= Duration::from_millis(1300),
            "global bound not enforced: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_crawl_delay_tightens_domain() {
        let limiter = limiter(100.0, 10.0, 1);
        limiter.apply_crawl_delay("slow.com", 0.5); // 2 req/s

        let start = Instant::now();
        limiter.acquire("slow.com").await;
        limiter.acquire("slow.com").await;
        assert!(
            start.elapsed() >= Duration::from_millis(400),
            "crawl-delay not applied: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_crawl_delay_never_loosens() {
        let limiter = limiter(100.0, 1.0, 1);
        limiter.apply_crawl_delay("fast.com", 0.01); // would be 100 req/s

        limiter.acquire("fast.com").await;
        let start = Instant::now();
        limiter.acquire("fast.com").await;
        // Still bounded by the configured 1 req/s.
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_respect_rate() {
        let limiter = Arc::new(limiter(100.0, 10.0, 1));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire("example.com").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 4 acquires at 10 req/s, burst 1: at least ~300ms.
        assert!(start.elapsed() >= Duration::from_millis(250));
        assert_eq!(limiter.domain_count(), 1);
    }
}
