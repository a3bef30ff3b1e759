use std::time::{Duration, Instant};

/// Continuous-refill token bucket
///
/// Holds up to `capacity` tokens (the burst bound) and refills at
/// `refill_rate` tokens per second. One token is consumed per permitted
/// request. Time is measured with `Instant`, so the bucket is monotonic
/// and immune to wall-clock adjustments.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket
    ///
    /// # Arguments
    ///
    /// * `rate` - Sustained refill rate, tokens per second (must be > 0)
    /// * `burst` - Capacity, the maximum instantaneous burst
    pub fn new(rate: f64, burst: u32) -> Self {
        let capacity = f64::from(burst).max(1.0);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: rate,
            last_refill: Instant::now(),
        }
    }

    /// Adds tokens for the time elapsed since the last refill
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Consumes one token if available
    ///
    /// # Returns
    ///
    /// `true` if a token was consumed
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long until one token is available, without consuming anything
    ///
    /// Returns `Duration::ZERO` when a token is already available.
    pub fn time_until_available(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let needed = 1.0 - self.tokens;
        Duration::from_secs_f64(needed / self.refill_rate)
    }

    /// Current refill rate in tokens per second
    pub fn rate(&self) -> f64 {
        self.refill_rate
    }

    /// Lowers the refill rate
    ///
    /// Used when robots.txt declares a crawl-delay stricter than the
    /// configured rate. The rate is only ever lowered: a permissive
    /// crawl-delay never raises a domain above its configured rate.
    pub fn lower_rate(&mut self, rate: f64) {
        if rate < self.refill_rate {
            self.refill_rate = rate;
            // Drop banked burst so the stricter cadence applies at once.
            self.tokens = self.tokens.min(1.0);
        }
    }
}
