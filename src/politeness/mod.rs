//! Politeness controls
//!
//! Everything that keeps the crawler a good citizen: token-bucket rate
//! limiting (one global bucket plus a lazily grown per-domain arena) and
//! robots.txt fetching, caching, and evaluation.
//!
//! Workers consult [`RobotsGuard`] before a fetch and block on
//! [`RateLimiter::acquire`] for pacing. Neither layer knows about the
//! frontier or retries; they only answer "may I?" and "when?".

mod bucket;
mod limiter;
mod robots;

pub use bucket::TokenBucket;
pub use limiter::RateLimiter;
pub use robots::{RobotsGuard, RobotsRules};
