use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Tidecrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub seeds: SeedConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior and bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Worker pool size (concurrent fetches)
    pub max_concurrent: u32,

    /// Maximum link depth from the seeds (depth 0)
    pub max_depth: u32,

    /// Maximum number of URLs admitted to the frontier
    pub max_pages: usize,

    /// Only follow links whose domain matches one of the seed domains
    pub same_domain_only: bool,

    /// User agent string sent with every request and matched against robots.txt
    pub user_agent: String,

    /// Timeout for a single fetch, in seconds
    pub per_request_timeout_secs: u64,

    /// Wall-clock deadline for the whole crawl, in seconds (unbounded if absent)
    pub crawl_deadline_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_depth: 3,
            max_pages: 100,
            same_domain_only: false,
            user_agent: format!("tidecrawl/{}", env!("CARGO_PKG_VERSION")),
            per_request_timeout_secs: 15,
            crawl_deadline_secs: None,
        }
    }
}

impl CrawlerConfig {
    /// Per-fetch timeout as a Duration
    pub fn per_request_timeout(&self) -> Duration {
        Duration::from_secs(self.per_request_timeout_secs)
    }

    /// Global crawl deadline as a Duration, if configured
    pub fn crawl_deadline(&self) -> Option<Duration> {
        self.crawl_deadline_secs.map(Duration::from_secs)
    }
}

/// Rate limiting and robots.txt settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolitenessConfig {
    /// Sustained request rate across all domains, requests per second
    pub requests_per_second: f64,

    /// Sustained request rate per domain, requests per second
    pub per_domain_requests_per_second: f64,

    /// Maximum instantaneous burst (token bucket capacity)
    pub burst: u32,

    /// Whether to fetch and honor robots.txt
    pub respect_robots: bool,

    /// How long a fetched robots.txt stays valid, in hours
    pub robots_cache_ttl_hours: i64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 8.0,
            per_domain_requests_per_second: 1.0,
            burst: 1,
            respect_robots: true,
            robots_cache_ttl_hours: 24,
        }
    }
}

/// Retry and backoff settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per URL before the task is emitted as failed
    pub max_attempts: u32,

    /// Backoff for the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Backoff cap, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    /// Base backoff delay as a Duration
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Backoff cap as a Duration
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Seed URL sources
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Start URLs, enqueued at depth 0
    pub urls: Vec<String>,

    /// Also seed from each start URL's sitemap.xml
    #[serde(default)]
    pub use_sitemap: bool,
}

/// Terminal record sink settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sink format for terminal records
    pub format: OutputFormat,

    /// Path the sink writes to
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jsonl,
            path: "results.jsonl".to_string(),
        }
    }
}

/// Supported record sink formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    Jsonl,
    /// CSV with a header row
    Csv,
    /// Discard records (counts only)
    None,
}
