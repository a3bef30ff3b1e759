//! Tidecrawl: a bounded, polite asynchronous web crawler
//!
//! This crate implements a crawl orchestration engine: a breadth-first URL
//! frontier with deduplication and depth tracking, per-domain token-bucket
//! rate limiting, robots.txt compliance, retry with exponential backoff,
//! and a bounded concurrent fetch coordinator tying them together.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod politeness;
pub mod retry;
pub mod sink;
pub mod sitemap;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Tidecrawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No seed URLs admitted to the frontier")]
    NoSeeds,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Tidecrawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, CrawlReport};
pub use frontier::{Frontier, UrlTask};
pub use politeness::{RateLimiter, RobotsGuard};
pub use retry::{Decision, FailureKind, RetryPolicy};
pub use crate::url::{extract_domain, normalize_url};
