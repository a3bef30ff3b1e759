//! Configuration module
//!
//! Loads, parses, and validates TOML configuration files. The engine never
//! reads configuration ad hoc during a run: everything is a typed field,
//! validated once at startup.
//!
//! # Example
//!
//! ```no_run
//! use tidecrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    Config, CrawlerConfig, OutputConfig, OutputFormat, PolitenessConfig, RetryConfig, SeedConfig,
};
pub use validation::validate;
