use crate::config::types::{Config, CrawlerConfig, PolitenessConfig, RetryConfig, SeedConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Runs once at startup; any violation is a `ConfigError` surfaced before
/// a single fetch happens.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler(&config.crawler)?;
    validate_politeness(&config.politeness)?;
    validate_retry(&config.retry)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler bounds
fn validate_crawler(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.per_request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "per_request_timeout_secs must be >= 1, got {}",
            config.per_request_timeout_secs
        )));
    }

    if let Some(deadline) = config.crawl_deadline_secs {
        if deadline < 1 {
            return Err(ConfigError::Validation(format!(
                "crawl_deadline_secs must be >= 1 when set, got {}",
                deadline
            )));
        }
    }

    Ok(())
}

/// Validates rate limiting settings
fn validate_politeness(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if !config.requests_per_second.is_finite() || config.requests_per_second <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "requests_per_second must be a positive number, got {}",
            config.requests_per_second
        )));
    }

    if !config.per_domain_requests_per_second.is_finite()
        || config.per_domain_requests_per_second <= 0.0
    {
        return Err(ConfigError::Validation(format!(
            "per_domain_requests_per_second must be a positive number, got {}",
            config.per_domain_requests_per_second
        )));
    }

    if config.burst < 1 {
        return Err(ConfigError::Validation(format!(
            "burst must be >= 1, got {}",
            config.burst
        )));
    }

    if config.robots_cache_ttl_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "robots_cache_ttl_hours must be >= 1, got {}",
            config.robots_cache_ttl_hours
        )));
    }

    Ok(())
}

/// Validates retry settings
fn validate_retry(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "base_delay_ms must be > 0".to_string(),
        ));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}) must be >= base_delay_ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates seed URLs
fn validate_seeds(config: &SeedConfig) -> Result<(), ConfigError> {
    if config.urls.is_empty() {
        return Err(ConfigError::Validation(
            "seeds.urls must contain at least one URL".to_string(),
        ));
    }

    for seed in &config.urls {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use an HTTP or HTTPS scheme",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    Ok(())
}
