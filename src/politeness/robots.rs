use crate::config::PolitenessConfig;
use crate::url::extract_domain;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Parsed robots.txt rules for one domain
///
/// Allow/Disallow evaluation is delegated to the `robotstxt` matcher, which
/// implements the conventional longest-match-wins semantics with Allow
/// breaking ties over Disallow. The Crawl-delay directive is extracted here
/// because the matcher does not expose it.
#[derive(Debug, Clone)]
pub struct RobotsRules {
    content: String,
    allow_all: bool,
    crawl_delay: Option<f64>,
}

impl RobotsRules {
    /// Parses robots.txt content for the given user agent
    pub fn from_content(content: &str, user_agent: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
            crawl_delay: parse_crawl_delay(content, user_agent),
        }
    }

    /// A permissive rule set that allows everything
    ///
    /// The default when robots.txt cannot be fetched: an unreachable or
    /// missing robots.txt never blocks the crawl.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            crawl_delay: None,
        }
    }

    /// Checks whether a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// The Crawl-delay in seconds, if the file declared one
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }
}

/// Extracts the Crawl-delay directive for a user agent
///
/// A Crawl-delay applies to the User-agent group it appears under. A group
/// naming the agent specifically wins over the `*` wildcard group.
fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let normalized_agent = user_agent.to_lowercase();
    let mut current_agents: Vec<String> = Vec::new();
    let mut wildcard_delay: Option<f64> = None;
    let mut agent_delay: Option<f64> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                current_agents.push(value.to_lowercase());
            }
            "crawl-delay" => {
                if let Ok(delay) = value.parse::<f64>() {
                    if current_agents
                        .iter()
                        .any(|ua| ua == "*" || normalized_agent.contains(ua.as_str()))
                    {
                        if current_agents.iter().any(|ua| ua == "*") {
                            wildcard_delay = Some(delay);
                        } else {
                            agent_delay = Some(delay);
                        }
                    }
                }
                current_agents.clear();
            }
            _ => {}
        }
    }

    agent_delay.or(wildcard_delay)
}

/// A cached robots.txt entry with its fetch timestamp
#[derive(Debug, Clone)]
struct CachedRobots {
    rules: RobotsRules,
    fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    fn is_stale(&self, ttl: ChronoDuration) -> bool {
        Utc::now() - self.fetched_at > ttl
    }
}

/// Fetches, caches, and evaluates robots.txt per domain
///
/// Entries live in a per-domain arena for the configured TTL and are
/// re-fetched after expiry. A failed fetch caches an allow-all entry for
/// the same TTL, so a dead robots endpoint is not re-fetched per URL.
pub struct RobotsGuard {
    client: reqwest::Client,
    user_agent: String,
    respect: bool,
    ttl: ChronoDuration,
    cache: Mutex<HashMap<String, CachedRobots>>,
    // Serializes the fetch per domain so concurrent cache misses do not
    // hit the same robots.txt more than once.
    fetch_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RobotsGuard {
    /// Creates a robots guard
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt fetches
    /// * `config` - Politeness settings (respect flag, cache TTL)
    /// * `user_agent` - Agent string matched against User-agent groups
    pub fn new(client: reqwest::Client, config: &PolitenessConfig, user_agent: &str) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
            respect: config.respect_robots,
            ttl: ChronoDuration::hours(config.robots_cache_ttl_hours),
            cache: Mutex::new(HashMap::new()),
            fetch_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether a URL may be fetched
    ///
    /// Fetches and caches the domain's robots.txt on first reference. With
    /// `respect_robots = false` the guard is bypassed entirely: no fetch,
    /// always allowed.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        if !self.respect {
            return true;
        }

        let Some(domain) = extract_domain(url) else {
            return true;
        };

        if let Some(rules) = self.cached_rules(&domain) {
            return rules.is_allowed(url.as_str(), &self.user_agent);
        }

        // Cache miss: take the domain's fetch lock, then re-check. A worker
        // racing us may have fetched while we waited for the lock.
        let fetch_lock = {
            let mut locks = self.fetch_locks.lock().await;
            Arc::clone(locks.entry(domain.clone()).or_default())
        };
        let _fetching = fetch_lock.lock().await;

        if let Some(rules) = self.cached_rules(&domain) {
            return rules.is_allowed(url.as_str(), &self.user_agent);
        }

        let rules = self.fetch_rules(url, &domain).await;
        let allowed = rules.is_allowed(url.as_str(), &self.user_agent);

        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            domain,
            CachedRobots {
                rules,
                fetched_at: Utc::now(),
            },
        );

        allowed
    }

    /// The cached Crawl-delay for a domain, in seconds
    ///
    /// Reads the cache only; returns None for domains not yet consulted.
    pub fn crawl_delay(&self, domain: &str) -> Option<f64> {
        let cache = self.cache.lock().unwrap();
        cache.get(domain).and_then(|entry| entry.rules.crawl_delay())
    }

    /// Returns fresh cached rules, if present
    fn cached_rules(&self, domain: &str) -> Option<RobotsRules> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(domain)
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(|entry| entry.rules.clone())
    }

    /// Fetches robots.txt for a URL's origin
    ///
    /// Any failure degrades to allow-all: robots being unreachable is a
    /// warning for observability, never a task failure.
    async fn fetch_rules(&self, url: &Url, domain: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", url.origin().ascii_serialization());
        tracing::debug!("Fetching robots.txt for {}", domain);

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(content) => RobotsRules::from_content(&content, &self.user_agent),
                Err(e) => {
                    tracing::warn!("Failed to read robots.txt body for {}: {}", domain, e);
                    RobotsRules::allow_all()
                }
            },
            Ok(response) => {
                tracing::info!(
                    "robots.txt for {} returned {}, allowing all",
                    domain,
                    response.status()
                );
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt for {}: {}", domain, e);
                RobotsRules::allow_all()
            }
        }
    }
}
