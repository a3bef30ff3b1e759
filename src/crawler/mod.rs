//! Crawl orchestration
//!
//! Wires the frontier, politeness layers, retry policy, fetcher, and sink
//! into a running crawl. [`crawl`] is the crate's front door: give it a
//! validated configuration and it runs the whole engine to completion.

mod coordinator;
mod fetcher;

pub use coordinator::FetchCoordinator;
pub use fetcher::{build_http_client, FetchFailure, FetchedPage, HttpFetcher, PageFetcher};

pub use crate::state::CrawlReport;

use crate::config::Config;
use crate::frontier::Frontier;
use crate::politeness::{RateLimiter, RobotsGuard};
use crate::retry::RetryPolicy;
use crate::sink::{open_sink, spawn_sink_writer};
use crate::state::CrawlState;
use crate::url::{extract_domain, normalize_url};
use crate::{sitemap, CrawlError};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Runs a complete crawl
///
/// Seeds enter the frontier at depth 0 before any worker starts, so the
/// drain detection cannot fire early. Returns the final tallies once the
/// frontier has drained (or the deadline closed it) and the output sink
/// has flushed.
///
/// # Errors
///
/// Fails if the HTTP client or output sink cannot be built, or if no seed
/// URL survives normalization and admission.
pub async fn crawl(config: Config) -> crate::Result<CrawlReport> {
    let mut seeds: Vec<Url> = Vec::new();
    let mut seed_domains: HashSet<String> = HashSet::new();

    for raw in &config.seeds.urls {
        match normalize_url(raw) {
            Ok(url) => {
                if let Some(domain) = extract_domain(&url) {
                    seed_domains.insert(domain);
                }
                seeds.push(url);
            }
            Err(e) => tracing::warn!("Skipping invalid seed {}: {}", raw, e),
        }
    }

    if seeds.is_empty() {
        return Err(CrawlError::NoSeeds);
    }

    let client = build_http_client(&config.crawler.user_agent)?;

    let mut seed_candidates: Vec<String> = seeds.iter().map(|u| u.to_string()).collect();
    if config.seeds.use_sitemap {
        seed_candidates.extend(sitemap::discover(&client, &seeds).await);
    }

    let frontier = Arc::new(Frontier::new(&config.crawler, seed_domains));
    let mut admitted = 0usize;
    for candidate in &seed_candidates {
        if frontier.enqueue(candidate, 0) {
            admitted += 1;
        }
    }
    if admitted == 0 {
        return Err(CrawlError::NoSeeds);
    }
    tracing::info!(
        "Seeded frontier with {} URLs ({} candidates)",
        admitted,
        seed_candidates.len()
    );

    let limiter = Arc::new(RateLimiter::new(&config.politeness));
    let robots = Arc::new(RobotsGuard::new(
        client.clone(),
        &config.politeness,
        &config.crawler.user_agent,
    ));
    let retry = Arc::new(RetryPolicy::new(&config.retry));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(client));
    let state = Arc::new(CrawlState::new());

    let sink = open_sink(&config.output)?;
    let (record_tx, sink_handle) = spawn_sink_writer(sink);

    let coordinator = FetchCoordinator::new(
        config.crawler.clone(),
        frontier,
        limiter,
        robots,
        retry,
        fetcher,
        state,
        record_tx,
    );

    let report = coordinator.run().await;

    // All senders are gone once the coordinator returns; the writer drains
    // its backlog, flushes, and exits.
    if let Err(e) = sink_handle.await {
        tracing::error!("Sink writer task failed: {}", e);
    }

    tracing::info!(
        "Crawl finished in {:.1}s: {} completed, {} failed, {} abandoned",
        report.elapsed.as_secs_f64(),
        report.completed,
        report.failed,
        report.abandoned
    );

    Ok(report)
}
