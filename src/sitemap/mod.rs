//! Sitemap seed discovery
//!
//! Optionally widens the seed list by reading each seed origin's
//! `/sitemap.xml`. Documents are parsed with the `sitemap` crate's
//! streaming reader, which handles urlset and sitemapindex documents,
//! entity decoding, and CDATA; index files are followed one level deep.
//! Failures are logged and skipped: sitemap discovery is best effort and
//! never blocks a crawl.

use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::HashSet;
use std::io::Cursor;
use url::Url;

/// Maximum child sitemaps followed from one index file.
const MAX_CHILD_SITEMAPS: usize = 16;

/// Discovers extra seed URLs from the sitemaps of the given origins
///
/// Returns the discovered page URLs, deduplicated, in document order.
/// Origins are deduplicated first so two seeds on one host fetch its
/// sitemap once.
pub async fn discover(client: &reqwest::Client, seeds: &[Url]) -> Vec<String> {
    let mut origins = HashSet::new();
    let mut discovered = Vec::new();
    let mut seen = HashSet::new();

    for seed in seeds {
        let origin = seed.origin().ascii_serialization();
        if !origins.insert(origin.clone()) {
            continue;
        }

        let sitemap_url = format!("{}/sitemap.xml", origin);
        let Some(content) = fetch_text(client, &sitemap_url).await else {
            continue;
        };

        let (urls, children) = parse_sitemap(&content);
        for url in urls {
            if seen.insert(url.clone()) {
                discovered.push(url);
            }
        }

        for child_url in children.into_iter().take(MAX_CHILD_SITEMAPS) {
            if let Some(child) = fetch_text(client, &child_url).await {
                let (urls, _) = parse_sitemap(&child);
                for url in urls {
                    if seen.insert(url.clone()) {
                        discovered.push(url);
                    }
                }
            }
        }
    }

    if !discovered.is_empty() {
        tracing::info!("Sitemap discovery added {} candidate URLs", discovered.len());
    }
    discovered
}

/// Fetches a sitemap document, returning None on any failure
async fn fetch_text(client: &reqwest::Client, url: &str) -> Option<String> {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("Failed to read sitemap body from {}: {}", url, e);
                None
            }
        },
        Ok(response) => {
            tracing::debug!("Sitemap {} returned {}", url, response.status());
            None
        }
        Err(e) => {
            tracing::debug!("Failed to fetch sitemap {}: {}", url, e);
            None
        }
    }
}

/// Parses a sitemap document into page URLs and child-sitemap URLs
fn parse_sitemap(content: &str) -> (Vec<String>, Vec<String>) {
    let mut urls = Vec::new();
    let mut children = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(content.as_bytes())) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    children.push(url.to_string());
                }
            }
            SiteMapEntity::Err(e) => {
                tracing::debug!("Sitemap parse error: {}", e);
            }
        }
    }

    (urls, children)
}
