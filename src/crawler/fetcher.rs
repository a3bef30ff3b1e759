use crate::retry::FailureKind;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// A successfully fetched and parsed page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub title: Option<String>,
    pub links: Vec<String>,
}

/// A failed fetch attempt, classified for the retry policy
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Fetches one page and extracts its outgoing links
///
/// The seam between the coordinator and the network. Production uses
/// [`HttpFetcher`]; tests can substitute a scripted implementation.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchFailure>;
}

/// Builds the shared HTTP client
///
/// One client for the whole run so connection pools are shared across
/// workers. Per-request timeouts are applied at the call site; the client
/// itself carries no global timeout.
pub fn build_http_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
}

/// HTTP fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchFailure> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("server returned {}", status),
            ));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("text/html"))
            .unwrap_or(false);

        // Redirects may have moved us; resolve relative links against the
        // final URL, not the requested one.
        let final_url = response.url().clone();

        let body = response.text().await.map_err(classify_reqwest_error)?;

        let (title, links) = if is_html {
            parse_page(&body, &final_url)
        } else {
            (None, Vec::new())
        };

        Ok(FetchedPage {
            status: status.as_u16(),
            title,
            links,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchFailure {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    FetchFailure::new(kind, e.to_string())
}

/// Extracts the title and outgoing links from an HTML document
///
/// Links are resolved against `base`, so relative hrefs work. Non-HTTP
/// schemes and fragment-only hrefs are skipped. Returned URLs are absolute
/// but not yet normalized; the frontier normalizes at admission.
fn parse_page(html: &str, base: &Url) -> (Option<String>, Vec<String>) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let mut links = Vec::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
                || href.starts_with("data:")
            {
                continue;
            }
            if let Ok(resolved) = base.join(href) {
                if resolved.scheme() == "http" || resolved.scheme() == "https" {
                    links.push(resolved.to_string());
                }
            }
        }
    }

    (title, links)
}
