//! End-to-end crawl tests against a local mock server
//!
//! Each test stands up a wiremock server, builds a configuration pointing
//! at it, and runs the full engine: frontier, rate limiter, robots guard,
//! retry policy, coordinator, and sink.

use std::time::{Duration, Instant};
use tidecrawl::config::{
    Config, CrawlerConfig, OutputConfig, OutputFormat, PolitenessConfig, RetryConfig, SeedConfig,
};
use tidecrawl::crawl;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A configuration aimed at one mock server, tuned for fast tests
fn test_config(seed_urls: Vec<String>) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent: 4,
            max_depth: 3,
            max_pages: 100,
            same_domain_only: false,
            user_agent: "tidecrawl-test/0.1".to_string(),
            per_request_timeout_secs: 5,
            crawl_deadline_secs: None,
        },
        politeness: PolitenessConfig {
            requests_per_second: 1000.0,
            per_domain_requests_per_second: 1000.0,
            burst: 1,
            respect_robots: false,
            robots_cache_ttl_hours: 24,
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 20,
            max_delay_ms: 200,
        },
        seeds: SeedConfig {
            urls: seed_urls,
            use_sitemap: false,
        },
        output: OutputConfig {
            format: OutputFormat::None,
            path: String::new(),
        },
    }
}

fn html_page(links: &[&str]) -> ResponseTemplate {
    let body: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">link</a>", href))
        .collect();
    // set_body_string pins the content type to text/plain even if a
    // content-type header is inserted afterwards; set_body_raw is the way to
    // control the mime.
    ResponseTemplate::new(200)
        .set_body_raw(format!("<html><body>{}</body></html>", body), "text/html")
}

#[tokio::test]
async fn depth_zero_crawls_only_the_seed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/child"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/child"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.crawler.max_depth = 0;

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn follows_links_to_max_depth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/a"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page(&["/b"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page(&["/c"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.crawler.max_depth = 2;

    // Seed at depth 0, /a at 1, /b at 2; /c would be depth 3.
    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 3);
}

#[tokio::test]
async fn page_cap_bounds_the_crawl() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..10).map(|i| format!("/page/{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&link_refs))
        .mount(&server)
        .await;
    for link in &links {
        Mock::given(method("GET"))
            .and(path(link.as_str()))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;
    }

    let mut config = test_config(vec![server.uri()]);
    config.crawler.max_pages = 5;

    // The seed plus four of the ten children.
    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 5);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn duplicate_links_are_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/same", "/same#top", "/same", "/other"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/same"))
        .respond_with(html_page(&[]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/other"))
        .respond_with(html_page(&[]))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawl(test_config(vec![server.uri()])).await.unwrap();
    assert_eq!(report.completed, 3);
}

#[tokio::test]
async fn same_domain_filter_skips_external_links() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[
            "/internal",
            &format!("{}/external", other.uri()),
        ]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/internal"))
        .respond_with(html_page(&[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/external"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&other)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.crawler.same_domain_only = true;

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 2);
}

#[tokio::test]
async fn per_domain_rate_limit_paces_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/1", "/2", "/3"]))
        .mount(&server)
        .await;
    for p in ["/1", "/2", "/3"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(html_page(&[]))
            .mount(&server)
            .await;
    }

    let mut config = test_config(vec![server.uri()]);
    config.politeness.per_domain_requests_per_second = 4.0;

    // 4 fetches at 4 req/s with burst 1: three refill waits of 250ms.
    let start = Instant::now();
    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 4);
    assert!(
        start.elapsed() >= Duration::from_millis(600),
        "crawl finished too fast: {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn transient_errors_retry_until_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/flaky", server.uri())]);

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 0);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn permanent_errors_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/gone", server.uri())]);

    let report = crawl(config).await.unwrap();
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn robots_disallow_is_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /secret"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/secret", "/open"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open"))
        .respond_with(html_page(&[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.politeness.respect_robots = true;

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn robots_ignored_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"),
        )
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[]))
        .mount(&server)
        .await;

    let report = crawl(test_config(vec![server.uri()])).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn missing_robots_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/page"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html_page(&[]))
        .mount(&server)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.politeness.respect_robots = true;

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 2);
}

#[tokio::test]
async fn deadline_stops_a_slow_crawl() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..30).map(|i| format!("/slow/{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&link_refs))
        .mount(&server)
        .await;
    for link in &links {
        Mock::given(method("GET"))
            .and(path(link.as_str()))
            .respond_with(html_page(&[]).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;
    }

    let mut config = test_config(vec![server.uri()]);
    config.crawler.max_concurrent = 2;
    config.crawler.crawl_deadline_secs = Some(1);

    let start = Instant::now();
    let report = crawl(config).await.unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "deadline did not stop the crawl: {:?}",
        start.elapsed()
    );
    let settled = report.completed + report.failed + report.abandoned;
    assert!(settled < 31, "all pages settled despite the deadline");
    assert!(report.completed >= 1);
}

#[tokio::test]
async fn jsonl_output_contains_one_record_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("results.jsonl");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Root</title></head>\
                 <body><a href=\"/leaf\">x</a></body></html>",
                "text/html",
            ),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/leaf"))
        .respond_with(html_page(&[]))
        .mount(&server)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.output = OutputConfig {
        format: OutputFormat::Jsonl,
        path: out_path.to_string_lossy().into_owned(),
    };

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 2);

    let content = std::fs::read_to_string(&out_path).unwrap();
    let records: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);

    let root = records
        .iter()
        .find(|r| r["links_found"] == 1)
        .expect("seed record missing");
    assert_eq!(root["outcome"], "completed");
    assert_eq!(root["status"], 200);
    assert_eq!(root["title"], "Root");
    assert_eq!(root["depth"], 0);

    let leaf = records.iter().find(|r| r["depth"] == 1).unwrap();
    assert_eq!(leaf["outcome"], "completed");
}

#[tokio::test]
async fn sitemap_seeding_widens_the_frontier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<urlset><url><loc>{}/from-sitemap</loc></url></urlset>",
            server.uri()
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/from-sitemap"))
        .respond_with(html_page(&[]))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(vec![server.uri()]);
    config.seeds.use_sitemap = true;

    let report = crawl(config).await.unwrap();
    assert_eq!(report.completed, 2);
}

#[tokio::test]
async fn invalid_seeds_are_rejected() {
    let config = test_config(vec!["not a url".to_string()]);
    let result = crawl(config).await;
    assert!(matches!(result, Err(tidecrawl::CrawlError::NoSeeds)));
}
