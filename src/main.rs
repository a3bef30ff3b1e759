//! Tidecrawl main entry point
//!
//! Command-line interface for the Tidecrawl crawl engine.

use clap::Parser;
use std::path::PathBuf;
use tidecrawl::config::load_config_with_hash;
use tidecrawl::crawler::crawl;
use tracing_subscriber::EnvFilter;

/// Tidecrawl: a bounded, polite web crawler
///
/// Tidecrawl crawls from a set of seed URLs while respecting robots.txt
/// and per-domain rate limits, retrying transient failures, and writing
/// one record per page to the configured output.
#[derive(Parser, Debug)]
#[command(name = "tidecrawl")]
#[command(version)]
#[command(about = "A bounded, polite web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &config_hash);
        return Ok(());
    }

    let report = crawl(config).await?;

    println!("Crawl complete in {:.1}s", report.elapsed.as_secs_f64());
    println!("  Completed: {}", report.completed);
    println!("  Failed:    {}", report.failed);
    println!("  Abandoned: {}", report.abandoned);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidecrawl=info,warn"),
            1 => EnvFilter::new("tidecrawl=debug,info"),
            2 => EnvFilter::new("tidecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the crawl plan
fn handle_dry_run(config: &tidecrawl::config::Config, config_hash: &str) {
    println!("=== Tidecrawl Dry Run ===\n");
    println!("Config hash: {}\n", config_hash);

    println!("Crawler:");
    println!("  Max depth:       {}", config.crawler.max_depth);
    println!("  Max pages:       {}", config.crawler.max_pages);
    println!("  Workers:         {}", config.crawler.max_concurrent);
    println!("  Same-domain:     {}", config.crawler.same_domain_only);
    println!("  User agent:      {}", config.crawler.user_agent);
    match config.crawler.crawl_deadline_secs {
        Some(secs) => println!("  Deadline:        {}s", secs),
        None => println!("  Deadline:        none"),
    }

    println!("\nPoliteness:");
    println!(
        "  Global rate:     {} req/s",
        config.politeness.requests_per_second
    );
    println!(
        "  Per-domain rate: {} req/s",
        config.politeness.per_domain_requests_per_second
    );
    println!("  Burst:           {}", config.politeness.burst);
    println!("  Respect robots:  {}", config.politeness.respect_robots);

    println!("\nRetry:");
    println!("  Max attempts:    {}", config.retry.max_attempts);
    println!("  Base delay:      {}ms", config.retry.base_delay_ms);
    println!("  Max delay:       {}ms", config.retry.max_delay_ms);

    println!("\nSeeds ({}):", config.seeds.urls.len());
    for url in &config.seeds.urls {
        println!("  {}", url);
    }
    if config.seeds.use_sitemap {
        println!("  (plus sitemap discovery)");
    }

    println!("\nOutput: {:?} -> {}", config.output.format, config.output.path);
    println!("\nConfiguration is valid. No pages were fetched.");
}
