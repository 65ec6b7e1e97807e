//! crawler-ripple command-line entry point.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use anyhow::Context;

use crawler_ripple::crawler::{Config, Engine};
use crawler_ripple::storage::open_storage;
use crawler_ripple::url::normalize_url;
use crawler_ripple::{output, CrawlerError};

/// A concurrent web crawler and content indexer.
#[derive(Parser, Debug)]
#[command(name = "crawler-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent web crawler and content indexer", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    start_url: String,

    /// Maximum link depth to follow from the seed (omit for unbounded)
    #[arg(long)]
    max_depth: Option<u32>,

    /// Restrict the crawl to links on this host
    #[arg(long)]
    domain: Option<String>,

    /// Number of concurrent fetch workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Requests per second, applied independently per host
    #[arg(long)]
    rate_limit: Option<f64>,

    /// Path to the SQLite index file
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Per-attempt request timeout, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_RATE_LIMIT: f64 = 5.0;
const DEFAULT_DB_PATH: &str = "crawler_index.db";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();

    match run(config, cancel).await {
        Ok(()) => std::process::exit(0),
        Err(RunError::Interrupted) => std::process::exit(130),
        Err(RunError::Fatal(e)) => {
            tracing::error!("crawl failed: {}", e);
            std::process::exit(1);
        }
    }
}

enum RunError {
    Interrupted,
    Fatal(anyhow::Error),
}

async fn run(config: Config, cancel: CancellationToken) -> Result<(), RunError> {
    let db_path = config.db_path.clone();
    let storage = open_storage(&db_path)
        .map_err(CrawlerError::from)
        .with_context(|| format!("failed to open index at {}", db_path.display()))
        .map_err(RunError::Fatal)?;
    let engine = Engine::new(config)
        .context("failed to initialize crawl engine")
        .map_err(RunError::Fatal)?;

    let (snapshot, elapsed) = engine
        .run(storage, cancel.clone())
        .await
        .context("crawl failed")
        .map_err(RunError::Fatal)?;

    println!("{}", output::report(&snapshot, elapsed));

    if cancel.is_cancelled() {
        return Err(RunError::Interrupted);
    }
    Ok(())
}

/// Assembles the crawl [`Config`] from CLI flags, with `CRAWLER_CONCURRENCY`,
/// `CRAWLER_RATE_LIMIT`, and `CRAWLER_DB_PATH` used only when the matching
/// flag was not explicitly supplied.
fn build_config(cli: &Cli) -> Result<Config, CrawlerError> {
    let start_url = normalize_url(&cli.start_url, None).map_err(|e| CrawlerError::InvalidSeed {
        url: cli.start_url.clone(),
        reason: e.to_string(),
    })?;

    let concurrency = cli.concurrency.unwrap_or_else(|| {
        env_usize("CRAWLER_CONCURRENCY").unwrap_or(DEFAULT_CONCURRENCY)
    });
    let rate_per_second = cli
        .rate_limit
        .unwrap_or_else(|| env_f64("CRAWLER_RATE_LIMIT").unwrap_or(DEFAULT_RATE_LIMIT));
    let db_path = cli.db_path.clone().unwrap_or_else(|| {
        std::env::var("CRAWLER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH))
    });
    let timeout = Duration::from_secs(cli.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));

    Ok(Config {
        start_url,
        max_depth: cli.max_depth,
        allowed_host: cli.domain.clone(),
        concurrency,
        rate_per_second,
        db_path,
        timeout,
    })
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawler_ripple=info,warn"),
            1 => EnvFilter::new("crawler_ripple=debug,info"),
            _ => EnvFilter::new("crawler_ripple=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
