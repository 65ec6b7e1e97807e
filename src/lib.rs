//! crawler-ripple: a concurrent web crawler and content indexer
//!
//! Given a seed URL and crawl constraints, fetches HTML pages over HTTP(S),
//! extracts titles/text/links, stores a per-page record in a local SQLite
//! index, and recursively explores discovered links subject to depth,
//! domain, concurrency, and per-domain rate bounds.

pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Top-level error type for crawler-ripple operations.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("HTTP client build error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),
}

/// URL-specific errors, raised by the normalizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("failed to parse URL: {0}")]
    Parse(String),

    #[error("unsupported scheme: {0}")]
    InvalidScheme(String),

    #[error("missing or empty host")]
    MissingHost,

    #[error("host contains invalid characters")]
    InvalidHost,

    #[error("URL exceeds maximum length of {max} bytes")]
    TooLong { max: usize },
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
pub type UrlResult<T> = std::result::Result<T, UrlError>;

pub use crawler::Config;
pub use url::normalize_url;
