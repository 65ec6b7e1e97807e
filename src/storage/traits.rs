//! Storage trait and error type.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage handle is closed")]
    Closed,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A page record ready to be persisted, produced from a successful parse.
#[derive(Debug, Clone)]
pub struct PageWrite {
    pub url: String,
    pub title: Option<String>,
    pub keywords: Vec<String>,
    pub text_preview: String,
}

/// Backing store for crawled pages.
///
/// Implementations must upsert atomically by `url`: inserting a new row with
/// both timestamps set to now, or updating the content fields and
/// `updated_at` on an existing row.
pub trait Storage: Send {
    /// Inserts or updates a page record, keyed by `page.url`.
    fn upsert_page(&mut self, page: &PageWrite) -> StorageResult<()>;

    /// Total number of indexed pages, for diagnostics and tests.
    fn count_pages(&self) -> StorageResult<u64>;

    /// Flushes and closes the handle. Subsequent writes fail with
    /// [`StorageError::Closed`].
    fn close(&mut self) -> StorageResult<()>;
}
