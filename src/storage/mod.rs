//! Persists crawled pages to a local SQLite index.
//!
//! A single `pages` table keyed by `url`, written with upsert semantics: a
//! first sighting inserts a row with both timestamps set to now, a repeat
//! sighting updates the content fields and `updated_at`.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{PageWrite, Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens (or creates) the page index at `path`, bootstrapping its schema.
pub fn open_storage(path: &Path) -> Result<SqliteStorage, StorageError> {
    SqliteStorage::new(path)
}
