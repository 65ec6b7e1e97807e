//! SQLite-backed implementation of [`Storage`].

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageWrite, Storage, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// A single retry delay applied to transient rusqlite errors (`SQLITE_BUSY`,
/// `SQLITE_LOCKED`) before the error is surfaced.
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct SqliteStorage {
    conn: Option<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`, bootstrapping the schema.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn: Some(conn) })
    }

    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> StorageResult<&Connection> {
        self.conn.as_ref().ok_or(StorageError::Closed)
    }

    fn upsert_once(&self, page: &PageWrite) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let keywords_json = serde_json::to_string(&page.keywords)?;
        conn.execute(
            "INSERT INTO pages (url, title, keywords, text_preview, crawled_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                keywords = excluded.keywords,
                text_preview = excluded.text_preview,
                updated_at = excluded.updated_at",
            params![page.url, page.title, keywords_json, page.text_preview, now],
        )?;
        Ok(())
    }

    /// Whether a rusqlite error is worth a single retry (lock contention:
    /// `SQLITE_BUSY`/`SQLITE_LOCKED`), as opposed to a permanent one.
    fn is_transient(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}

impl Storage for SqliteStorage {
    fn upsert_page(&mut self, page: &PageWrite) -> StorageResult<()> {
        match self.upsert_once(page) {
            Ok(()) => Ok(()),
            Err(StorageError::Sqlite(e)) if Self::is_transient(&e) => {
                thread::sleep(RETRY_DELAY);
                self.upsert_once(page)
            }
            Err(e) => Err(e),
        }
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn close(&mut self) -> StorageResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .ok();
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            Ok(())
        } else {
            Err(StorageError::Closed)
        }
    }
}

/// Returns a page by URL, used by tests to assert persisted content.
#[cfg(test)]
pub fn get_page_by_url(
    conn: &Connection,
    url: &str,
) -> StorageResult<Option<(String, Option<String>, Vec<String>, String)>> {
    let row = conn
        .query_row(
            "SELECT url, title, keywords, text_preview FROM pages WHERE url = ?1",
            params![url],
            |row| {
                let keywords_json: String = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    keywords_json,
                    row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                ))
            },
        )
        .optional()?;
    Ok(row.map(|(url, title, keywords_json, preview)| {
        let keywords: Vec<String> = serde_json::from_str(&keywords_json).unwrap_or_default();
        (url, title, keywords, preview)
    }))
}
