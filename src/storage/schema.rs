//! Database schema for the page index.

/// SQL schema for the database.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    url          TEXT NOT NULL UNIQUE,
    title        TEXT,
    keywords     TEXT NOT NULL DEFAULT '[]',
    text_preview TEXT,
    crawled_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_url ON pages(url);
CREATE INDEX IF NOT EXISTS idx_crawled_at ON pages(crawled_at);
"#;

/// Initializes the database schema. Idempotent.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
