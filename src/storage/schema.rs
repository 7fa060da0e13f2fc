//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Papermill store.

/// SQL schema for the store
pub const SCHEMA_SQL: &str = r#"
-- Crawl targets and their scheduling state
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    etag TEXT,
    last_modified TEXT,
    hash TEXT,
    status_code INTEGER,
    first_seen_ts INTEGER NOT NULL,
    last_crawl_ts INTEGER,
    next_crawl_ts INTEGER NOT NULL,
    locked_until INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_urls_due ON urls(next_crawl_ts, locked_until);

-- Document versions, append-only; one row per changed fetch
CREATE TABLE IF NOT EXISTS docs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    source TEXT NOT NULL,
    raw_html TEXT NOT NULL,
    crawl_ts INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_docs_url ON docs(url);
CREATE INDEX IF NOT EXISTS idx_docs_crawl_ts ON docs(crawl_ts);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Initialize twice
        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        // Should succeed the second time too
        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["urls", "docs"] {
            let count: Result<i64, _> = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'",
                    table
                ),
                [],
                |row| row.get(0),
            );
            assert!(count.is_ok());
            assert_eq!(count.unwrap(), 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_url_uniqueness_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO urls (url, source, first_seen_ts, next_crawl_ts) VALUES ('https://example.com/a', 'acl-anthology', 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO urls (url, source, first_seen_ts, next_crawl_ts) VALUES ('https://example.com/a', 'arxiv', 1, 1)",
            [],
        );
        assert!(result.is_err());
    }
}
