//! Storage module for the shared crawl store
//!
//! This module handles all database operations for the crawler:
//! - URL records with their lease and revisit scheduling state
//! - Append-only document versions
//! - The atomic claim operation workers coordinate through
//! - Read-only aggregates for the monitor

mod schema;
mod sqlite;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::Store;

use crate::config::DbConfig;
use crate::Result;
use std::path::{Path, PathBuf};

/// Returns the current time as epoch seconds
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Resolves the store file path from the db configuration
///
/// A `uri` ending in `.db` or `.sqlite` is taken as the database file itself;
/// otherwise `uri` is the storage root and the file is `<uri>/<database>.db`.
pub fn resolve_db_path(db: &DbConfig) -> PathBuf {
    if db.uri.ends_with(".db") || db.uri.ends_with(".sqlite") {
        PathBuf::from(&db.uri)
    } else {
        Path::new(&db.uri).join(format!("{}.db", db.database))
    }
}

/// Opens (creating if needed) the store described by the db configuration
///
/// # Arguments
///
/// * `db` - The `[db]` section of the configuration
///
/// # Returns
///
/// * `Ok(Store)` - Successfully opened store
/// * `Err(PapermillError)` - Failed to create the directory or open the store
pub fn open_store(db: &DbConfig) -> Result<Store> {
    let path = resolve_db_path(db);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Store::new(&path)
}

/// One crawl target and its scheduling state
#[derive(Debug, Clone)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    pub source: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub hash: Option<String>,
    pub status_code: Option<u16>,
    pub first_seen_ts: i64,
    pub last_crawl_ts: Option<i64>,
    pub next_crawl_ts: i64,
    pub locked_until: i64,
}

/// One stored document version
#[derive(Debug, Clone)]
pub struct DocRecord {
    pub id: i64,
    pub url: String,
    pub source: String,
    pub raw_html: String,
    pub crawl_ts: i64,
}

/// Result of an idempotent URL insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Exists,
}

/// Fields written back by `update_after_processing`
///
/// `last_crawl_ts`, `next_crawl_ts` and `status_code` are always written
/// (`None` stores NULL); the validator fields are written only when
/// `refresh_validators` is set. The lease is cleared on every path.
#[derive(Debug, Clone, Default)]
pub struct ProcessingUpdate {
    pub last_crawl_ts: i64,
    pub next_crawl_ts: i64,
    pub status_code: Option<u16>,
    pub refresh_validators: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub hash: Option<String>,
}
