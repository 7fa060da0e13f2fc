//! Papermill: a polite text-corpus crawler
//!
//! This crate builds a text corpus by crawling a fixed set of scholarly
//! sources, tracking per-URL crawl state in a shared SQLite store, and
//! appending a new document version whenever a page's content digest changes.
//! Workers coordinate solely through the store's atomic lease-based claim,
//! so several processes can share one database file.

pub mod config;
pub mod crawler;
pub mod output;
pub mod seed;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Papermill operations
#[derive(Debug, Error)]
pub enum PapermillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Papermill operations
pub type Result<T> = std::result::Result<T, PapermillError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use storage::{DocRecord, Store, UpsertOutcome, UrlRecord};
pub use url::normalize_url;
