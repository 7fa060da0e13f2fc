//! Output module for operator-facing views of the store
//!
//! This module handles:
//! - Live status reporting for a running crawl
//! - Exporting the stored corpus as plain text plus metadata

mod export;
pub mod stats;

pub use export::{export_corpus, ExportReport};
pub use stats::{load_status, print_status, watch_status, CrawlStatus};
