//! Status reporting from the crawl store
//!
//! This module provides functionality for extracting and displaying the
//! live state of a crawl: scheduling pressure, last-seen status codes,
//! per-source record counts and document throughput.

use crate::storage::{now_ts, Store};
use std::time::Duration;

/// Snapshot of the store for the status display
#[derive(Debug, Clone)]
pub struct CrawlStatus {
    /// Total URL records
    pub total_urls: u64,

    /// Records due and claimable right now
    pub due_now: u64,

    /// Records currently leased to a worker
    pub leased: u64,

    /// Records never crawled yet
    pub never_crawled: u64,

    /// Last observed status code per record, most common first
    pub status_histogram: Vec<(Option<u16>, u64)>,

    /// Record counts for the biggest seed sources
    pub top_sources: Vec<(String, u64)>,

    /// Stored document versions
    pub total_docs: u64,

    /// Document versions stored in the last 60 seconds
    pub docs_last_minute: u64,
}

/// Loads a status snapshot from the store
///
/// # Arguments
///
/// * `store` - The crawl store to query
///
/// # Returns
///
/// * `Ok(CrawlStatus)` - Successfully loaded snapshot
/// * `Err(PapermillError)` - A query failed
pub fn load_status(store: &Store) -> crate::Result<CrawlStatus> {
    let now = now_ts();

    Ok(CrawlStatus {
        total_urls: store.count_urls()?,
        due_now: store.count_due(now)?,
        leased: store.count_leased(now)?,
        never_crawled: store.count_never_crawled()?,
        status_histogram: store.status_histogram()?,
        top_sources: store.source_histogram(10)?,
        total_docs: store.count_docs()?,
        docs_last_minute: store.count_docs_since(now - 60)?,
    })
}

/// Prints a status snapshot to stdout in a formatted manner
///
/// # Arguments
///
/// * `status` - The snapshot to display
pub fn print_status(status: &CrawlStatus) {
    println!("=== Crawl Status ===\n");

    println!("URLs:");
    println!("  Total: {}", status.total_urls);
    println!("  Due now: {}", status.due_now);
    println!("  Leased: {}", status.leased);
    println!("  Never crawled: {}", status.never_crawled);
    println!();

    if !status.status_histogram.is_empty() {
        println!("Last Status Codes:");
        for (code, count) in &status.status_histogram {
            let percentage = if status.total_urls > 0 {
                (*count as f64 / status.total_urls as f64) * 100.0
            } else {
                0.0
            };
            println!(
                "  {}: {} ({:.1}%)",
                format_status_code(*code),
                count,
                percentage
            );
        }
        println!();
    }

    if !status.top_sources.is_empty() {
        println!("Sources:");
        for (source, count) in &status.top_sources {
            println!("  {}: {}", source, count);
        }
        println!();
    }

    println!("Docs:");
    println!("  Total versions: {}", status.total_docs);
    println!("  Stored in the last 60s: {}", status.docs_last_minute);
    println!("  Recent rate: {} docs/min", status.docs_last_minute);
}

/// Reprints the status every `interval_seconds` until interrupted
pub async fn watch_status(store: &Store, interval_seconds: u64) -> crate::Result<()> {
    loop {
        println!(
            "--- {} ---",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let status = load_status(store)?;
        print_status(&status);
        println!();

        tokio::time::sleep(Duration::from_secs(interval_seconds.max(1))).await;
    }
}

/// Records that have not been crawled yet show up as "(none)"
fn format_status_code(code: Option<u16>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "(none)".to_string(),
    }
}
