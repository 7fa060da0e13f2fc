//! Crawler module for fetching and archiving corpus pages
//!
//! This module contains the core crawling logic, including:
//! - Conditional HTTP fetching with retry ladders
//! - Fetch outcome classification and revisit scheduling
//! - Per-host rate limiting for the arXiv mirrors
//! - The worker pool that drives the crawl

mod classify;
mod fetcher;
mod rate_limit;
mod worker;

pub use classify::{classify_fetch, sha256_hex, Disposition};
pub use fetcher::{build_http_client, fetch_with_validators, FetchResponse, MAX_ATTEMPTS};
pub use rate_limit::HostRateLimiter;
pub use worker::run_crawl;

use crate::config::Config;
use crate::PapermillError;

/// Runs the crawl until interrupted
///
/// This is the main entry point for the crawl mode. It will:
/// 1. Open the crawl store
/// 2. Run startup seeding when configured
/// 3. Spawn the worker pool
/// 4. Process due URLs until a shutdown signal arrives
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(())` - Crawl stopped cleanly
/// * `Err(PapermillError)` - Startup failed
pub async fn crawl(config: Config) -> Result<(), PapermillError> {
    run_crawl(config).await
}
