//! Worker pool and crawl orchestration
//!
//! This module owns the long-running crawl: it opens the store, runs the
//! optional startup seeding, then spawns the worker tasks that repeatedly
//! claim a due URL, fetch it, classify the outcome and write the result
//! back. Workers share one store handle, one HTTP client and one rate
//! limiter, and stop at the next loop boundary once Ctrl-C is seen.

use crate::config::{Config, DelayRange};
use crate::crawler::classify::classify_fetch;
use crate::crawler::fetcher::{build_http_client, fetch_with_validators};
use crate::crawler::rate_limit::HostRateLimiter;
use crate::storage::{now_ts, open_store, Store, UrlRecord};
use crate::url::fetch_url;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// State shared by all workers
struct CrawlContext {
    store: Mutex<Store>,
    client: Client,
    limiter: HostRateLimiter,
    config: Config,
    shutdown: AtomicBool,
}

/// Runs the crawl until interrupted
///
/// This is the main entry point for the crawl mode. It will:
/// 1. Open the store
/// 2. Seed it, subject to the `seed_on_start` / `seed_if_empty_only` gates
/// 3. Build the shared HTTP client and rate limiter
/// 4. Spawn the configured number of worker tasks
/// 5. Wait for all workers to finish after a shutdown signal
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
///
/// # Returns
///
/// * `Ok(())` - Crawl stopped cleanly
/// * `Err(PapermillError)` - Store could not be opened or the client built
pub async fn run_crawl(config: Config) -> crate::Result<()> {
    let mut store = open_store(&config.db)?;

    let client = build_http_client(&config.logic.user_agent, config.logic.http_timeout)?;
    let limiter = HostRateLimiter::new(config.logic.arxiv_min_interval_seconds);

    if config.logic.seed_on_start {
        let existing = store.count_urls()?;
        if config.logic.seed_if_empty_only && existing > 0 {
            tracing::info!("Store already has {} URL records, skipping seeding", existing);
        } else {
            crate::seed::run_seeding(&mut store, &client, &limiter, &config).await;
        }
    }

    let workers = config.logic.workers;
    let ctx = Arc::new(CrawlContext {
        store: Mutex::new(store),
        client,
        limiter,
        config,
        shutdown: AtomicBool::new(false),
    });

    {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, workers will stop after their current URL");
                ctx.shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    tracing::info!("Starting {} worker(s)", workers);

    let mut handles = Vec::new();
    for worker_id in 0..workers {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(worker_loop(ctx, worker_id)));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Worker task failed: {}", e);
        }
    }

    tracing::info!("Crawl stopped");
    Ok(())
}

/// Claim-fetch-classify-update loop for one worker
///
/// Per-URL failures are logged and never end the loop; a record whose
/// processing died mid-way simply becomes claimable again once its lease
/// expires.
async fn worker_loop(ctx: Arc<CrawlContext>, worker_id: usize) {
    let logic = &ctx.config.logic;
    let mut processed: u64 = 0;

    tracing::info!("Worker {} started", worker_id);

    loop {
        if ctx.shutdown.load(Ordering::SeqCst) {
            break;
        }

        let claimed = {
            let mut store = ctx.store.lock().unwrap();
            store.claim_next_due(now_ts(), logic.lock_seconds)
        };

        let record = match claimed {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::trace!("Worker {}: nothing due", worker_id);
                tokio::time::sleep(Duration::from_secs(logic.idle_sleep_seconds)).await;
                continue;
            }
            Err(e) => {
                tracing::error!("Worker {}: claim failed: {}", worker_id, e);
                tokio::time::sleep(Duration::from_secs(logic.idle_sleep_seconds)).await;
                continue;
            }
        };

        tracing::debug!("Worker {} processing {}", worker_id, record.url);

        if let Err(e) = process_record(&ctx, &record).await {
            tracing::error!("Error processing {}: {}", record.url, e);
        }

        processed += 1;
        if processed % 25 == 0 {
            tracing::info!("Worker {}: {} URLs processed", worker_id, processed);
        }

        politeness_sleep(&logic.delay_between_requests).await;
    }

    tracing::info!("Worker {} stopped after {} URLs", worker_id, processed);
}

/// Processes a single claimed record
///
/// This method:
/// 1. Rewrites the URL to its fetch mirror
/// 2. Waits for the host's rate-limit slot
/// 3. Fetches with stored validators
/// 4. Classifies the outcome
/// 5. Stores a document version when the content changed, then updates the
///    record and releases its lease
async fn process_record(ctx: &CrawlContext, record: &UrlRecord) -> crate::Result<()> {
    let target = fetch_url(&record.url);

    let host = Url::parse(&target)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    if let Some(host) = &host {
        ctx.limiter.throttle(host).await;
    }

    let outcome = fetch_with_validators(
        &ctx.client,
        &target,
        record.etag.as_deref(),
        record.last_modified.as_deref(),
    )
    .await;

    let response = match &outcome {
        Ok(response) => Some(response),
        Err(e) => {
            tracing::warn!("Fetch gave up on {}: {}", target, e);
            None
        }
    };

    let now = now_ts();
    let disposition = classify_fetch(
        response,
        record.hash.as_deref(),
        now,
        ctx.config.logic.revisit_interval,
    );

    // Doc first, then the record update; a crash in between re-fetches the
    // URL after the lease expires rather than losing the version
    let mut store = ctx.store.lock().unwrap();
    if disposition.store_doc {
        if let Some(response) = response {
            store.insert_doc(&record.url, &response.body, &record.source, now)?;
            tracing::info!(
                "Stored new version of {} ({} bytes)",
                record.url,
                response.body.len()
            );
        }
    } else {
        tracing::debug!(
            "No new version for {} (status {:?})",
            record.url,
            disposition.update.status_code
        );
    }
    store.update_after_processing(record.id, &disposition.update)?;

    Ok(())
}

/// Draws one politeness delay from the configured range
fn jitter_secs(delay: &DelayRange) -> f64 {
    let min = delay.min_secs();
    let span = (delay.max_secs() - min).max(0.0);
    min + fastrand::f64() * span
}

async fn politeness_sleep(delay: &DelayRange) {
    let secs = jitter_secs(delay);
    if secs > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_fixed_delay_is_exact() {
        let delay = DelayRange::Fixed(1.5);
        for _ in 0..10 {
            assert_eq!(jitter_secs(&delay), 1.5);
        }
    }

    #[test]
    fn test_jitter_stays_within_range() {
        let delay = DelayRange::Range(0.8, 1.6);
        for _ in 0..200 {
            let secs = jitter_secs(&delay);
            assert!((0.8..1.6).contains(&secs), "out of range: {}", secs);
        }
    }

    #[tokio::test]
    async fn test_worker_exits_when_shutdown_is_set() {
        let ctx = Arc::new(CrawlContext {
            store: Mutex::new(Store::new_in_memory().unwrap()),
            client: build_http_client("TestBot/1.0", 5).unwrap(),
            limiter: HostRateLimiter::new(0.0),
            config: Config::default(),
            shutdown: AtomicBool::new(true),
        });

        // Must return without claiming anything
        worker_loop(ctx, 0).await;
    }
}
