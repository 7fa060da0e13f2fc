//! Seeding pipeline
//!
//! Seeding fills the store with crawl targets from two sources: the ACL
//! Anthology bibliography dump and the arXiv search API. Collection is
//! source-specific; the driver in this module is shared and applies the
//! source's year verdict, URL normalization, the domain allowlist and the
//! per-source candidate cap before inserting. Existing records are never
//! modified, so re-seeding is harmless.

mod arxiv;
mod bib;

pub use arxiv::{collect_arxiv_urls, ARXIV_API_BASE};
pub use bib::collect_bib_urls;

use crate::config::Config;
use crate::crawler::HostRateLimiter;
use crate::storage::{now_ts, Store, UpsertOutcome};
use crate::url::{domain_allowed, extract_domain, normalize_url};
use reqwest::Client;
use std::collections::HashSet;

/// Source tag for records seeded from the bibliography dump
pub const SOURCE_ACL: &str = "acl-anthology";

/// Source tag for records seeded from the arXiv API
pub const SOURCE_ARXIV: &str = "arxiv";

/// One raw URL candidate from a seeding source
///
/// Sources attach their year-filter verdict instead of dropping candidates,
/// so the driver counts everything it examined; `in_year_range` is always
/// true for sources without a year context.
#[derive(Debug, Clone)]
pub struct SeedCandidate {
    pub url: String,
    pub in_year_range: bool,
}

/// Counters from one source's seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Candidates examined before the cap cut things off
    pub attempted: usize,
    /// New URL records created
    pub inserted_new: usize,
    /// Candidates the store already knew
    pub already_had: usize,
    /// Candidates rejected by the domain allowlist
    pub skipped_domain: usize,
}

/// Runs a full seeding pass over all configured sources
///
/// Each source is collected and inserted independently: a download failure
/// or a store error in one source is logged and does not stop the others,
/// so this never fails the process. New records become due at the moment
/// the pass started.
pub async fn run_seeding(
    store: &mut Store,
    client: &Client,
    limiter: &HostRateLimiter,
    config: &Config,
) {
    let start_ts = now_ts();
    let cap = config.seeding.max_urls_per_source;
    let allowed: HashSet<String> = config
        .crawl
        .allowed_domains
        .iter()
        .map(|d| d.to_lowercase())
        .collect();

    let bib_gz_url = config
        .seeding
        .acl
        .bib_gz_url
        .as_deref()
        .filter(|u| !u.is_empty());
    if let Some(bib_gz_url) = bib_gz_url {
        let collected = collect_bib_urls(
            client,
            bib_gz_url,
            config.seeding.acl.year_from,
            config.seeding.acl.year_to,
        )
        .await;

        match collected {
            Ok(candidates) => {
                seed_source(store, &candidates, SOURCE_ACL, cap, &allowed, start_ts)
            }
            Err(e) => tracing::error!("Bibliography collection failed: {}", e),
        }
    } else {
        tracing::debug!("No bibliography dump configured, skipping {}", SOURCE_ACL);
    }

    let urls = collect_arxiv_urls(client, limiter, &config.seeding.arxiv, ARXIV_API_BASE, cap).await;
    let candidates: Vec<SeedCandidate> = urls
        .into_iter()
        .map(|url| SeedCandidate {
            url,
            in_year_range: true,
        })
        .collect();
    seed_source(store, &candidates, SOURCE_ARXIV, cap, &allowed, start_ts);
}

/// Inserts one source's candidates and logs its report
fn seed_source(
    store: &mut Store,
    candidates: &[SeedCandidate],
    source: &str,
    cap: usize,
    allowed: &HashSet<String>,
    due_ts: i64,
) {
    match insert_candidates(store, candidates, source, cap, allowed, due_ts) {
        Ok(report) => tracing::info!(
            "Seeded {}: attempted={} inserted_new={} already_had={} skipped_domain={}",
            source,
            report.attempted,
            report.inserted_new,
            report.already_had,
            report.skipped_domain
        ),
        Err(e) => tracing::error!("Seeding pass for {} aborted: {}", source, e),
    }
}

/// Normalizes, filters and upserts candidates for one source
///
/// The cap counts candidates examined, not records inserted, so a pass over
/// a mostly-known dump still terminates at the same point every run. A
/// candidate outside its source's year filter is examined (it shows up in
/// `attempted` and consumes a cap slot) but goes no further.
fn insert_candidates(
    store: &mut Store,
    candidates: &[SeedCandidate],
    source: &str,
    cap: usize,
    allowed: &HashSet<String>,
    due_ts: i64,
) -> crate::Result<SeedReport> {
    let mut report = SeedReport::default();

    for candidate in candidates {
        if report.attempted >= cap {
            tracing::warn!(
                "Reached the cap of {} candidates for {}, dropping the rest",
                cap,
                source
            );
            break;
        }
        report.attempted += 1;

        if !candidate.in_year_range {
            tracing::debug!("Dropping {} outside the year filter", candidate.url);
            continue;
        }

        let url = match normalize_url(&candidate.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Dropping unusable candidate {:?}: {}", candidate.url, e);
                continue;
            }
        };

        let Some(domain) = extract_domain(&url) else {
            continue;
        };
        if !domain_allowed(&domain, allowed) {
            report.skipped_domain += 1;
            continue;
        }

        match store.upsert_if_absent(url.as_str(), source, due_ts)? {
            UpsertOutcome::Inserted => report.inserted_new += 1,
            UpsertOutcome::Exists => report.already_had += 1,
        }
    }

    Ok(report)
}
