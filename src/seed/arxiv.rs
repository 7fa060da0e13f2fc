//! arXiv API seeding source
//!
//! Walks the arXiv Atom search API page by page, one query per submission
//! year when a year range is configured, and collects the abstract-page
//! links out of each feed. The API is politely spaced through the shared
//! rate limiter, paging stops as soon as the caller's candidate budget is
//! met, and a failing page is retried a few times before the rest of that
//! query is abandoned; whatever was already collected still gets seeded.

use crate::config::ArxivSeedConfig;
use crate::crawler::HostRateLimiter;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Public arXiv API endpoint
pub const ARXIV_API_BASE: &str = "https://export.arxiv.org/api/query";

/// Tries per page before the query is truncated
const PAGE_TRIES: u32 = 3;

/// Fixed delay between page retries
const PAGE_RETRY_DELAY: Duration = Duration::from_secs(2);

static ENTRY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap());
static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<link\b[^>]*>").unwrap());
static HREF_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).unwrap());

/// Collects abstract-page URLs for the configured category
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `limiter` - Rate limiter spacing out API requests
/// * `cfg` - Category, paging and year-range settings
/// * `api_base` - The query endpoint; callers pass [`ARXIV_API_BASE`]
/// * `max_urls` - Stop requesting pages once this many candidates are
///   collected; the crossing page still completes, so the result may run a
///   little over
///
/// # Returns
///
/// Candidate URLs in collection order. Collection failures never surface as
/// errors: a page that keeps failing truncates its query with a warning and
/// the partial result is returned.
pub async fn collect_arxiv_urls(
    client: &Client,
    limiter: &HostRateLimiter,
    cfg: &ArxivSeedConfig,
    api_base: &str,
    max_urls: usize,
) -> Vec<String> {
    let api_host = Url::parse(api_base)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    let mut candidates = Vec::new();

    'queries: for query in build_queries(cfg) {
        tracing::info!("arXiv query: {}", query);

        for page in 0..cfg.max_pages {
            if candidates.len() >= max_urls {
                tracing::debug!(
                    "Collected {} candidate(s), not requesting further arXiv pages",
                    candidates.len()
                );
                break 'queries;
            }

            let start = page * cfg.page_size;

            let mut body = None;
            for attempt in 1..=PAGE_TRIES {
                if let Some(host) = &api_host {
                    limiter.throttle(host).await;
                }

                match fetch_query_page(client, api_base, &query, start, cfg.page_size).await {
                    Ok(text) => {
                        body = Some(text);
                        break;
                    }
                    Err(e) if attempt < PAGE_TRIES => {
                        tracing::debug!(
                            "arXiv page fetch failed (try {}/{}): {}",
                            attempt,
                            PAGE_TRIES,
                            e
                        );
                        tokio::time::sleep(PAGE_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Giving up on arXiv query {} at page {}: {}",
                            query,
                            page,
                            e
                        );
                    }
                }
            }

            let Some(body) = body else { break };

            let (entries, mut links) = parse_feed_page(&body);
            if entries == 0 {
                tracing::debug!("arXiv query exhausted after {} page(s)", page);
                break;
            }

            tracing::debug!(
                "arXiv page {}: {} entries, {} usable links",
                page,
                entries,
                links.len()
            );
            candidates.append(&mut links);
        }
    }

    candidates
}

/// One query per submission year when a full range is configured
fn build_queries(cfg: &ArxivSeedConfig) -> Vec<String> {
    match (cfg.year_from, cfg.year_to) {
        (Some(from), Some(to)) => (from..=to)
            .map(|y| {
                format!(
                    "cat:{} AND submittedDate:[{y}01010000 TO {y}12312359]",
                    cfg.category
                )
            })
            .collect(),
        _ => vec![format!("cat:{}", cfg.category)],
    }
}

async fn fetch_query_page(
    client: &Client,
    api_base: &str,
    query: &str,
    start: usize,
    page_size: usize,
) -> Result<String, reqwest::Error> {
    let start_param = start.to_string();
    let max_param = page_size.to_string();

    client
        .get(api_base)
        .query(&[
            ("search_query", query),
            ("start", start_param.as_str()),
            ("max_results", max_param.as_str()),
            ("sortBy", "submittedDate"),
            ("sortOrder", "descending"),
        ])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Pulls the abstract-page link out of each feed entry
///
/// Returns the raw entry count alongside the links so the caller can tell
/// an empty feed from a feed of entries we could not use. Only each entry's
/// first `rel="alternate"` link counts, and only when it points at an
/// abstract page; PDF and DOI links are ignored.
fn parse_feed_page(xml: &str) -> (usize, Vec<String>) {
    let mut entries = 0;
    let mut links = Vec::new();

    for entry in ENTRY_BLOCK.captures_iter(xml) {
        entries += 1;

        let href = LINK_TAG
            .find_iter(&entry[1])
            .map(|m| m.as_str())
            .find(|tag| tag.contains(r#"rel="alternate""#))
            .and_then(|tag| HREF_ATTR.captures(tag))
            .map(|caps| caps[1].to_string());

        let Some(href) = href else { continue };
        if !href.contains("/abs/") {
            continue;
        }

        links.push(rewrite_to_https(&href));
    }

    (entries, links)
}

fn rewrite_to_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}
