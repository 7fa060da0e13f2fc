//! Fetch outcome classification
//!
//! Maps a fetch outcome to the state transition applied to the URL record:
//! when to come back, which status to record, whether validators get
//! refreshed and whether a new document version is stored. Pure functions so
//! the whole decision table is unit-testable without a network.

use crate::crawler::fetcher::FetchResponse;
use crate::storage::ProcessingUpdate;
use sha2::{Digest, Sha256};

/// Retry delay after a transport failure that survived the retry ladder
const TRANSPORT_RETRY_SECS: i64 = 3600;

/// Retry delay after a terminal 406
const NOT_ACCEPTABLE_RETRY_SECS: i64 = 6 * 3600;

/// Retry delay after a 5xx
const SERVER_ERROR_RETRY_SECS: i64 = 2 * 3600;

/// Retry delay for everything else (4xx, redirects we never followed, oddities)
const DEFAULT_RETRY_SECS: i64 = 24 * 3600;

/// What the worker should do with a claimed record after its fetch
#[derive(Debug, Clone)]
pub struct Disposition {
    /// Fields to write back to the URL record
    pub update: ProcessingUpdate,
    /// Store the response body as a new document version
    pub store_doc: bool,
}

/// Hex-encoded SHA-256 of the input
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Classifies a fetch outcome into a record update and a store decision
///
/// `response` is `None` when the fetch failed at the transport level after
/// all retries. `stored_hash` is the content digest from the previous
/// successful crawl, used to detect unchanged bodies when the server ignores
/// our validators.
///
/// # Decision table
///
/// | Outcome | Next due | Status stored | Validators | Doc |
/// |---------|----------|---------------|------------|-----|
/// | Transport failure | +1h | NULL | kept | no |
/// | 304 Not Modified | +revisit | 304 | kept | no |
/// | 406 (after retries) | +6h | 406 | kept | no |
/// | 2xx, empty body | +revisit | actual | refreshed | no |
/// | 200, digest unchanged | +revisit | 200 | refreshed | no |
/// | 200, digest changed | +revisit | 200 | refreshed | yes |
/// | 5xx | +2h | actual | kept | no |
/// | Anything else | +24h | actual | kept | no |
///
/// Non-200 2xx responses with a body land in the last row: the content was
/// not what we asked for, so it is never archived as a document version.
pub fn classify_fetch(
    response: Option<&FetchResponse>,
    stored_hash: Option<&str>,
    now: i64,
    revisit_interval: i64,
) -> Disposition {
    let response = match response {
        Some(response) => response,
        None => {
            return Disposition {
                update: ProcessingUpdate {
                    last_crawl_ts: now,
                    next_crawl_ts: now + TRANSPORT_RETRY_SECS,
                    status_code: None,
                    ..Default::default()
                },
                store_doc: false,
            }
        }
    };

    let status = response.status;

    if status == 304 {
        return retry_later(now, revisit_interval, Some(status));
    }

    if status == 406 {
        return retry_later(now, NOT_ACCEPTABLE_RETRY_SECS, Some(status));
    }

    if response.is_success() && response.body.is_empty() {
        // Nothing to archive, but the server did answer; trust its validators
        return refreshed(response, None, now, revisit_interval, false);
    }

    if status == 200 {
        let digest = sha256_hex(&response.body);
        let changed = stored_hash != Some(digest.as_str());
        return refreshed(response, Some(digest), now, revisit_interval, changed);
    }

    if (500..600).contains(&status) {
        return retry_later(now, SERVER_ERROR_RETRY_SECS, Some(status));
    }

    retry_later(now, DEFAULT_RETRY_SECS, Some(status))
}

fn retry_later(now: i64, delay: i64, status_code: Option<u16>) -> Disposition {
    Disposition {
        update: ProcessingUpdate {
            last_crawl_ts: now,
            next_crawl_ts: now + delay,
            status_code,
            ..Default::default()
        },
        store_doc: false,
    }
}

fn refreshed(
    response: &FetchResponse,
    digest: Option<String>,
    now: i64,
    revisit_interval: i64,
    store_doc: bool,
) -> Disposition {
    let hash = digest.unwrap_or_else(|| sha256_hex(&response.body));
    Disposition {
        update: ProcessingUpdate {
            last_crawl_ts: now,
            next_crawl_ts: now + revisit_interval,
            status_code: Some(response.status),
            refresh_validators: true,
            etag: response.etag.clone(),
            last_modified: response.last_modified.clone(),
            hash: Some(hash),
        },
        store_doc,
    }
}
