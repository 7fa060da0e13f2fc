//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests against crawl targets, including:
//! - Building the shared HTTP client with the configured user agent
//! - Conditional GET requests carrying stored ETag / Last-Modified validators
//! - Retry ladders for transport failures and 406 responses
//! - Capturing response validators for the store

use crate::PapermillError;
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Attempts per URL before giving up on transport errors or 406s
pub const MAX_ATTEMPTS: u32 = 5;

/// Accept header asking politely for HTML first
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Outcome of a completed fetch
///
/// Transport failures that survive the retry ladder are reported as errors
/// instead, so a `FetchResponse` always carries a real (or synthesized 406)
/// status line.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// ETag header from the response, if any
    pub etag: Option<String>,
    /// Last-Modified header from the response, if any
    pub last_modified: Option<String>,
    /// Decoded response body; empty for 304s and header-only responses
    pub body: String,
}

impl FetchResponse {
    /// True for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds the HTTP client shared by all workers
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value for every request
/// * `timeout_seconds` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use papermill::crawler::build_http_client;
///
/// let client = build_http_client("PapermillBot/1.0 (+https://example.org)", 20).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout_seconds: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, sending stored validators and retrying transient failures
///
/// # Request Flow
///
/// 1. Build headers: Accept, Accept-Language, Cache-Control, Pragma, plus
///    If-None-Match / If-Modified-Since when validators are stored
/// 2. Send GET, up to [`MAX_ATTEMPTS`] times
/// 3. Return the first real response that is not a 406
///
/// # Retry Ladder
///
/// | Condition | Action on attempt n |
/// |-----------|---------------------|
/// | Transport error (timeout, connect, body read) | Sleep n seconds, retry |
/// | HTTP 406 | Sleep 2n seconds, retry |
/// | Any other status | Return immediately |
///
/// A transport error on the final attempt surfaces as
/// [`PapermillError::Http`]; a 406 on the final attempt is returned as a
/// synthetic empty-body 406 response so the caller can schedule a long
/// backoff rather than treat the URL as dead.
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `url` - The URL to fetch (already mirror-rewritten by the caller)
/// * `etag` - Stored ETag to send as If-None-Match
/// * `last_modified` - Stored Last-Modified to send as If-Modified-Since
pub async fn fetch_with_validators(
    client: &Client,
    url: &str,
    etag: Option<&str>,
    last_modified: Option<&str>,
) -> crate::Result<FetchResponse> {
    let headers = request_headers(etag, last_modified);

    for attempt in 1..=MAX_ATTEMPTS {
        let response = match client.get(url).headers(headers.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                if attempt == MAX_ATTEMPTS {
                    return Err(PapermillError::Http {
                        url: url.to_string(),
                        source: e,
                    });
                }
                tracing::debug!("Transport error for {} (attempt {}): {}", url, attempt, e);
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                continue;
            }
        };

        let status = response.status();

        if status == StatusCode::NOT_ACCEPTABLE {
            if attempt == MAX_ATTEMPTS {
                break;
            }
            tracing::debug!("Got 406 for {} (attempt {}), backing off", url, attempt);
            tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
            continue;
        }

        let resp_etag = header_value(response.headers(), "etag");
        let resp_last_modified = header_value(response.headers(), "last-modified");

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                // A truncated body is a transport failure, not a response
                if attempt == MAX_ATTEMPTS {
                    return Err(PapermillError::Http {
                        url: url.to_string(),
                        source: e,
                    });
                }
                tracing::debug!("Body read failed for {} (attempt {}): {}", url, attempt, e);
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                continue;
            }
        };

        return Ok(FetchResponse {
            status: status.as_u16(),
            etag: resp_etag,
            last_modified: resp_last_modified,
            body,
        });
    }

    // Every attempt came back 406
    Ok(FetchResponse {
        status: StatusCode::NOT_ACCEPTABLE.as_u16(),
        etag: None,
        last_modified: None,
        body: String::new(),
    })
}

/// Builds the per-request header set, including conditional validators
fn request_headers(etag: Option<&str>, last_modified: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Accept", HeaderValue::from_static(ACCEPT));
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));

    if let Some(etag) = etag {
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(IF_NONE_MATCH, value);
        }
    }
    if let Some(last_modified) = last_modified {
        if let Ok(value) = HeaderValue::from_str(last_modified) {
            headers.insert(IF_MODIFIED_SINCE, value);
        }
    }

    headers
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}
