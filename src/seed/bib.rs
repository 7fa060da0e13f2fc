//! Bibliography-dump seeding source
//!
//! The ACL Anthology publishes its whole bibliography as one gzipped BibTeX
//! file. Rather than parse BibTeX properly, we scan it line by line: `url`
//! fields yield candidate URLs and `year` fields update the year context
//! each candidate's filter verdict is computed from. Entries whose year we
//! cannot read always pass the filter. Out-of-range candidates are returned
//! too, marked, so the seeding driver can count them as examined.

use super::SeedCandidate;
use crate::PapermillError;
use flate2::read::GzDecoder;
use regex::Regex;
use reqwest::Client;
use std::io::Read;
use std::sync::LazyLock;
use std::time::Duration;

/// Timeout for the dump download; the file is tens of megabytes
const DUMP_TIMEOUT: Duration = Duration::from_secs(60);

static URL_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\s*=\s*(?:\{([^}]+)\}|"([^"]+)")"#).unwrap()
});
static YEAR_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)year\s*=\s*\{([^}]+)\}").unwrap());

/// Downloads and scans a gzipped bibliography dump for candidate URLs
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `bib_gz_url` - Location of the gzipped dump
/// * `year_from` / `year_to` - Inclusive publication-year filter
///
/// # Returns
///
/// Candidates in file order, unnormalized and uncapped, each carrying its
/// year-filter verdict; the seeding driver applies the verdict, the domain
/// filter and the per-source cap.
pub async fn collect_bib_urls(
    client: &Client,
    bib_gz_url: &str,
    year_from: Option<i32>,
    year_to: Option<i32>,
) -> crate::Result<Vec<SeedCandidate>> {
    tracing::info!("Downloading bibliography dump from {}", bib_gz_url);

    let response = client
        .get(bib_gz_url)
        .timeout(DUMP_TIMEOUT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| PapermillError::Http {
            url: bib_gz_url.to_string(),
            source: e,
        })?;

    let compressed = response.bytes().await.map_err(|e| PapermillError::Http {
        url: bib_gz_url.to_string(),
        source: e,
    })?;

    let mut decompressed = Vec::new();
    GzDecoder::new(&compressed[..]).read_to_end(&mut decompressed)?;
    let text = String::from_utf8_lossy(&decompressed);

    tracing::debug!(
        "Bibliography dump: {} bytes compressed, {} bytes of BibTeX",
        compressed.len(),
        decompressed.len()
    );

    Ok(scan_bib_lines(&text, year_from, year_to))
}

/// Extracts candidate URLs from BibTeX text
///
/// `year` fields update a running year context that applies to subsequent
/// `url` fields; a year that does not parse clears the context, and
/// candidates without a year context always pass the filter. Only values
/// starting with "http" become candidates; out-of-range ones are kept with
/// `in_year_range` false.
fn scan_bib_lines(
    text: &str,
    year_from: Option<i32>,
    year_to: Option<i32>,
) -> Vec<SeedCandidate> {
    let mut candidates = Vec::new();
    let mut current_year: Option<i32> = None;

    for line in text.lines() {
        if let Some(caps) = YEAR_FIELD.captures(line) {
            current_year = caps[1].trim().parse::<i32>().ok();
        }

        let Some(caps) = URL_FIELD.captures(line) else {
            continue;
        };
        let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };

        let candidate = value.as_str().trim();
        if !candidate.starts_with("http") {
            continue;
        }

        candidates.push(SeedCandidate {
            url: candidate.to_string(),
            in_year_range: year_in_range(current_year, year_from, year_to),
        });
    }

    candidates
}

fn year_in_range(year: Option<i32>, from: Option<i32>, to: Option<i32>) -> bool {
    let Some(year) = year else {
        return true;
    };
    if from.is_some_and(|from| year < from) {
        return false;
    }
    if to.is_some_and(|to| year > to) {
        return false;
    }
    true
}
