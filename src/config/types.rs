use serde::Deserialize;

/// Main configuration structure for Papermill
///
/// Every section is optional in the TOML file; missing sections and fields
/// fall back to the defaults below, so an empty file is a valid (if not very
/// useful) configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub logic: LogicConfig,
    pub crawl: CrawlConfig,
    pub seeding: SeedingConfig,
    pub export: ExportConfig,
}

/// Store location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Storage root directory, or a direct path ending in `.db`/`.sqlite`
    pub uri: String,

    /// Database name; the store file is `<uri>/<database>.db` unless `uri`
    /// already names a file
    pub database: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            uri: "data".to_string(),
            database: "papermill".to_string(),
        }
    }
}

/// Crawl-loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Lease duration for a claimed URL, in seconds
    pub lock_seconds: i64,

    /// Politeness sleep between requests: scalar or [min, max] seconds
    pub delay_between_requests: DelayRange,

    /// How long until a successfully fetched URL becomes due again, seconds
    pub revisit_interval: i64,

    /// Per-attempt HTTP timeout, seconds
    pub http_timeout: u64,

    /// Sleep when no URL is due, seconds
    pub idle_sleep_seconds: u64,

    /// User-Agent header sent on every request
    pub user_agent: String,

    /// Run seeding before starting workers
    pub seed_on_start: bool,

    /// Skip seeding when the store already has URL records
    pub seed_if_empty_only: bool,

    /// Minimum spacing between requests to the arXiv hosts, seconds
    pub arxiv_min_interval_seconds: f64,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            lock_seconds: 120,
            delay_between_requests: DelayRange::Range(0.8, 1.6),
            revisit_interval: 7 * 86400,
            http_timeout: 20,
            idle_sleep_seconds: 3,
            user_agent:
                "PapermillBot/1.0 (+https://example.org/papermill; research corpus crawler)"
                    .to_string(),
            seed_on_start: true,
            seed_if_empty_only: true,
            arxiv_min_interval_seconds: 3.0,
        }
    }
}

/// Politeness delay: a fixed value or a uniform [min, max] range
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DelayRange {
    Fixed(f64),
    Range(f64, f64),
}

impl DelayRange {
    /// Lower bound in seconds
    pub fn min_secs(&self) -> f64 {
        match *self {
            DelayRange::Fixed(d) => d,
            DelayRange::Range(min, _) => min,
        }
    }

    /// Upper bound in seconds
    pub fn max_secs(&self) -> f64 {
        match *self {
            DelayRange::Fixed(d) => d,
            DelayRange::Range(_, max) => max,
        }
    }
}

/// Candidate filtering applied during seeding
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CrawlConfig {
    /// Exact hostnames eligible for crawling; empty = no filter
    pub allowed_domains: Vec<String>,
}

/// Seeding sources
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedingConfig {
    /// Cap on candidates examined per source
    pub max_urls_per_source: usize,

    pub acl: AclSeedConfig,
    pub arxiv: ArxivSeedConfig,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            max_urls_per_source: 15000,
            acl: AclSeedConfig::default(),
            arxiv: ArxivSeedConfig::default(),
        }
    }
}

/// Bibliography-dump source (ACL Anthology style)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AclSeedConfig {
    /// URL of the gzipped bibliography dump; absent or empty = skip source
    pub bib_gz_url: Option<String>,

    /// Inclusive publication-year filter; entries with no recognizable year
    /// always pass
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

/// Paginated search-API source (arXiv style)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivSeedConfig {
    /// Category query, e.g. "cs.CL"
    pub category: String,

    /// Entries per API page
    pub page_size: usize,

    /// Pagination cap per query
    pub max_pages: usize,

    /// Inclusive submission-year range; omit both for one unbounded query
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

impl Default for ArxivSeedConfig {
    fn default() -> Self {
        Self {
            category: "cs.CL".to_string(),
            page_size: 200,
            max_pages: 100,
            year_from: None,
            year_to: None,
        }
    }
}

/// Corpus export settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output directory for the dumped corpus
    pub out_dir: String,

    /// Also write gzipped raw HTML next to the extracted text
    pub with_raw_html: bool,

    /// Stop after writing this many documents; omit to export everything
    pub max_docs: Option<u64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: "corpus".to_string(),
            with_raw_html: false,
            max_docs: None,
        }
    }
}
