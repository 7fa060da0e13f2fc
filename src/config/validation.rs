use crate::config::types::{
    AclSeedConfig, ArxivSeedConfig, Config, CrawlConfig, DbConfig, ExportConfig, LogicConfig,
    SeedingConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_db(&config.db)?;
    validate_logic(&config.logic)?;
    validate_crawl(&config.crawl)?;
    validate_seeding(&config.seeding)?;
    validate_export(&config.export)?;
    Ok(())
}

fn validate_db(config: &DbConfig) -> Result<(), ConfigError> {
    if config.uri.is_empty() {
        return Err(ConfigError::Validation("db.uri cannot be empty".to_string()));
    }

    if config.database.is_empty() {
        return Err(ConfigError::Validation(
            "db.database cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_logic(config: &LogicConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "logic.workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.lock_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "logic.lock_seconds must be >= 1, got {}",
            config.lock_seconds
        )));
    }

    let delay_min = config.delay_between_requests.min_secs();
    let delay_max = config.delay_between_requests.max_secs();

    if delay_min < 0.0 {
        return Err(ConfigError::Validation(format!(
            "logic.delay_between_requests must be non-negative, got {}",
            delay_min
        )));
    }

    if delay_min > delay_max {
        return Err(ConfigError::Validation(format!(
            "logic.delay_between_requests range is inverted: {} > {}",
            delay_min, delay_max
        )));
    }

    if config.revisit_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "logic.revisit_interval must be >= 1 second, got {}",
            config.revisit_interval
        )));
    }

    if config.http_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "logic.http_timeout must be >= 1 second, got {}",
            config.http_timeout
        )));
    }

    if config.idle_sleep_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "logic.idle_sleep_seconds must be >= 1, got {}",
            config.idle_sleep_seconds
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "logic.user_agent cannot be empty".to_string(),
        ));
    }

    if config.arxiv_min_interval_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "logic.arxiv_min_interval_seconds must be non-negative, got {}",
            config.arxiv_min_interval_seconds
        )));
    }

    Ok(())
}

fn validate_crawl(config: &CrawlConfig) -> Result<(), ConfigError> {
    for domain in &config.allowed_domains {
        validate_domain_string(domain)?;
    }
    Ok(())
}

fn validate_seeding(config: &SeedingConfig) -> Result<(), ConfigError> {
    if config.max_urls_per_source < 1 {
        return Err(ConfigError::Validation(format!(
            "seeding.max_urls_per_source must be >= 1, got {}",
            config.max_urls_per_source
        )));
    }

    validate_acl(&config.acl)?;
    validate_arxiv(&config.arxiv)?;
    Ok(())
}

fn validate_acl(config: &AclSeedConfig) -> Result<(), ConfigError> {
    if let Some(bib_gz_url) = config.bib_gz_url.as_deref() {
        if !bib_gz_url.is_empty() {
            let url = Url::parse(bib_gz_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seeding.acl.bib_gz_url: {}", e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "seeding.acl.bib_gz_url must be http(s), got scheme '{}'",
                    url.scheme()
                )));
            }
        }
    }

    validate_year_range("seeding.acl", config.year_from, config.year_to)
}

fn validate_arxiv(config: &ArxivSeedConfig) -> Result<(), ConfigError> {
    if config.category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "seeding.arxiv.category cannot be empty".to_string(),
        ));
    }

    if config.page_size < 1 || config.page_size > 2000 {
        return Err(ConfigError::Validation(format!(
            "seeding.arxiv.page_size must be between 1 and 2000, got {}",
            config.page_size
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "seeding.arxiv.max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    validate_year_range("seeding.arxiv", config.year_from, config.year_to)
}

fn validate_export(config: &ExportConfig) -> Result<(), ConfigError> {
    if config.out_dir.is_empty() {
        return Err(ConfigError::Validation(
            "export.out_dir cannot be empty".to_string(),
        ));
    }

    if config.max_docs == Some(0) {
        return Err(ConfigError::Validation(
            "export.max_docs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_year_range(
    section: &str,
    year_from: Option<i32>,
    year_to: Option<i32>,
) -> Result<(), ConfigError> {
    if let (Some(from), Some(to)) = (year_from, year_to) {
        if from > to {
            return Err(ConfigError::Validation(format!(
                "{}.year_from ({}) is after year_to ({})",
                section, from, to
            )));
        }
    }
    Ok(())
}

/// Validates a hostname from the allowlist
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::Validation(
            "crawl.allowed_domains entries cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
