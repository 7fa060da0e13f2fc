//! Papermill main entry point
//!
//! This is the command-line interface for the Papermill corpus crawler.

use clap::Parser;
use papermill::config::{load_config, Config};
use papermill::crawler::{build_http_client, crawl, HostRateLimiter};
use papermill::output::{export_corpus, load_status, print_status, watch_status};
use papermill::seed::run_seeding;
use papermill::storage::open_store;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Papermill: a polite text-corpus crawler
///
/// Papermill seeds research-paper URLs from a bibliography dump and the
/// arXiv search API, then revisits them politely with conditional requests,
/// archiving every changed page into a local SQLite corpus.
#[derive(Parser, Debug)]
#[command(name = "papermill")]
#[command(version = "1.0.0")]
#[command(about = "A polite text-corpus crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a seeding pass and exit without crawling
    #[arg(long, conflicts_with_all = ["status", "export"])]
    seed_only: bool,

    /// Show the store's status and exit
    #[arg(long, conflicts_with_all = ["seed_only", "export"])]
    status: bool,

    /// With --status, reprint every SECS seconds until interrupted
    #[arg(long, value_name = "SECS", requires = "status")]
    watch: Option<u64>,

    /// Export the stored corpus and exit
    #[arg(long, conflicts_with_all = ["seed_only", "status"])]
    export: bool,

    /// With --export, also write gzipped raw HTML next to the text
    #[arg(long, requires = "export")]
    with_raw_html: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.seed_only {
        handle_seed_only(&config).await?;
    } else if cli.status {
        handle_status(&config, cli.watch).await?;
    } else if cli.export {
        handle_export(&config, cli.with_raw_html)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("papermill=info,warn"),
            1 => EnvFilter::new("papermill=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --seed-only mode: one seeding pass, no workers
///
/// Runs unconditionally; the `seed_on_start` / `seed_if_empty_only` gates
/// only apply to the automatic pass at crawl startup.
async fn handle_seed_only(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = open_store(&config.db)?;
    let client = build_http_client(&config.logic.user_agent, config.logic.http_timeout)?;
    let limiter = HostRateLimiter::new(config.logic.arxiv_min_interval_seconds);

    run_seeding(&mut store, &client, &limiter, config).await;

    println!("✓ Seeding pass finished");
    Ok(())
}

/// Handles the --status mode: print a snapshot, or keep watching
async fn handle_status(
    config: &Config,
    watch: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config.db)?;

    match watch {
        Some(interval) => watch_status(&store, interval).await?,
        None => {
            let status = load_status(&store)?;
            print_status(&status);
        }
    }

    Ok(())
}

/// Handles the --export mode: dump the corpus and exit
fn handle_export(config: &Config, with_raw_html: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config.db)?;

    let mut export_cfg = config.export.clone();
    if with_raw_html {
        export_cfg.with_raw_html = true;
    }

    let report = export_corpus(&store, &export_cfg)?;

    println!(
        "✓ Exported {} document(s) to {} ({} skipped with no text)",
        report.docs_written, export_cfg.out_dir, report.skipped_empty
    );
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Workers: {}, politeness delay: {:.1}-{:.1}s, revisit after {}s",
        config.logic.workers,
        config.logic.delay_between_requests.min_secs(),
        config.logic.delay_between_requests.max_secs(),
        config.logic.revisit_interval
    );

    match crawl(config).await {
        Ok(()) => {
            tracing::info!("Crawl finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
