//! Configuration module for Papermill
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Defaults are centralized in the types; validation runs once at
//! startup before anything touches the network or the store.
//!
//! # Example
//!
//! ```no_run
//! use papermill::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling with {} workers", config.logic.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AclSeedConfig, ArxivSeedConfig, Config, CrawlConfig, DbConfig, DelayRange, ExportConfig,
    LogicConfig, SeedingConfig,
};

// Re-export parser functions
pub use parser::load_config;
