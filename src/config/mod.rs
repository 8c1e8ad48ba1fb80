//! Configuration module for Pulscen-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so the tool also runs without a file.
//!
//! # Example
//!
//! ```no_run
//! use pulscen_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Listing pages are capped at {}", config.crawl.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlConfig, FetcherConfig, OutputConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_or_default};
pub use validation::validate;
