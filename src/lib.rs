//! Pulscen-Harvest: a catalogue scraper for pulscen-style product sites
//!
//! This crate walks a category page, enumerates the paginated product
//! listings of every subcategory, extracts each product page into a
//! structured record and persists the records to a document store and a
//! line-delimited JSON file.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Pulscen-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network failure or non-success HTTP status, after retries
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Expected markup missing from a page
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Pagination limit of {limit} pages exceeded for {url}")]
    PaginationLimitExceeded { url: String, limit: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CollectorState,
        to: state::CollectorState,
    },
}

impl HarvestError {
    /// Short, stable label for the error category, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Fetch { .. } => "fetch",
            Self::Parse { .. } => "parse",
            Self::PaginationLimitExceeded { .. } => "pagination_limit",
            Self::Storage(_) => "storage",
            Self::Output(_) => "output",
            Self::UrlError(_) => "url",
            Self::Reqwest(_) => "http_client",
            Self::InvalidTransition { .. } => "state",
        }
    }

    /// Returns true if the error must abort the whole run
    ///
    /// Losing persisted data silently is worse than stopping, so sink
    /// failures are fatal. Everything else is isolated to the link,
    /// subcategory or category that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Output(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Pulscen-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CategoryRef, ProductLink, ProductRecord};
pub use state::CollectorState;
pub use url::{normalize_url, product_id};
