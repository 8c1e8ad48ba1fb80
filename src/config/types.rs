use serde::{Deserialize, Serialize};

/// Browser-like user agent; the site serves a block page to obvious bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

/// Main configuration structure for Pulscen-Harvest
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// HTTP fetching behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Attempts per URL, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled for each further attempt (milliseconds)
    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    /// Case-insensitive body substrings that mark a captcha or block page
    #[serde(rename = "block-patterns")]
    pub block_patterns: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            block_patterns: vec![
                "captcha".to_string(),
                "робот".to_string(),
                "доступ ограничен".to_string(),
            ],
        }
    }
}

/// Crawl shape and concurrency
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum listing pages fetched per subcategory
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Subcategories enumerated concurrently
    #[serde(rename = "link-concurrency")]
    pub link_concurrency: u32,

    /// Product pages fetched concurrently within one subcategory
    #[serde(rename = "product-concurrency")]
    pub product_concurrency: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 200,
            link_concurrency: 5,
            product_concurrency: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite document store
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Collection (document partition) products are written to
    pub collection: String,

    /// Path to the line-delimited JSON output file
    #[serde(rename = "jsonl-path")]
    pub jsonl_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "pulscen.db".to_string(),
            collection: "products".to_string(),
            jsonl_path: "products.jsonl".to_string(),
        }
    }
}
