//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests, including:
//! - Building the HTTP client with a browser-like user agent and timeouts
//! - GET requests that follow redirects and report the final URL
//! - Bounded retry with exponential backoff for transient failures
//! - Detection of captcha / block pages served with a 200 status

use crate::config::FetcherConfig;
use crate::HarvestError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Page body
    pub body: String,
}

/// Outcome of a single attempt, before retry policy is applied
#[derive(Debug)]
enum Attempt {
    Success(FetchedPage),
    /// Worth trying again (timeouts, 429, 5xx, block pages)
    Transient {
        status: Option<u16>,
        message: String,
    },
    /// Retrying will not help (other 4xx, malformed responses)
    Permanent {
        status: Option<u16>,
        message: String,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use pulscen_harvest::config::FetcherConfig;
/// use pulscen_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Shared page fetcher
///
/// Cheap to share by reference across concurrent tasks; the inner
/// `reqwest::Client` pools connections.
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx, no block pattern | Return page |
/// | HTTP 2xx with block pattern | Retry |
/// | HTTP 429 | Retry |
/// | HTTP 5xx | Retry |
/// | Timeout / connection error | Retry |
/// | Other HTTP 4xx | Fail immediately |
///
/// Delay before attempt `n + 1` is `retry_base_delay * 2^(n - 1)`.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_attempts: u32,
    retry_base_delay: Duration,
    block_patterns: Vec<String>,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, HarvestError> {
        let client = build_http_client(config)?;
        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            block_patterns: config
                .block_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        })
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - Body and final URL of a successful response
    /// * `Err(HarvestError::Fetch)` - All attempts failed, or a permanent failure
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, HarvestError> {
        let mut attempt = 1;

        loop {
            tracing::debug!(url = %url, attempt, "fetching");

            let (status, message) = match self.attempt(url).await {
                Attempt::Success(page) => return Ok(page),
                Attempt::Permanent { status, message } => {
                    return Err(HarvestError::Fetch {
                        url: url.to_string(),
                        status,
                        message,
                    });
                }
                Attempt::Transient { status, message } => (status, message),
            };

            if attempt >= self.max_attempts {
                tracing::warn!(
                    url = %url,
                    attempts = attempt,
                    error = %message,
                    "giving up after retries"
                );
                return Err(HarvestError::Fetch {
                    url: url.to_string(),
                    status,
                    message,
                });
            }

            let delay = self.backoff_delay(attempt);
            tracing::debug!(
                url = %url,
                attempt,
                max_attempts = self.max_attempts,
                error = %message,
                delay_ms = delay.as_millis() as u64,
                "transient fetch failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        self.retry_base_delay.saturating_mul(factor)
    }

    async fn attempt(&self, url: &Url) -> Attempt {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    e.to_string()
                };
                return Attempt::Transient {
                    status: None,
                    message,
                };
            }
        };

        let status = response.status();
        let final_url = response.url().clone();

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Transient {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status.as_u16()),
            };
        }

        if !status.is_success() {
            return Attempt::Permanent {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status.as_u16()),
            };
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Attempt::Transient {
                    status: Some(status.as_u16()),
                    message: format!("Failed to read body: {}", e),
                };
            }
        };

        if let Some(pattern) = self.block_pattern_in(&body) {
            return Attempt::Transient {
                status: Some(status.as_u16()),
                message: format!("Blocked or captcha page detected ({})", pattern),
            };
        }

        Attempt::Success(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            body,
        })
    }

    fn block_pattern_in(&self, body: &str) -> Option<&str> {
        if self.block_patterns.is_empty() {
            return None;
        }
        let lowered = body.to_lowercase();
        self.block_patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(|p| p.as_str())
    }
}
