// src/utils/http.rs

//! HTTP transport seam.
//!
//! The pipeline only ever asks for "the body text behind this URL"; the trait
//! keeps extraction testable and keeps header/identity handling in one place.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Retry behavior for one logical fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// HTTP statuses treated as transient.
    pub retry_statuses: Vec<u16>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    fn with_timeout(attempts: u32, timeout_secs: u64) -> Self {
        Self {
            attempts,
            retry_statuses: vec![408, 429, 500, 502, 503, 504],
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Policy for search-result pages.
    pub fn listing_page(config: &CrawlerConfig) -> Self {
        Self::with_timeout(3, config.listing_timeout_secs)
    }

    /// Policy for per-listing detail pages, which are heavier.
    pub fn detail_page(config: &CrawlerConfig) -> Self {
        Self::with_timeout(2, config.detail_timeout_secs)
    }

    /// Short-fuse policy for JSON API probing.
    pub fn api_probe(config: &CrawlerConfig) -> Self {
        Self::with_timeout(2, config.api_timeout_secs)
    }
}

/// Page source consumed by the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the body text for a URL.
    async fn fetch(&self, url: &str, policy: &RetryPolicy) -> Result<String>;

    /// Render a URL through a full browser and return the final body text.
    ///
    /// The stock transport has no browser attached; callers treat the error
    /// as "fallback unavailable".
    async fn render(&self, url: &str) -> Result<String> {
        Err(AppError::fetch(url, "browser rendering is not available"))
    }
}

/// reqwest-backed transport with per-request identity rotation.
pub struct HttpTransport {
    client: Client,
    user_agents: Vec<String>,
    referer: String,
}

impl HttpTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            user_agents: config.user_agents.clone(),
            referer: config.base_url.clone(),
        })
    }

    fn user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("Mozilla/5.0 (compatible; domain-scraper/0.1)")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, policy: &RetryPolicy) -> Result<String> {
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=policy.attempts.max(1) {
            let request = self
                .client
                .get(url)
                .timeout(policy.timeout)
                .header("User-Agent", self.user_agent())
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
                )
                .header("Accept-Language", "en-AU,en-US;q=0.9,en;q=0.8")
                .header("Referer", &self.referer)
                .header("Upgrade-Insecure-Requests", "1");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }
                    if policy.retry_statuses.contains(&status.as_u16()) {
                        last_error = format!("transient status {status}");
                        log::debug!(
                            "Fetch attempt {attempt}/{} for {url}: {last_error}",
                            policy.attempts
                        );
                        continue;
                    }
                    return Err(AppError::fetch(url, format!("status {status}")));
                }
                Err(error) => {
                    last_error = error.to_string();
                    log::debug!(
                        "Fetch attempt {attempt}/{} for {url}: {last_error}",
                        policy.attempts
                    );
                }
            }
        }

        Err(AppError::fetch(url, last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlerConfig;

    #[test]
    fn test_retry_policy_statuses() {
        let config = CrawlerConfig::default();
        let policy = RetryPolicy::listing_page(&config);
        assert!(policy.retry_statuses.contains(&429));
        assert!(policy.retry_statuses.contains(&503));
        assert!(!policy.retry_statuses.contains(&404));
        assert_eq!(policy.attempts, 3);
    }

    #[test]
    fn test_detail_policy_is_slower_but_shorter() {
        let config = CrawlerConfig::default();
        let listing = RetryPolicy::listing_page(&config);
        let detail = RetryPolicy::detail_page(&config);
        assert!(detail.timeout > listing.timeout);
        assert_eq!(detail.attempts, 2);
    }
}
