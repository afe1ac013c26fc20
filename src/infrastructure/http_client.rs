//! HTTP client for fetching market pages with rate limiting and retry
//!
//! The scan loop never touches the network. Pages reach it through the
//! [`PageFetcher`] trait; [`HttpClient`] is the reqwest-backed implementation.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Source of page text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the body of `url` as text
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Non-success HTTP status, kept typed so the retry loop can inspect it
#[derive(Debug, Error)]
#[error("HTTP request failed with status {status}: {url}")]
pub struct HttpStatusError {
    pub status: StatusCode,
    pub url: String,
}

impl HttpStatusError {
    /// Server errors and 429 may pass; other client errors will not
    pub fn is_retryable(&self) -> bool {
        self.status.is_server_error() || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
    /// Total attempts per page, the first one included
    pub retry_count: u32,
    /// Linear backoff step between attempts
    pub retry_delay_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        use crate::infrastructure::config::defaults;
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.8,de;q=0.6".to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            follow_redirects: true,
            retry_count: defaults::RETRY_COUNT,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
        }
    }
}

/// HTTP client with rate limiting for polite scraping
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
    cancellation_token: CancellationToken,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Client whose in-flight requests and backoff sleeps stop when `token` is cancelled
    pub fn with_cancellation(config: HttpClientConfig, token: CancellationToken) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("Invalid accept-language")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
            cancellation_token: token,
        })
    }

    /// One attempt: wait for the rate limiter, send, read the body
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let token = &self.cancellation_token;
        if token.is_cancelled() {
            anyhow::bail!("Request cancelled before starting");
        }

        tokio::select! {
            _ = self.rate_limiter.until_ready() => {},
            _ = token.cancelled() => {
                anyhow::bail!("Request cancelled during rate limiting");
            }
        }

        debug!("Fetching page: {}", url);

        let response = tokio::select! {
            result = self.client.get(url).send() => {
                result.with_context(|| format!("Failed to fetch URL: {url}"))?
            },
            _ = token.cancelled() => {
                warn!("HTTP request cancelled for URL: {}", url);
                anyhow::bail!("HTTP request cancelled");
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(HttpStatusError {
                status,
                url: url.to_string(),
            }
            .into());
        }

        let text = tokio::select! {
            result = response.text() => {
                result.with_context(|| format!("Failed to read response body from: {url}"))?
            },
            _ = token.cancelled() => {
                warn!("Response reading cancelled for URL: {}", url);
                anyhow::bail!("Response reading cancelled");
            }
        };

        debug!("Fetched {} ({} chars)", url, text.len());
        Ok(text)
    }

    /// Fetch with bounded retries and linear backoff plus jitter.
    /// Client errors other than 429 fail immediately.
    pub async fn get_text_with_retry(&self, url: &str) -> Result<String> {
        let attempts = self.config.retry_count.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.get_text(url).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!("Fetched {} on attempt {}", url, attempt);
                    }
                    return Ok(text);
                }
                Err(e) => {
                    let permanent = e
                        .downcast_ref::<HttpStatusError>()
                        .is_some_and(|status| !status.is_retryable());
                    if permanent || self.cancellation_token.is_cancelled() {
                        return Err(e);
                    }
                    warn!("Attempt {} failed for {}: {:#}", attempt, url, e);
                    last_error = Some(e);

                    if attempt < attempts {
                        let delay = self.backoff(attempt);
                        tokio::select! {
                            _ = sleep(delay) => {},
                            _ = self.cancellation_token.cancelled() => break,
                        }
                    }
                }
            }
        }

        error!("All {} attempts failed for {}", attempts, url);
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("All retry attempts failed for {url}")))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let step = self.config.retry_delay_ms;
        let jitter = if step > 1 { fastrand::u64(0..step / 2) } else { 0 };
        Duration::from_millis(step * u64::from(attempt) + jitter)
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.get_text_with_retry(url).await
    }
}
