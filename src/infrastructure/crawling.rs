//! Batch scraping of market pages
//!
//! Fetches a list of pages through a [`PageFetcher`], parses each one with a
//! [`ContextualParser`] and concatenates the results. A failing page is
//! recorded and skipped; it never aborts the batch.

#![allow(clippy::uninlined_format_args)]

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::infrastructure::http_client::PageFetcher;
use crate::infrastructure::parsing::{
    ContextualParser, Diagnostic, ErrorClass, PageResult, ParseContext, ParsingError, ParsingResult,
};

/// Batch behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pages fetched at the same time; results keep URL order regardless
    pub max_concurrent_pages: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages: crate::infrastructure::config::defaults::MAX_CONCURRENT_PAGES,
        }
    }
}

/// One page to scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub url: String,
    pub page_id: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl PageRequest {
    /// Request whose page id is the last path segment of `url`
    pub fn from_url(url: &str) -> Self {
        let page_id = Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
            })
            .unwrap_or_else(|| url.to_string());
        Self {
            url: url.to_string(),
            page_id,
            region: None,
        }
    }

    pub fn with_page_id(mut self, page_id: impl Into<String>) -> Self {
        self.page_id = page_id.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// A page that contributed nothing to the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFailure {
    pub url: String,
    pub page_id: String,
    pub class: ErrorClass,
    pub message: String,
}

/// Concatenated page results in request order, plus the failed pages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult<R> {
    pub records: Vec<R>,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<PageFailure>,
    pub pages_succeeded: usize,
}

impl<R> Default for BatchResult<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            diagnostics: Vec::new(),
            failures: Vec::new(),
            pages_succeeded: 0,
        }
    }
}

impl<R> BatchResult<R> {
    pub fn pages_total(&self) -> usize {
        self.pages_succeeded + self.failures.len()
    }

    fn absorb(&mut self, request: &PageRequest, outcome: ParsingResult<PageResult<R>>) {
        match outcome {
            Ok(page) => {
                self.records.extend(page.records);
                self.diagnostics.extend(page.diagnostics);
                self.pages_succeeded += 1;
            }
            Err(e) => self.failures.push(PageFailure {
                url: request.url.clone(),
                page_id: request.page_id.clone(),
                class: e.class(),
                message: e.to_string(),
            }),
        }
    }
}

/// Scrapes pages of one source
pub struct BatchScraper<F: PageFetcher + ?Sized, P: ContextualParser> {
    fetcher: Arc<F>,
    parser: P,
    config: BatchConfig,
    cancellation_token: CancellationToken,
}

impl<F: PageFetcher + ?Sized, P: ContextualParser> BatchScraper<F, P> {
    pub fn new(fetcher: Arc<F>, parser: P, config: BatchConfig) -> Self {
        Self {
            fetcher,
            parser,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Stop issuing fetches once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Scrape every URL; never fails as a whole
    pub async fn scrape_all(&self, urls: &[String]) -> BatchResult<P::Output> {
        let requests = urls.iter().map(|url| PageRequest::from_url(url)).collect();
        self.scrape_requests(requests).await
    }

    pub async fn scrape_requests(&self, requests: Vec<PageRequest>) -> BatchResult<P::Output> {
        let source = self.parser.source();
        let concurrency = self.config.max_concurrent_pages.max(1);
        info!("Scraping {} {} pages ({} at a time)", requests.len(), source, concurrency);

        let outcomes: Vec<_> = stream::iter(requests)
            .map(|request| async move {
                let outcome = self.scrape_request(&request).await;
                (request, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut batch = BatchResult::default();
        for (request, outcome) in outcomes {
            if let Err(e) = &outcome {
                match e.class() {
                    ErrorClass::Cancelled => debug!("Skipped {}: {}", request.url, e),
                    ErrorClass::Network => error!("Page {} failed: {}", request.url, e),
                    _ => warn!("Page {} dropped: {}", request.url, e),
                }
            }
            batch.absorb(&request, outcome);
        }

        info!(
            "{} batch done: {} records from {}/{} pages, {} diagnostics",
            source,
            batch.records.len(),
            batch.pages_succeeded,
            batch.pages_total(),
            batch.diagnostics.len()
        );
        batch
    }

    /// Scrape one page, surfacing why it produced nothing
    pub async fn scrape_page(&self, url: &str) -> ParsingResult<PageResult<P::Output>> {
        self.scrape_request(&PageRequest::from_url(url)).await
    }

    pub async fn scrape_request(&self, request: &PageRequest) -> ParsingResult<PageResult<P::Output>> {
        let cancelled = || ParsingError::Cancelled {
            url: request.url.clone(),
        };
        if self.cancellation_token.is_cancelled() {
            return Err(cancelled());
        }

        let text = tokio::select! {
            result = self.fetcher.fetch_text(&request.url) => {
                result.map_err(|e| ParsingError::fetch_failed(&request.url, &e))?
            },
            _ = self.cancellation_token.cancelled() => return Err(cancelled()),
        };

        let mut context = ParseContext::new(self.parser.source(), request.page_id.clone())
            .with_url(request.url.clone());
        if let Some(region) = &request.region {
            context = context.with_region(region.clone());
        }
        self.parser.parse_with_context(&text, &context)
    }
}
