//! Batch orchestration over an in-memory fetcher

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use market_pulse_lib::infrastructure::parsing::{IndexBoardParser, WorldIndexParser};
use market_pulse_lib::infrastructure::{
    BatchConfig, BatchScraper, ErrorClass, PageFetcher, PageRequest, SourcesConfig,
};

const WORLD_EUROPE: &str = include_str!("fixtures/world_indices_europe.html");
const INDEX_BOARD: &str = include_str!("fixtures/index_board.html");

#[derive(Default)]
struct MemoryFetcher {
    pages: HashMap<String, String>,
    delays: HashMap<String, u64>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    fn with_page(mut self, url: &str, body: &str, delay_ms: u64) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self.delays.insert(url.to_string(), delay_ms);
        self
    }
}

#[async_trait]
impl PageFetcher for MemoryFetcher {
    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP request failed with status 503: {url}"))
    }
}

fn board(n: usize) -> String {
    INDEX_BOARD.replace(">DAX<", &format!(">DAX{n}<"))
}

#[tokio::test]
async fn second_of_three_fetches_fails() {
    let fetcher = Arc::new(
        MemoryFetcher::default()
            .with_page("https://board.test/1", &board(1), 20)
            .with_page("https://board.test/3", &board(3), 0),
    );
    let scraper = BatchScraper::new(
        fetcher.clone(),
        IndexBoardParser::new().unwrap(),
        BatchConfig {
            max_concurrent_pages: 3,
        },
    );
    let urls: Vec<String> = (1..=3).map(|n| format!("https://board.test/{n}")).collect();

    let batch = scraper.scrape_all(&urls).await;

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(batch.pages_succeeded, 2);
    assert_eq!(batch.pages_total(), 3);
    assert_eq!(batch.records.len(), 6);
    assert_eq!(batch.records[0].code, "DAX1");
    assert_eq!(batch.records[3].code, "DAX3");

    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].url, "https://board.test/2");
    assert_eq!(batch.failures[0].class, ErrorClass::Network);
}

#[tokio::test]
async fn configured_requests_carry_region() {
    let sources = SourcesConfig {
        world_index_url_pattern: "https://digest.test/world-indices/{}".to_string(),
        world_index_regions: vec!["europe".to_string()],
        ..Default::default()
    };
    let fetcher = Arc::new(MemoryFetcher::default().with_page(
        "https://digest.test/world-indices/europe",
        WORLD_EUROPE,
        0,
    ));
    let scraper = BatchScraper::new(
        fetcher,
        WorldIndexParser::new().unwrap(),
        BatchConfig::default(),
    );

    let batch = scraper.scrape_requests(sources.world_index_requests()).await;
    assert_eq!(batch.records.len(), 3);
    assert!(batch.records.iter().all(|r| r.region.as_deref() == Some("Europe")));
    assert_eq!(batch.diagnostics.len(), 2);
    assert!(batch.diagnostics.iter().all(|d| d.page == "europe"));
}

#[test]
fn single_page_error_is_typed() {
    let fetcher = Arc::new(MemoryFetcher::default().with_page(
        "https://board.test/empty",
        "<html></html>",
        0,
    ));
    let scraper = BatchScraper::new(
        fetcher,
        IndexBoardParser::new().unwrap(),
        BatchConfig::default(),
    );

    let result = tokio_test::block_on(scraper.scrape_page("https://board.test/empty"));
    assert_eq!(result.unwrap_err().class(), ErrorClass::PageStructure);

    let request = PageRequest::from_url("https://board.test/missing");
    let result = tokio_test::block_on(scraper.scrape_request(&request));
    assert_eq!(result.unwrap_err().class(), ErrorClass::Network);
}
