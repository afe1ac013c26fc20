//! Market Pulse - marker-based market page scraping
//!
//! Turns world index digests, exchange index boards and security snapshot
//! pages into typed records. See [`infrastructure::parsing`] for the scan
//! loop and [`infrastructure::crawling`] for batch orchestration.

pub mod domain;
pub mod infrastructure;

pub use domain::{IndexQuote, IndexTick, SecurityProfile, SourceKind};
pub use infrastructure::{
    AppConfig, BatchResult, BatchScraper, ContextualParser, HttpClient, PageFetcher, ParsingError,
};
