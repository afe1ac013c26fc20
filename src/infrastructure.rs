//! Infrastructure layer: page parsing, HTTP fetching, batch scraping,
//! configuration and logging.

pub mod config;
pub mod crawling;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod parsing_error;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, LoggingConfig, SourcesConfig};
pub use crawling::{BatchConfig, BatchResult, BatchScraper, PageFailure, PageRequest};
pub use http_client::{HttpClient, HttpClientConfig, HttpStatusError, PageFetcher};
pub use logging::{get_log_directory, init_logging, init_logging_with_config, log_system_info};
pub use parsing::{
    ContextualParser, IndexBoardParser, ParsingConfig, SecuritySnapshotParser, WorldIndexParser,
};
pub use parsing_error::{ErrorClass, ParsingError, ParsingResult};
