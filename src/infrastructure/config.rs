//! Configuration infrastructure
//!
//! One JSON file holds every setting: logging, HTTP behaviour, batch size,
//! which pages to scrape and the marker vocabulary of each source. Missing
//! sections fall back to defaults, so a partial file stays valid.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use url::Url;

use crate::domain::constants::sites;
use crate::infrastructure::crawling::{BatchConfig, PageRequest};
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::parsing::ParsingConfig;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub http: HttpClientConfig,
    pub batch: BatchConfig,
    pub sources: SourcesConfig,
    /// Marker vocabulary per source
    pub markers: ParsingConfig,
}

impl AppConfig {
    /// Reject settings the scraper cannot run with
    pub fn validate(&self) -> ParsingResult<()> {
        self.markers.validate()?;
        self.sources.validate()?;

        if self.batch.max_concurrent_pages == 0 {
            return Err(ParsingError::configuration(
                "batch.max_concurrent_pages",
                "must be at least 1",
            ));
        }
        if self.http.max_requests_per_second == 0 {
            return Err(ParsingError::configuration(
                "http.max_requests_per_second",
                "must be at least 1",
            ));
        }
        if !self.logging.console_output && !self.logging.file_output {
            return Err(ParsingError::configuration(
                "logging",
                "console_output and file_output are both disabled",
            ));
        }
        Ok(())
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// JSON formatted file output
    pub json_format: bool,

    /// Console output (stderr; stdout carries the report)
    pub console_output: bool,

    pub file_output: bool,

    /// Log directory; `None` means `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Remove old log files on startup
    pub auto_cleanup_logs: bool,

    /// Keep only the most recent log file
    pub keep_only_latest: bool,

    /// Per-target level overrides (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            keep_only_latest: defaults::LOG_KEEP_ONLY_LATEST,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("hyper_util".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Which pages to scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Digest page URL with `{}` for the region slug
    pub world_index_url_pattern: String,
    pub world_index_regions: Vec<String>,
    pub index_board_urls: Vec<String>,
    /// Snapshot page URL with `{}` for the symbol
    pub snapshot_url_pattern: String,
    pub snapshot_symbols: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            world_index_url_pattern: sites::WORLD_INDEX_PAGE_PATTERN.to_string(),
            world_index_regions: sites::WORLD_INDEX_REGIONS
                .iter()
                .map(|r| r.to_string())
                .collect(),
            index_board_urls: vec![sites::INDEX_BOARD_URL.to_string()],
            snapshot_url_pattern: sites::SNAPSHOT_PAGE_PATTERN.to_string(),
            snapshot_symbols: defaults::SNAPSHOT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SourcesConfig {
    pub fn world_index_requests(&self) -> Vec<PageRequest> {
        self.world_index_regions
            .iter()
            .map(|region| {
                PageRequest::from_url(&utils::fill_pattern(&self.world_index_url_pattern, region))
                    .with_page_id(region.clone())
                    .with_region(utils::region_label(region))
            })
            .collect()
    }

    pub fn index_board_requests(&self) -> Vec<PageRequest> {
        self.index_board_urls
            .iter()
            .map(|url| PageRequest::from_url(url))
            .collect()
    }

    pub fn snapshot_requests(&self) -> Vec<PageRequest> {
        self.snapshot_symbols
            .iter()
            .map(|symbol| {
                PageRequest::from_url(&utils::fill_pattern(&self.snapshot_url_pattern, symbol))
                    .with_page_id(symbol.clone())
            })
            .collect()
    }

    pub fn validate(&self) -> ParsingResult<()> {
        for (field, pattern) in [
            ("sources.world_index_url_pattern", &self.world_index_url_pattern),
            ("sources.snapshot_url_pattern", &self.snapshot_url_pattern),
        ] {
            if !pattern.contains("{}") {
                return Err(ParsingError::configuration(field, "pattern needs a '{}' placeholder"));
            }
            utils::check_url(field, &utils::fill_pattern(pattern, "x"))?;
        }
        for url in &self.index_board_urls {
            utils::check_url("sources.index_board_urls", url)?;
        }
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Manager for the file in the user config directory
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist.
    ///
    /// A file that does not parse is copied to `*.json.corrupted` and replaced
    /// by defaults.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file is invalid: {}", parse_error);

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default values
pub mod defaults {
    /// Directory name under the user config / data directories
    pub const APP_DIR_NAME: &str = "market-pulse";

    pub const CONFIG_FILE_NAME: &str = "market_pulse_config.json";

    pub const USER_AGENT: &str = "market-pulse/0.1 (+market data import)";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// The sources are small sites; stay well below anything that looks like a crawl
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    /// Total attempts per page
    pub const RETRY_COUNT: u32 = 3;

    pub const RETRY_DELAY_MS: u64 = 1000;

    pub const MAX_CONCURRENT_PAGES: usize = 4;

    pub const SNAPSHOT_SYMBOLS: &[&str] = &["AAPL", "MSFT", "SAP"];

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = false;

    pub const LOG_FILE_NAME: &str = "market-pulse.log";

    pub const LOG_MAX_FILES: u32 = 5;

    pub const LOG_AUTO_CLEANUP: bool = true;

    pub const LOG_KEEP_ONLY_LATEST: bool = false;
}

/// URL building helpers
pub mod utils {
    use super::{ParsingError, ParsingResult, Url};

    /// Replace the first `{}` in `pattern` with `value`
    pub fn fill_pattern(pattern: &str, value: &str) -> String {
        pattern.replacen("{}", value, 1)
    }

    /// `"asia-pacific"` -> `"Asia Pacific"`
    pub fn region_label(slug: &str) -> String {
        slug.split(['-', '_'])
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn check_url(field: &str, raw: &str) -> ParsingResult<()> {
        let parsed = Url::parse(raw)
            .map_err(|e| ParsingError::configuration(field, format!("invalid URL '{}': {}", raw, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ParsingError::configuration(
                field,
                format!("unsupported scheme '{}' in '{}'", other, raw),
            )),
        }
    }
}
