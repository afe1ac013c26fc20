//! market-pulse: scrape every configured source and print the records as JSON
//!
//! Usage: `market-pulse [CONFIG_PATH]`. Without a path the config file in the
//! user config directory is used (and created on first run).

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use market_pulse_lib::domain::{IndexQuote, IndexTick, SecurityProfile};
use market_pulse_lib::infrastructure::{
    BatchResult, BatchScraper, ConfigManager, HttpClient, IndexBoardParser, SecuritySnapshotParser,
    WorldIndexParser, init_logging_with_config, log_system_info,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeReport {
    world_indices: BatchResult<IndexQuote>,
    index_board: BatchResult<IndexTick>,
    securities: BatchResult<SecurityProfile>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let manager = match std::env::args().nth(1) {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let config = manager.load_config().await?;

    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    log_system_info();
    info!("Using configuration: {:?}", manager.config_path());

    config.validate().context("Invalid configuration")?;

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 Interrupt received, cancelling outstanding fetches");
                token.cancel();
            }
        });
    }

    let client = Arc::new(HttpClient::with_cancellation(
        config.http.clone(),
        token.clone(),
    )?);

    let world = BatchScraper::new(
        client.clone(),
        WorldIndexParser::with_markers(config.markers.world_index.clone())?,
        config.batch.clone(),
    )
    .with_cancellation(token.clone());
    let board = BatchScraper::new(
        client.clone(),
        IndexBoardParser::with_markers(config.markers.index_board.clone())?,
        config.batch.clone(),
    )
    .with_cancellation(token.clone());
    let snapshots = BatchScraper::new(
        client,
        SecuritySnapshotParser::with_markers(config.markers.security_snapshot.clone())?,
        config.batch.clone(),
    )
    .with_cancellation(token.clone());

    let (world_indices, index_board, securities) = tokio::join!(
        world.scrape_requests(config.sources.world_index_requests()),
        board.scrape_requests(config.sources.index_board_requests()),
        snapshots.scrape_requests(config.sources.snapshot_requests()),
    );

    let failed = world_indices.failures.len() + index_board.failures.len() + securities.failures.len();
    let report = ScrapeReport {
        world_indices,
        index_board,
        securities,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &report).context("Failed to write report")?;
    writeln!(out)?;

    if failed > 0 {
        error!("{} pages failed", failed);
    } else {
        info!("✅ All pages scraped");
    }
    Ok(())
}
