//! Logging system configuration and initialization
//!
//! - console output goes to stderr; stdout is reserved for the scrape report
//! - optional file output, plain or JSON, with the previous file rotated aside
//! - level and per-target filters from config, overridable through `RUST_LOG`

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::io::Stderr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{
        self,
        format::{DefaultFields, Format, Full},
        time::FormatTime,
    },
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the life of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());
}

/// Local wall-clock timestamps with offset
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Stderr layer, generic over whatever stack it ends up on
type ConsoleLayer<S> = fmt::Layer<S, DefaultFields, Format<Full, LocalTimeFormatter>, fn() -> Stderr>;

fn console_layer<S>() -> ConsoleLayer<S> {
    let stderr: fn() -> Stderr = std::io::stderr;
    fmt::Layer::new()
        .with_writer(stderr)
        .with_timer(LocalTimeFormatter)
        .with_target(false)
}

/// Default log directory: `logs/` next to the executable
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

fn resolve_log_directory(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(get_log_directory)
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Rename an existing log file to `<stem>.<timestamp>.log`
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<PathBuf>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let stamp: chrono::DateTime<Local> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, stamp.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(Some(timestamped_path))
}

/// Filter from `RUST_LOG`, or from the configured level plus module overrides
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::new(&config.level);
    if !config.level.to_lowercase().contains("trace") {
        for (target, level) in &config.module_filters {
            match format!("{}={}", target, level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("Ignoring log filter {}={}: {}", target, level, e),
            }
        }
    }
    filter
}

/// Initialize logging with custom configuration
///
/// Set `RUST_LOG` to override the configured filters, e.g.
/// `RUST_LOG="debug,reqwest=debug" market-pulse`.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let log_dir = resolve_log_directory(config);
    let registry = Registry::default().with(build_env_filter(config));

    let mut rotated = None;
    let file_writer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        rotated = rotate_existing_log_file(&log_dir, &config.file_name)?;

        let (writer, guard) = non_blocking(rolling::never(&log_dir, &config.file_name));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry is poisoned"))?
            .push(guard);
        Some(writer)
    } else {
        None
    };

    match (file_writer, config.console_output) {
        (Some(writer), console) => {
            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(console.then(console_layer))
                    .try_init()?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(console.then(console_layer))
                    .try_init()?;
            }
        }
        (None, true) => registry.with(console_layer()).try_init()?,
        (None, false) => return Err(anyhow!("No logging output configured")),
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
        if let Some(path) = rotated {
            info!("Rotated previous log file to: {:?}", path);
        }
        if config.auto_cleanup_logs {
            let removed = cleanup_old_logs(&log_dir, config)?;
            if removed > 0 {
                info!("Removed {} old log files", removed);
            }
        }
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Market Pulse System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("=======================================");
}

/// Delete old `.log` files, newest kept first. Returns the number removed.
fn cleanup_old_logs(log_dir: &Path, config: &LoggingConfig) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.ends_with(".log"));
        if !is_log {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let keep = if config.keep_only_latest {
        1
    } else {
        config.max_files.max(1) as usize
    };

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        std::fs::write(&path, name).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn test_log_directory_is_deterministic() {
        assert!(get_log_directory().to_string_lossy().ends_with("logs"));
    }

    #[test]
    fn test_rotate_existing_log_file() {
        let dir = TempDir::new().unwrap();
        assert!(rotate_existing_log_file(dir.path(), "app.log").unwrap().is_none());

        touch(dir.path(), "app.log", 0);
        let rotated = rotate_existing_log_file(dir.path(), "app.log").unwrap().unwrap();
        assert!(!dir.path().join("app.log").exists());
        let name = rotated.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("app.") && name.ends_with(".log"));
    }

    // The only test in this binary that installs the global subscriber
    #[test]
    fn test_init_json_file_without_console() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            file_output: true,
            console_output: false,
            json_format: true,
            auto_cleanup_logs: false,
            log_dir: Some(dir.path().to_path_buf()),
            file_name: "market-pulse-test.log".to_string(),
            ..Default::default()
        };

        init_logging_with_config(&config).unwrap();
        assert!(dir.path().join("market-pulse-test.log").exists());

        // A second global subscriber is refused
        assert!(init_logging_with_config(&config).is_err());
    }

    #[test]
    fn test_console_layer_fits_any_stack() {
        let _console_only = Registry::default().with(console_layer());
        let _with_file = Registry::default()
            .with(EnvFilter::new("info"))
            .with(fmt::Layer::new().with_writer(std::io::sink).with_ansi(false))
            .with(true.then(console_layer));

        let disabled: Option<ConsoleLayer<Registry>> = false.then(console_layer);
        assert!(disabled.is_none());
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.log", 300);
        touch(dir.path(), "b.log", 200);
        touch(dir.path(), "c.log", 100);
        touch(dir.path(), "notes.txt", 400);

        let config = LoggingConfig {
            max_files: 2,
            ..Default::default()
        };
        assert_eq!(cleanup_old_logs(dir.path(), &config).unwrap(), 1);
        assert!(!dir.path().join("a.log").exists());
        assert!(dir.path().join("c.log").exists());
        assert!(dir.path().join("notes.txt").exists());

        let config = LoggingConfig {
            keep_only_latest: true,
            ..Default::default()
        };
        assert_eq!(cleanup_old_logs(dir.path(), &config).unwrap(), 1);
        assert!(dir.path().join("c.log").exists());
        assert!(!dir.path().join("b.log").exists());
    }
}
