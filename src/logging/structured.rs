//! Structured logging setup using tracing
//!
//! Console output for the operator plus an optional JSON log file with
//! rotation. When no log directory is configured the file lands in the
//! dataset's own `logs/` directory.
//!
//! # Example
//!
//! ```no_run
//! use geosync::logging::init_logging;
//! use geosync::config::LoggingConfig;
//! use std::path::Path;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config, Path::new("data/parcels/logs"))
//!     .expect("Failed to initialize logging");
//! ```

use crate::config::LoggingConfig;
use crate::domain::{GeosyncError, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Guard that must be kept alive for the duration of the program
/// to ensure logs are flushed properly
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            _file_guard: file_guard,
        }
    }
}

/// Initialize the logging system based on configuration
///
/// # Arguments
///
/// * `log_level_str` - Log level as a string (trace, debug, info, warn, error)
/// * `config` - Logging configuration
/// * `default_dir` - Log directory used when `config.local_path` is empty
///
/// # Returns
///
/// A `LoggingGuard` that must be kept alive for the duration of the program
pub fn init_logging(
    log_level_str: &str,
    config: &LoggingConfig,
    default_dir: &Path,
) -> Result<LoggingGuard> {
    let log_level = parse_log_level(log_level_str)?;

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("geosync={}", log_level)));

    let mut layers = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(env_filter.clone());
    layers.push(console_layer.boxed());

    let log_dir = resolve_log_dir(config, default_dir);
    let file_guard = if config.local_enabled {
        let rotation = match config.local_rotation.as_str() {
            "hourly" => Rotation::HOURLY,
            "never" => Rotation::NEVER,
            _ => Rotation::DAILY,
        };

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            GeosyncError::Configuration(format!(
                "Failed to create log directory {}: {}",
                log_dir.display(),
                e
            ))
        })?;

        let file_appender = RollingFileAppender::new(rotation, &log_dir, "geosync.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(non_blocking)
            .with_filter(env_filter);

        layers.push(file_layer.boxed());
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| GeosyncError::Configuration(format!("Failed to initialize logging: {e}")))?;

    tracing::debug!(
        local_enabled = config.local_enabled,
        log_dir = %log_dir.display(),
        "Logging initialized"
    );

    Ok(LoggingGuard::new(file_guard))
}

/// Directory the JSON log file is written to
pub fn resolve_log_dir(config: &LoggingConfig, default_dir: &Path) -> PathBuf {
    if config.local_path.trim().is_empty() {
        default_dir.to_path_buf()
    } else {
        PathBuf::from(&config.local_path)
    }
}

/// Parse log level from string
fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(GeosyncError::Configuration(format!(
            "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
            level_str
        ))),
    }
}
