//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output for the operator
//! - JSON-formatted log files with rotation
//! - Per-dataset log directories
//!
//! # Example
//!
//! ```no_run
//! use geosync::logging::init_logging;
//! use geosync::config::LoggingConfig;
//! use std::path::Path;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config, Path::new("logs")).expect("Failed to initialize logging");
//!
//! tracing::info!(dataset = "parcels", "Sync started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, resolve_log_dir, LoggingGuard};

/// Log the changeset time window of a run
///
/// # Example
///
/// ```no_run
/// use geosync::log_window;
///
/// log_window!("2024-06-20T01:00:00Z", "2024-06-20T02:00:00Z");
/// ```
#[macro_export]
macro_rules! log_window {
    ($from:expr, $to:expr) => {
        tracing::info!(
            from = %$from,
            to = %$to,
            "Changeset window"
        );
    };
}

/// Log the classified counts of a sync delta
///
/// # Example
///
/// ```no_run
/// use geosync::log_delta_counts;
/// use geosync::domain::SyncDelta;
///
/// let delta = SyncDelta::new();
/// log_delta_counts!(&delta);
/// ```
#[macro_export]
macro_rules! log_delta_counts {
    ($delta:expr) => {
        tracing::info!(
            added = $delta.added.len(),
            updated = $delta.updated.len(),
            deleted = $delta.deleted.len(),
            "Delta classified"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use geosync::log_error_with_context;
/// use geosync::domain::GeosyncError;
///
/// let error = GeosyncError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
