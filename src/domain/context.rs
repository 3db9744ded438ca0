//! Error context extension trait
//!
//! A context extension similar to `anyhow::Context` that works with
//! `Result<T, GeosyncError>`. Unlike `anyhow`, the error keeps its taxonomy
//! variant, so a contextualised I/O failure still maps to the same exit code.
//!
//! # Examples
//!
//! ```rust
//! use geosync::domain::Result;
//! use geosync::domain::context::ResultExt;
//!
//! fn read_cursor(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_context(|| format!("Failed to read cursor file {path}"))
//! }
//! ```

use crate::domain::errors::GeosyncError;
use crate::domain::result::Result;

/// Extension trait for adding context to `Result` types
pub trait ResultExt<T> {
    /// Add context to an error
    ///
    /// The context is evaluated eagerly; use `.with_context()` when building
    /// the message is not free.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add lazily evaluated context to an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<GeosyncError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| prefix(e.into(), &context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| prefix(e.into(), &f()))
    }
}

fn prefix(err: GeosyncError, context: &dyn std::fmt::Display) -> GeosyncError {
    match err {
        GeosyncError::Configuration(m) => GeosyncError::Configuration(format!("{context}: {m}")),
        GeosyncError::Precondition(m) => GeosyncError::Precondition(format!("{context}: {m}")),
        GeosyncError::Retrieval { message, body } => GeosyncError::Retrieval {
            message: format!("{context}: {message}"),
            body,
        },
        GeosyncError::Reconciliation(m) => GeosyncError::Reconciliation(format!("{context}: {m}")),
        GeosyncError::CursorPersist { to, message } => GeosyncError::CursorPersist {
            to,
            message: format!("{context}: {message}"),
        },
        GeosyncError::Serialization(m) => GeosyncError::Serialization(format!("{context}: {m}")),
        GeosyncError::Io(m) => GeosyncError::Io(format!("{context}: {m}")),
    }
}
