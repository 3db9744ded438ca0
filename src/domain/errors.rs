//! Domain error types
//!
//! This module defines the error hierarchy for geosync. The variants follow the
//! synchronization error taxonomy: configuration and precondition failures stop
//! a run before any data moves, retrieval failures stop it before anything is
//! committed, and reconciliation failures stop it after the canonical store
//! commit but before the cursor is advanced.

use thiserror::Error;

/// Main geosync error type
///
/// This is the primary error type used throughout the library. Every variant
/// carries enough context (job id, window bounds, raw payload) for an operator
/// to retry the run by hand; nothing is retried automatically.
#[derive(Debug, Error)]
pub enum GeosyncError {
    /// Invalid or inconsistent configuration, detected before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A precondition for the requested run is not met (e.g. no cursor for a changeset)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The remote service failed or returned an error payload instead of data
    #[error("Retrieval error: {message}")]
    Retrieval {
        /// Human readable description
        message: String,
        /// Raw response body, kept for diagnostics
        body: Option<String>,
    },

    /// The geoprocessing engine rejected a commit
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// Data was committed but the cursor could not be persisted
    #[error("Cursor not advanced to {to} after a successful commit: {message}")]
    CursorPersist {
        /// Window end the cursor should have been moved to
        to: String,
        /// Underlying failure
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl GeosyncError {
    /// Builds a retrieval error that keeps the raw response body
    pub fn retrieval(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Builds a retrieval error for transport-level failures (no body)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
            body: None,
        }
    }

    /// Raw response payload attached to a retrieval error, if any
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Retrieval { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Process exit code for this error
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 2 | Configuration error |
    /// | 3 | Precondition failed |
    /// | 4 | Retrieval or transport error |
    /// | 5 | Reconciliation, cursor or local I/O failure |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Precondition(_) => 3,
            Self::Retrieval { .. } => 4,
            Self::Reconciliation(_)
            | Self::CursorPersist { .. }
            | Self::Serialization(_)
            | Self::Io(_) => 5,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for GeosyncError {
    fn from(err: std::io::Error) -> Self {
        GeosyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for GeosyncError {
    fn from(err: serde_json::Error) -> Self {
        GeosyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for GeosyncError {
    fn from(err: toml::de::Error) -> Self {
        GeosyncError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<zip::result::ZipError> for GeosyncError {
    fn from(err: zip::result::ZipError) -> Self {
        GeosyncError::Io(format!("Archive error: {err}"))
    }
}
