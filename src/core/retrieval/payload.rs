//! Changeset payload inspection
//!
//! The feed answers errors in the same channel as data, often with HTTP 200:
//! an OGC exception report (XML), an HTML error page, or a JSON error object.
//! The payload is therefore classified by content, not by status.

use crate::domain::{GeosyncError, Result};
use serde_json::Value;
use std::path::Path;

/// Raw bodies attached to errors are cut to this many bytes
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Classified changeset payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Feature collection with records
    Features {
        /// Number of feature records in the payload
        count: usize,
    },
    /// Valid feature collection without records
    Empty,
}

/// Classifies a downloaded changeset payload
///
/// # Errors
///
/// Returns a retrieval error carrying the (truncated) raw body when the
/// payload is markup, invalid JSON, or JSON that is not a feature collection.
pub async fn sniff_payload(path: &Path) -> Result<PayloadKind> {
    let bytes = tokio::fs::read(path).await?;
    classify(&bytes)
}

/// Builds a retrieval error carrying the payload at `path` as its body
///
/// Used when a payload that looked like a feature collection holds records
/// that cannot be converted.
pub async fn reject_payload(path: &Path, message: impl Into<String>) -> GeosyncError {
    let body = match tokio::fs::read(path).await {
        Ok(bytes) => truncate_body(String::from_utf8_lossy(&bytes).trim()),
        Err(e) => format!("<unreadable payload: {e}>"),
    };
    GeosyncError::retrieval(message, body)
}

fn classify(bytes: &[u8]) -> Result<PayloadKind> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if trimmed.is_empty() {
        return Err(GeosyncError::retrieval("Service returned an empty payload", ""));
    }
    if trimmed.starts_with('<') {
        return Err(GeosyncError::retrieval(
            "Service returned a markup document instead of features",
            truncate_body(trimmed),
        ));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| {
        GeosyncError::retrieval(
            format!("Service returned invalid JSON: {e}"),
            truncate_body(trimmed),
        )
    })?;

    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(GeosyncError::retrieval(
            "Service returned JSON that is not a feature collection",
            truncate_body(trimmed),
        ));
    }

    let count = value
        .get("features")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let number_returned = value.get("numberReturned").and_then(Value::as_u64);

    if number_returned == Some(0) || count == 0 {
        return Ok(PayloadKind::Empty);
    }
    Ok(PayloadKind::Features { count })
}

fn truncate_body(text: &str) -> String {
    if text.len() <= MAX_BODY_BYTES {
        return text.to_string();
    }
    let mut end = MAX_BODY_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
