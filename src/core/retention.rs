//! Artifact retention
//!
//! Downloaded archives and changeset payloads accumulate under the dataset
//! directory. A purge keeps the newest `retain` files of each kind.

use crate::core::state::DatasetPaths;
use crate::domain::context::ResultExt;
use crate::domain::Result;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Files removed by a purge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Files deleted
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted
    pub failed: Vec<PathBuf>,
}

/// Keeps the newest `retain` changeset payloads and full archives
///
/// A `retain` of zero disables the purge. Deletion failures are logged as
/// warnings and reported, never raised.
///
/// # Errors
///
/// Returns an error only when a directory listing fails.
pub async fn purge(paths: &DatasetPaths, retain: usize) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();
    if retain == 0 {
        tracing::info!("Retention count is 0, skipping purge");
        return Ok(report);
    }
    for (dir, extension) in [(paths.changesets_dir(), "json"), (paths.full_dir(), "zip")] {
        let files = list_by_age(&dir, extension).await?;
        for path in files.into_iter().skip(retain) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Purged artifact");
                    report.removed.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to purge artifact");
                    report.failed.push(path);
                }
            }
        }
    }
    tracing::info!(
        retain,
        removed = report.removed.len(),
        failed = report.failed.len(),
        "Purge completed"
    );
    Ok(report)
}

/// Files with `extension` in `dir`, newest first
async fn list_by_age(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !tokio::fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((modified, path));
    }
    // Names carry a timestamp, so they break ties between equal mtimes
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}
