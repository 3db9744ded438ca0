//! Changeset cursor
//!
//! The cursor is the single `last_updated` timestamp of a dataset. It is the
//! start of the next changeset window and is only moved forward after the data
//! of a window has been committed.

use crate::adapters::geoprocessing::write_atomic;
use crate::core::state::layout::DatasetPaths;
use crate::domain::timestamp::{format_utc, parse_utc};
use crate::domain::{GeosyncError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Cursor file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorFile {
    last_updated: String,
}

/// Half-open changeset window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangesetWindow {
    /// Window start, the current cursor
    pub from: DateTime<Utc>,
    /// Window end, the run start
    pub to: DateTime<Utc>,
}

impl fmt::Display for ChangesetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_utc(&self.from), format_utc(&self.to))
    }
}

/// Reads and writes the cursor file of one dataset
#[derive(Debug, Clone)]
pub struct CursorTracker {
    path: PathBuf,
}

impl CursorTracker {
    /// Tracker over an explicit cursor file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Tracker over the dataset's cursor file
    pub fn for_dataset(paths: &DatasetPaths) -> Self {
        Self::new(paths.cursor_file())
    }

    /// Cursor file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cursor
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` when no cursor file exists.
    ///
    /// # Errors
    ///
    /// Returns a precondition error when the file exists but holds no usable
    /// timestamp; the operator has to repair it or run a full retrieval.
    pub async fn read(&self) -> Result<Option<DateTime<Utc>>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let unusable = |reason: String| {
            GeosyncError::Precondition(format!(
                "Cursor file {} is unusable ({reason}). Fix it or run a full retrieval",
                self.path.display()
            ))
        };
        let file: CursorFile = serde_json::from_str(&text).map_err(|e| unusable(e.to_string()))?;
        let at = parse_utc(&file.last_updated).map_err(|e| unusable(e.to_string()))?;
        Ok(Some(at))
    }

    /// Replaces the cursor atomically
    pub async fn write(&self, at: DateTime<Utc>) -> Result<()> {
        let file = CursorFile {
            last_updated: format_utc(&at),
        };
        write_atomic(&self.path, &serde_json::to_vec(&file)?).await?;
        tracing::info!(cursor = %file.last_updated, "Cursor updated");
        Ok(())
    }

    /// Seeds a missing cursor at `at`
    ///
    /// # Returns
    ///
    /// Returns `true` when a cursor was written, `false` when one already existed.
    pub async fn seed_at(&self, at: DateTime<Utc>) -> Result<bool> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(false);
        }
        self.write(at).await?;
        Ok(true)
    }

    /// Seeds a missing cursor at the current time
    pub async fn seed_now(&self) -> Result<bool> {
        self.seed_at(Utc::now()).await
    }

    /// Window for a changeset run starting at `run_started`
    ///
    /// A missing cursor is seeded at `run_started` so a later changeset has
    /// something to diff against, and the run is refused.
    ///
    /// # Errors
    ///
    /// Returns a precondition error when no cursor exists or the cursor lies
    /// after the run start.
    pub async fn window_for_changeset(&self, run_started: DateTime<Utc>) -> Result<ChangesetWindow> {
        let Some(from) = self.read().await? else {
            self.seed_at(run_started).await?;
            return Err(GeosyncError::Precondition(format!(
                "No cursor found at {}. A cursor has been seeded at {}; run a full retrieval first so no changes are missed",
                self.path.display(),
                format_utc(&run_started)
            )));
        };
        if from > run_started {
            return Err(GeosyncError::Precondition(format!(
                "Cursor {} is later than the run start {}",
                format_utc(&from),
                format_utc(&run_started)
            )));
        }
        Ok(ChangesetWindow {
            from,
            to: run_started,
        })
    }

    /// Moves the cursor to `to` after a successful commit
    ///
    /// # Errors
    ///
    /// Returns [`GeosyncError::CursorPersist`] so callers can tell a cursor
    /// write failure apart from a failed retrieval.
    pub async fn advance(&self, to: DateTime<Utc>) -> Result<()> {
        self.write(to).await.map_err(|e| GeosyncError::CursorPersist {
            to: format_utc(&to),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_missing_cursor_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CursorTracker::new(dir.path().join("last_updated.json"));
        assert_eq!(tracker.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CursorTracker::new(dir.path().join("last_updated.json"));
        tracker.write(at(1)).await.unwrap();
        assert_eq!(tracker.read().await.unwrap(), Some(at(1)));

        let raw = std::fs::read_to_string(tracker.path()).unwrap();
        assert_eq!(raw, r#"{"last_updated":"2024-06-20T01:00:00Z"}"#);
        assert!(!tracker.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_reads_legacy_naive_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_updated.json");
        std::fs::write(&path, r#"{"last_updated": "2024-06-20T01:00:00.000000Z"}"#).unwrap();
        assert_eq!(CursorTracker::new(path).read().await.unwrap(), Some(at(1)));
    }

    #[tokio::test]
    async fn test_corrupt_cursor_is_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_updated.json");
        std::fs::write(&path, r#"{"last_updated": ""}"#).unwrap();
        let err = CursorTracker::new(path).read().await.unwrap_err();
        assert!(matches!(err, GeosyncError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_window_without_cursor_seeds_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CursorTracker::new(dir.path().join("last_updated.json"));
        let err = tracker.window_for_changeset(at(2)).await.unwrap_err();
        assert!(matches!(err, GeosyncError::Precondition(_)));
        assert_eq!(tracker.read().await.unwrap(), Some(at(2)));
    }

    #[tokio::test]
    async fn test_window_runs_from_cursor_to_run_start() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CursorTracker::new(dir.path().join("last_updated.json"));
        tracker.write(at(1)).await.unwrap();
        let window = tracker.window_for_changeset(at(2)).await.unwrap();
        assert_eq!(window, ChangesetWindow { from: at(1), to: at(2) });
        assert_eq!(window.to_string(), "[2024-06-20T01:00:00Z, 2024-06-20T02:00:00Z)");
    }

    #[tokio::test]
    async fn test_cursor_ahead_of_run_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CursorTracker::new(dir.path().join("last_updated.json"));
        tracker.write(at(3)).await.unwrap();
        assert!(tracker.window_for_changeset(at(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CursorTracker::new(dir.path().join("last_updated.json"));
        assert!(tracker.seed_at(at(1)).await.unwrap());
        assert!(!tracker.seed_at(at(5)).await.unwrap());
        assert_eq!(tracker.read().await.unwrap(), Some(at(1)));
    }

    #[tokio::test]
    async fn test_advance_failure_is_cursor_persist() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("last_updated.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), "x").unwrap();
        let err = CursorTracker::new(&path).advance(at(2)).await.unwrap_err();
        assert!(matches!(err, GeosyncError::CursorPersist { .. }));
    }
}
