//! Run summary and reporting
//!
//! This module defines the record of what one synchronization run did.

use crate::core::state::ChangesetWindow;
use crate::core::sync::TargetReport;
use crate::domain::timestamp::format_utc;
use crate::domain::SyncDelta;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Summary of a completed synchronization run
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// Mode label (`full`, `changeset`, `resume`, `replay-archive`, `replay-changeset`)
    pub mode: String,

    /// Changeset window, for changeset runs
    pub window: Option<ChangesetWindow>,

    /// Records added to the canonical store
    pub added: usize,

    /// Records updated in place
    pub updated: usize,

    /// Identities deleted
    pub deleted: usize,

    /// Records removed by the corrective post-filter
    pub filtered: usize,

    /// Canonical store row count after the commit
    pub canonical_rows: usize,

    /// Target store activity, when a target is configured
    pub target: Option<TargetReport>,

    /// Artifact the run read
    pub artifact: Option<PathBuf>,

    /// SHA-256 of the artifact
    pub digest: Option<String>,

    /// New cursor value, when the run moved it
    pub cursor_advanced_to: Option<DateTime<Utc>>,

    /// Duration of the run
    pub duration: Duration,
}

impl SyncSummary {
    /// Create a new summary for a mode
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            ..Self::default()
        }
    }

    /// Records the classified counts of a delta
    pub fn record_delta(&mut self, delta: &SyncDelta) {
        self.added = delta.added.len();
        self.updated = delta.updated.len();
        self.deleted = delta.deleted.len();
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Total number of changed identities
    pub fn total_changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            mode = %self.mode,
            from = %self.window.map(|w| format_utc(&w.from)).unwrap_or_default(),
            to = %self.window.map(|w| format_utc(&w.to)).unwrap_or_default(),
            added = self.added,
            updated = self.updated,
            deleted = self.deleted,
            filtered = self.filtered,
            canonical_rows = self.canonical_rows,
            artifact = %self.artifact.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            sha256 = %self.digest.as_deref().unwrap_or_default(),
            cursor = %self.cursor_advanced_to.map(|c| format_utc(&c)).unwrap_or_default(),
            duration_secs = self.duration.as_secs(),
            "Sync completed"
        );

        if let Some(target) = &self.target {
            tracing::info!(
                deleted = target.deleted,
                written = target.written,
                "Target store reconciled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Feature;
    use serde_json::Map;

    #[test]
    fn test_record_delta_counts() {
        let delta = SyncDelta::full(vec![
            Feature::new("id", 1i64.into(), None, Map::new()),
            Feature::new("id", 2i64.into(), None, Map::new()),
        ]);
        let mut summary = SyncSummary::new("full");
        summary.record_delta(&delta);
        assert_eq!(summary.added, 2);
        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.mode, "full");
    }
}
