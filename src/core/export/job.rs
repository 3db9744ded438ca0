//! Export job state machine
//!
//! ```text
//! Idle -> Requested -> Polling -> Ready -> Downloaded
//!   \__________________^    \--> TimedOut
//!        (resume)            \-> Failed
//! ```
//!
//! The job is a plain value: everything needed to resume is its identifier.

use crate::adapters::remote::{ExportPhase, ExportStatus};
use crate::domain::{GeosyncError, JobId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// State of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Known by identifier only
    #[default]
    Idle,
    /// Created on the service by this invocation
    Requested,
    /// Waiting for the service to finish
    Polling,
    /// Artifact can be downloaded
    Ready,
    /// Polling budget exhausted; the remote job keeps running
    TimedOut,
    /// The service reported failure
    Failed,
    /// Artifact stored locally
    Downloaded,
}

impl JobState {
    /// True when `next` is a legal successor
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, Requested)
                | (Idle, Polling)
                | (Requested, Polling)
                | (Polling, Polling)
                | (Polling, Ready)
                | (Polling, TimedOut)
                | (Polling, Failed)
                | (Ready, Downloaded)
        )
    }

    /// True for states that end an invocation
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::TimedOut | JobState::Failed | JobState::Downloaded)
    }
}

/// One remote export job as seen by this invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    id: JobId,
    state: JobState,
    requested_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    elapsed: Duration,
    checks: u32,
    last_status: Option<ExportStatus>,
    artifact: Option<PathBuf>,
}

impl ExportJob {
    /// Job known only by its identifier
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Idle,
            requested_at: None,
            created_at: None,
            elapsed: Duration::ZERO,
            checks: 0,
            last_status: None,
            artifact: None,
        }
    }

    /// Job identifier, the resumption handle
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Current state
    pub fn state(&self) -> JobState {
        self.state
    }

    /// When this invocation requested the job
    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    /// Creation time reported by the service
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Time spent polling
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of status checks made
    pub fn checks(&self) -> u32 {
        self.checks
    }

    /// Most recent status document
    pub fn last_status(&self) -> Option<&ExportStatus> {
        self.last_status.as_ref()
    }

    /// Downloaded artifact
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(GeosyncError::Precondition(format!(
                "Export job {} cannot move from {:?} to {:?}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Marks the job as created by this invocation
    pub fn mark_requested(&mut self, status: ExportStatus, at: DateTime<Utc>) -> Result<()> {
        self.transition(JobState::Requested)?;
        self.requested_at = Some(at);
        self.created_at = status.created_at;
        self.last_status = Some(status);
        Ok(())
    }

    /// Enters polling, from a request or directly on resume
    pub fn start_polling(&mut self) -> Result<()> {
        if self.state != JobState::Polling {
            self.transition(JobState::Polling)?;
        }
        Ok(())
    }

    /// Records a status check made after `elapsed` of polling
    ///
    /// # Returns
    ///
    /// Returns the state after the check: `Ready`, `Failed` or still `Polling`.
    pub fn record_check(&mut self, status: ExportStatus, elapsed: Duration) -> Result<JobState> {
        if status.id != self.id {
            return Err(GeosyncError::transport(format!(
                "Status for export {} returned for job {}",
                status.id, self.id
            )));
        }
        let next = match status.phase() {
            ExportPhase::Ready => JobState::Ready,
            ExportPhase::Failed => JobState::Failed,
            ExportPhase::Processing => JobState::Polling,
        };
        self.transition(next)?;
        self.checks += 1;
        self.elapsed = elapsed;
        if status.created_at.is_some() {
            self.created_at = status.created_at;
        }
        self.last_status = Some(status);
        Ok(next)
    }

    /// Marks the polling budget as exhausted
    pub fn mark_timed_out(&mut self, elapsed: Duration) -> Result<()> {
        self.transition(JobState::TimedOut)?;
        self.elapsed = elapsed;
        Ok(())
    }

    /// Marks the artifact as stored at `path`
    pub fn mark_downloaded(&mut self, path: PathBuf) -> Result<()> {
        self.transition(JobState::Downloaded)?;
        self.artifact = Some(path);
        Ok(())
    }
}
