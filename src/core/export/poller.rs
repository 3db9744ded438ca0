//! Export job requester and poller
//!
//! Drives an [`ExportJob`] through its states against an [`ExportService`].
//! Polling suspends the calling task between status checks and gives up after
//! the configured budget without cancelling the remote job.

use crate::adapters::remote::{ExportRequest, ExportService};
use crate::core::export::job::{ExportJob, JobState};
use crate::domain::{GeosyncError, JobId, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Requests, polls and downloads export jobs
pub struct JobPoller {
    service: Arc<dyn ExportService>,
    poll_interval: Duration,
    max_polling_time: Duration,
}

impl JobPoller {
    /// Creates a poller
    ///
    /// # Arguments
    ///
    /// * `service` - Export protocol implementation
    /// * `poll_interval` - Pause between status checks
    /// * `max_polling_time` - Budget after which polling reports a timeout
    pub fn new(
        service: Arc<dyn ExportService>,
        poll_interval: Duration,
        max_polling_time: Duration,
    ) -> Self {
        Self {
            service,
            poll_interval,
            max_polling_time,
        }
    }

    /// Validates and creates an export job
    ///
    /// The job identifier is logged at INFO: it is the only way to resume
    /// polling from a later invocation.
    pub async fn request(&self, request: &ExportRequest, now: DateTime<Utc>) -> Result<ExportJob> {
        self.service.validate_export(request).await?;
        let status = self.service.create_export(request).await?;

        let mut job = ExportJob::new(status.id.clone());
        job.mark_requested(status, now)?;
        tracing::info!(
            job_id = %job.id(),
            "Export job created; resume with `geosync resume <dataset> {}` if this run stops",
            job.id()
        );
        Ok(job)
    }

    /// Reconstructs a job from its identifier
    pub fn resume(&self, id: JobId) -> ExportJob {
        tracing::info!(job_id = %id, "Resuming export job");
        ExportJob::new(id)
    }

    /// Polls until the job is ready, failed, or the budget is spent
    ///
    /// Status checks happen at 0, I, 2I, ... while less than the budget has
    /// elapsed, so a timeout takes between `floor(T/I)` and `ceil(T/I)` checks.
    ///
    /// # Returns
    ///
    /// Returns `Ready`, `Failed` or `TimedOut`.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error when a status check itself fails.
    pub async fn poll(&self, job: &mut ExportJob) -> Result<JobState> {
        job.start_polling()?;
        tracing::info!(
            job_id = %job.id(),
            poll_interval_secs = self.poll_interval.as_secs(),
            max_polling_time_secs = self.max_polling_time.as_secs(),
            "Polling export job"
        );

        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.max_polling_time {
                job.mark_timed_out(elapsed)?;
                tracing::warn!(
                    job_id = %job.id(),
                    checks = job.checks(),
                    "Polling budget exhausted; the export keeps running on the service. Resume with `geosync resume <dataset> {}`",
                    job.id()
                );
                return Ok(JobState::TimedOut);
            }

            let status = self.service.export_status(job.id()).await?;
            let state = job.record_check(status, started.elapsed())?;
            let progress = job.last_status().and_then(|s| s.progress);
            match state {
                JobState::Ready => {
                    tracing::info!(job_id = %job.id(), checks = job.checks(), "Export ready");
                    return Ok(state);
                }
                JobState::Failed => {
                    let remote_state = job.last_status().map(|s| s.state.clone()).unwrap_or_default();
                    tracing::error!(job_id = %job.id(), state = %remote_state, "Export failed on the service");
                    return Ok(state);
                }
                _ => {
                    tracing::debug!(job_id = %job.id(), attempt = job.checks(), ?progress, "Export still processing");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Streams the artifact of a ready job to `dest`
    ///
    /// # Returns
    ///
    /// Returns the number of bytes written.
    pub async fn download(&self, job: &mut ExportJob, dest: &Path) -> Result<u64> {
        let status = match (job.state(), job.last_status()) {
            (JobState::Ready, Some(status)) => status.clone(),
            (state, _) => {
                return Err(GeosyncError::Precondition(format!(
                    "Export job {} is {state:?}, not ready for download",
                    job.id()
                )))
            }
        };
        let bytes = self.service.download_export(&status, dest).await?;
        job.mark_downloaded(dest.to_path_buf())?;
        tracing::info!(job_id = %job.id(), path = %dest.display(), bytes, "Export downloaded");
        Ok(bytes)
    }
}
