//! Sync coordinator - orchestrates one synchronization run
//!
//! Stages run strictly in order: retrieve, filter, synchronize the canonical
//! store, reconcile the target, advance the cursor. Each stage depends on the
//! committed output of the previous one. Nothing is retried inside a run.

use crate::adapters::geoprocessing::GeoprocessingEngine;
use crate::adapters::remote::{ChangesetFeed, ChangesetQuery, ExportRequest, ExportService};
use crate::config::{DatasetConfig, ServiceConfig};
use crate::core::export::{ExportJob, JobPoller, JobState};
use crate::core::filter::FilterReconciler;
use crate::core::pipeline::summary::SyncSummary;
use crate::core::retrieval::{self, Retrieved};
use crate::core::state::{CursorTracker, DatasetPaths};
use crate::core::sync::{StagingSynchronizer, TargetReconciler};
use crate::domain::timestamp::format_utc;
use crate::domain::{DatasetName, GeosyncError, JobId, Result};
use crate::{log_delta_counts, log_window};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Source of the run start time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What a run retrieves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Request, poll and download a full export
    Full,
    /// Download the changes since the cursor
    Changeset,
    /// Continue polling an export requested by an earlier invocation
    Resume(JobId),
    /// Run the full pipeline from a previously downloaded archive
    ReplayArchive(PathBuf),
    /// Run the changeset pipeline from a previously downloaded payload
    ReplayChangeset(PathBuf),
}

impl SyncMode {
    /// Short label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Changeset => "changeset",
            Self::Resume(_) => "resume",
            Self::ReplayArchive(_) => "replay-archive",
            Self::ReplayChangeset(_) => "replay-changeset",
        }
    }

    /// True when the mode talks to the remote service
    pub fn needs_network(&self) -> bool {
        matches!(self, Self::Full | Self::Changeset | Self::Resume(_))
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a run that did not fail
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Data was committed
    Completed(SyncSummary),
    /// Polling budget spent; the job can be resumed
    TimedOut {
        /// Identifier to pass to `resume`
        job_id: JobId,
    },
    /// The service reported the export as failed
    ExportFailed {
        /// Failed job
        job_id: JobId,
        /// State reported by the service
        state: String,
    },
}

impl SyncOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(_) | Self::TimedOut { .. } => 0,
            Self::ExportFailed { .. } => 4,
        }
    }
}

/// Sync coordinator for one dataset
pub struct SyncCoordinator {
    dataset: DatasetName,
    config: DatasetConfig,
    paths: DatasetPaths,
    engine: Arc<dyn GeoprocessingEngine>,
    export_service: Option<Arc<dyn ExportService>>,
    changeset_feed: Option<Arc<dyn ChangesetFeed>>,
    api_base_url: String,
    vector_format: String,
    base_dir: PathBuf,
    clock: Clock,
}

impl SyncCoordinator {
    /// Create a coordinator
    ///
    /// # Arguments
    ///
    /// * `dataset` - Dataset name, also the directory under `data_dir`
    /// * `config` - Dataset configuration
    /// * `data_dir` - Root of all dataset directories
    /// * `engine` - Geoprocessing engine holding the stores
    pub fn new(
        dataset: DatasetName,
        config: DatasetConfig,
        data_dir: &Path,
        engine: Arc<dyn GeoprocessingEngine>,
    ) -> Self {
        let service = ServiceConfig::default();
        Self {
            paths: DatasetPaths::new(data_dir, &dataset),
            dataset,
            config,
            engine,
            export_service: None,
            changeset_feed: None,
            api_base_url: service.api_base_url,
            vector_format: service.vector_format,
            base_dir: PathBuf::from("."),
            clock: Arc::new(Utc::now),
        }
    }

    /// Sets the export API client
    pub fn with_export_service(mut self, service: Arc<dyn ExportService>) -> Self {
        self.export_service = Some(service);
        self
    }

    /// Sets the changeset feed client
    pub fn with_changeset_feed(mut self, feed: Arc<dyn ChangesetFeed>) -> Self {
        self.changeset_feed = Some(feed);
        self
    }

    /// Takes the export request settings from the service section
    pub fn with_service_config(mut self, service: &ServiceConfig) -> Self {
        self.api_base_url = service.api_base_url.clone();
        self.vector_format = service.vector_format.clone();
        self
    }

    /// Replaces the clock that stamps the run start
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Directory that relative extent and target paths resolve against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Dataset directory layout
    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }

    /// Cursor of this dataset
    pub fn cursor(&self) -> CursorTracker {
        CursorTracker::for_dataset(&self.paths)
    }

    /// Execute one run
    ///
    /// This is the main entry point. It:
    /// 1. Resolves filters and checks required clients (no network yet)
    /// 2. Retrieves the artifact for the mode
    /// 3. Post-filters and commits it to the canonical store
    /// 4. Reconciles the target store, when configured
    /// 5. Advances the cursor (full, resume and changeset runs only)
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. The cursor is untouched on any error
    /// raised before the commit.
    pub async fn run(&self, mode: SyncMode) -> Result<SyncOutcome> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "sync",
            %run_id,
            dataset = %self.dataset,
            mode = mode.label()
        );
        self.execute(mode).instrument(span).await
    }

    async fn execute(&self, mode: SyncMode) -> Result<SyncOutcome> {
        let start_time = Instant::now();
        let run_started = (self.clock)();
        tracing::info!(started_at = %format_utc(&run_started), "Starting sync run");

        self.paths.ensure().await?;
        let filters = self.filters().await?;

        let mut outcome = match mode {
            SyncMode::Full => self.run_full(run_started, &filters).await?,
            SyncMode::Resume(job_id) => self.run_resume(job_id, run_started, &filters).await?,
            SyncMode::Changeset => self.run_changeset(run_started, &filters).await?,
            SyncMode::ReplayArchive(path) => {
                require_file(&path)?;
                let summary = self.commit_full("replay-archive", &path, &filters).await?;
                tracing::info!("Replay does not move the cursor");
                SyncOutcome::Completed(summary)
            }
            SyncMode::ReplayChangeset(path) => {
                require_file(&path)?;
                let retrieved =
                    retrieval::read_changeset(self.engine.as_ref(), &path, &self.config.id_field).await?;
                let summary = self
                    .commit_changeset("replay-changeset", retrieved, &filters)
                    .await?;
                tracing::info!("Replay does not move the cursor");
                SyncOutcome::Completed(summary)
            }
        };

        if let SyncOutcome::Completed(summary) = &mut outcome {
            summary.duration = start_time.elapsed();
            summary.log_summary();
        }
        Ok(outcome)
    }

    /// Resolves the request and post-filters
    ///
    /// The configured extent wins; otherwise the canonical store's extent
    /// slot is used.
    async fn filters(&self) -> Result<FilterReconciler> {
        let configured = self.config.extent_geometry(&self.base_dir)?;
        let extent = match configured {
            Some(extent) => Some(extent),
            None => {
                let store = self.paths.canonical_store();
                if self.engine.exists(&store).await? {
                    self.engine.read_extent(&store).await?
                } else {
                    None
                }
            }
        };
        FilterReconciler::from_config(&self.config, extent)
    }

    async fn run_full(&self, run_started: DateTime<Utc>, filters: &FilterReconciler) -> Result<SyncOutcome> {
        let poller = self.poller()?;
        let layer = self.config.layer()?;
        let extent = filters.export_extent(self.engine.as_ref())?;
        let request = ExportRequest::new(
            &self.api_base_url,
            &layer,
            self.config.wkid,
            &self.vector_format,
            extent,
        );

        let mut job = poller.request(&request, run_started).await?;
        self.finish_export("full", &poller, &mut job, run_started, filters)
            .await
    }

    async fn run_resume(
        &self,
        job_id: JobId,
        run_started: DateTime<Utc>,
        filters: &FilterReconciler,
    ) -> Result<SyncOutcome> {
        let poller = self.poller()?;
        let mut job = poller.resume(job_id);
        self.finish_export("resume", &poller, &mut job, run_started, filters)
            .await
    }

    /// Polls, downloads, commits and advances the cursor to the run start
    async fn finish_export(
        &self,
        mode: &str,
        poller: &JobPoller,
        job: &mut ExportJob,
        run_started: DateTime<Utc>,
        filters: &FilterReconciler,
    ) -> Result<SyncOutcome> {
        match poller.poll(job).await? {
            JobState::Ready => {}
            JobState::TimedOut => {
                return Ok(SyncOutcome::TimedOut {
                    job_id: job.id().clone(),
                })
            }
            _ => {
                let state = job
                    .last_status()
                    .map(|s| s.state.clone())
                    .unwrap_or_else(|| "failed".to_string());
                return Ok(SyncOutcome::ExportFailed {
                    job_id: job.id().clone(),
                    state,
                });
            }
        }

        let layer = self.config.layer()?;
        let archive = self.paths.archive_file(&layer, &run_started);
        poller.download(job, &archive).await?;

        let mut summary = self.commit_full(mode, &archive, filters).await?;

        if let Some(created_at) = job.created_at() {
            tracing::debug!(job_id = %job.id(), created_at = %format_utc(&created_at), "Export creation time reported");
        }
        self.cursor().advance(run_started).await?;
        summary.cursor_advanced_to = Some(run_started);
        Ok(SyncOutcome::Completed(summary))
    }

    async fn run_changeset(&self, run_started: DateTime<Utc>, filters: &FilterReconciler) -> Result<SyncOutcome> {
        let feed = self.changeset_feed.clone().ok_or_else(|| {
            GeosyncError::Configuration("Changeset retrieval needs a feed client".to_string())
        })?;
        let layer = self.config.layer()?;
        let cursor = self.cursor();
        let window = cursor.window_for_changeset(run_started).await?;
        log_window!(format_utc(&window.from), format_utc(&window.to));

        let query = ChangesetQuery {
            layer: layer.clone(),
            wkid: self.config.wkid,
            from: window.from,
            to: window.to,
            constraint: filters.request_filter(),
        };
        let dest = self.paths.changeset_file(&layer, &run_started);
        let retrieved = retrieval::retrieve_changeset(
            feed.as_ref(),
            self.engine.as_ref(),
            &query,
            &dest,
            &self.config.id_field,
        )
        .await
        .inspect_err(|e| {
            tracing::error!(
                error = %e,
                from = %format_utc(&window.from),
                to = %format_utc(&window.to),
                "Changeset retrieval failed; cursor not advanced"
            );
        })?;

        let mut summary = self.commit_changeset("changeset", retrieved, filters).await?;
        summary.window = Some(window);

        cursor.advance(window.to).await?;
        summary.cursor_advanced_to = Some(window.to);
        Ok(SyncOutcome::Completed(summary))
    }

    /// Reads an archive and replaces the canonical store with it
    async fn commit_full(&self, mode: &str, archive: &Path, filters: &FilterReconciler) -> Result<SyncSummary> {
        let retrieved =
            retrieval::retrieve_full(self.engine.as_ref(), archive, &self.config.id_field).await?;
        let (features, filtered) = filters.post_filter_full(self.engine.as_ref(), retrieved.features);

        let staging = self.staging();
        staging.ensure_store(filters.extent()).await?;
        let delta = staging.replace_all(features).await?;
        log_delta_counts!(&delta);

        let mut summary = SyncSummary::new(mode);
        summary.record_delta(&delta);
        summary.filtered = filtered;
        summary.artifact = Some(retrieved.artifact.path);
        summary.digest = Some(retrieved.digest);
        summary.canonical_rows = self.engine.count(staging.store()).await?;

        if let Some(target) = self.target() {
            summary.target = Some(target.replace_all(staging.store()).await?);
        }
        Ok(summary)
    }

    /// Classifies, post-filters and applies a changeset
    ///
    /// An empty changeset is a successful no-op commit.
    async fn commit_changeset(
        &self,
        mode: &str,
        retrieved: Retrieved,
        filters: &FilterReconciler,
    ) -> Result<SyncSummary> {
        let mut summary = SyncSummary::new(mode);
        summary.artifact = Some(retrieved.artifact.path.clone());
        summary.digest = Some(retrieved.digest.clone());

        let staging = self.staging();
        if retrieved.is_empty() {
            tracing::info!("No changes in window; nothing to commit");
            summary.canonical_rows = self.engine.count(staging.store()).await.unwrap_or(0);
            return Ok(summary);
        }

        let mut delta = staging.classify(retrieved.features).await?;
        summary.filtered = filters.post_filter_delta(self.engine.as_ref(), &mut delta);
        log_delta_counts!(&delta);

        let report = staging.apply_changeset(&delta).await?;
        summary.record_delta(&delta);
        summary.canonical_rows = report.after;

        if let Some(target) = self.target() {
            summary.target = Some(target.delete_then_upsert(&delta).await?);
        }
        Ok(summary)
    }

    fn poller(&self) -> Result<JobPoller> {
        let service = self.export_service.clone().ok_or_else(|| {
            GeosyncError::Configuration("Full retrieval needs an export API client".to_string())
        })?;
        Ok(JobPoller::new(
            service,
            self.config.poll_interval(),
            self.config.max_polling_time(),
        ))
    }

    fn staging(&self) -> StagingSynchronizer {
        StagingSynchronizer::new(
            self.engine.clone(),
            self.paths.canonical_store(),
            self.config.id_field.clone(),
        )
    }

    fn target(&self) -> Option<TargetReconciler> {
        self.config.target.as_ref().map(|target| {
            TargetReconciler::from_config(
                self.engine.clone(),
                target,
                &self.config.id_field,
                &self.base_dir,
            )
        })
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(GeosyncError::Precondition(format!(
            "Replay file {} does not exist",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_labels() {
        assert_eq!(SyncMode::Full.to_string(), "full");
        assert_eq!(SyncMode::ReplayChangeset(PathBuf::from("a.json")).label(), "replay-changeset");
        assert!(SyncMode::Resume(JobId::new("1").unwrap()).needs_network());
        assert!(!SyncMode::ReplayArchive(PathBuf::from("a.zip")).needs_network());
    }

    #[test]
    fn test_outcome_exit_codes() {
        let job_id = JobId::new("901").unwrap();
        assert_eq!(SyncOutcome::TimedOut { job_id: job_id.clone() }.exit_code(), 0);
        assert_eq!(
            SyncOutcome::ExportFailed {
                job_id,
                state: "error".to_string()
            }
            .exit_code(),
            4
        );
    }
}
