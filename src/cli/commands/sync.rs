//! Sync command implementations
//!
//! This module implements the `full`, `changeset`, `resume` and `replay`
//! commands. All four build a [`SyncCoordinator`] for one dataset and differ
//! only in the [`SyncMode`] they run.

use crate::adapters::geoprocessing::{GeoprocessingEngine, LocalEngine};
use crate::adapters::remote::DataServiceClient;
use crate::config::load_config;
use crate::core::pipeline::{SyncCoordinator, SyncMode, SyncOutcome, SyncSummary};
use crate::core::retention;
use crate::domain::timestamp::format_utc;
use crate::domain::{GeosyncError, JobId};
use clap::{ArgGroup, Args};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments shared by every sync command
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Dataset name from the configuration file
    pub dataset: String,

    /// Delete old archives and changeset payloads after the run
    #[arg(long)]
    pub purge: bool,

    /// Number of files of each kind kept by --purge, 0 skips the purge (overrides retain_after_purge)
    #[arg(long, value_name = "N", requires = "purge")]
    pub retain: Option<usize>,
}

/// Arguments for the resume command
#[derive(Args, Debug, Clone)]
pub struct ResumeArgs {
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Export job identifier logged by the run that requested it
    pub job_id: String,
}

/// Arguments for the replay command
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["archive", "changeset"])))]
pub struct ReplayArgs {
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Export archive (.zip) to run the full pipeline from
    #[arg(long, value_name = "ZIP")]
    pub archive: Option<PathBuf>,

    /// Changeset payload (.json) to run the changeset pipeline from
    #[arg(long, value_name = "JSON")]
    pub changeset: Option<PathBuf>,
}

impl SyncArgs {
    /// Execute a full retrieval
    pub async fn execute_full(&self, config_path: &str) -> anyhow::Result<i32> {
        run_sync(config_path, self, SyncMode::Full).await
    }

    /// Execute a changeset retrieval
    pub async fn execute_changeset(&self, config_path: &str) -> anyhow::Result<i32> {
        run_sync(config_path, self, SyncMode::Changeset).await
    }
}

impl ResumeArgs {
    /// Execute the resume command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let job_id: JobId = self
            .job_id
            .parse()
            .map_err(|e| GeosyncError::Configuration(format!("Invalid job id: {e}")))?;
        run_sync(config_path, &self.sync, SyncMode::Resume(job_id)).await
    }
}

impl ReplayArgs {
    /// Mode selected by the source flag
    pub fn mode(&self) -> Result<SyncMode, GeosyncError> {
        match (&self.archive, &self.changeset) {
            (Some(archive), None) => Ok(SyncMode::ReplayArchive(archive.clone())),
            (None, Some(changeset)) => Ok(SyncMode::ReplayChangeset(changeset.clone())),
            _ => Err(GeosyncError::Configuration(
                "Pass exactly one of --archive or --changeset".to_string(),
            )),
        }
    }

    /// Execute the replay command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        run_sync(config_path, &self.sync, self.mode()?).await
    }
}

/// Runs one mode against one dataset and reports the outcome
async fn run_sync(config_path: &str, args: &SyncArgs, mode: SyncMode) -> anyhow::Result<i32> {
    tracing::info!(dataset = %args.dataset, mode = %mode, "Starting sync command");

    let config = load_config(config_path)?;
    let (name, dataset) = config.dataset(&args.dataset)?;
    let engine: Arc<dyn GeoprocessingEngine> = Arc::new(LocalEngine::new());

    let mut coordinator =
        SyncCoordinator::new(name, dataset.clone(), &config.storage.data_dir, engine)
            .with_service_config(&config.service);

    // Credentials are checked here, before any request is made
    if mode.needs_network() {
        let client = Arc::new(DataServiceClient::new(&config.service)?);
        coordinator = coordinator
            .with_export_service(client.clone())
            .with_changeset_feed(client);
    }

    let outcome = coordinator.run(mode).await?;
    print_outcome(&args.dataset, &outcome);

    if args.purge {
        let retain = args.retain.unwrap_or(dataset.retain_after_purge);
        let report = retention::purge(coordinator.paths(), retain).await?;
        if retain == 0 {
            println!("🧹 Retention count is 0, purge skipped");
        } else {
            println!(
                "🧹 Purged {} file(s), kept the newest {retain} of each kind",
                report.removed.len()
            );
        }
        if !report.failed.is_empty() {
            println!("⚠️  {} file(s) could not be deleted", report.failed.len());
        }
    }

    Ok(outcome.exit_code())
}

fn print_outcome(dataset: &str, outcome: &SyncOutcome) {
    println!();
    match outcome {
        SyncOutcome::Completed(summary) => print_summary(summary),
        SyncOutcome::TimedOut { job_id } => {
            println!("⏳ Export {job_id} is still being prepared by the service.");
            println!("   Resume later with: geosync resume {dataset} {job_id}");
        }
        SyncOutcome::ExportFailed { job_id, state } => {
            println!("❌ Export {job_id} failed on the service (state: {state})");
        }
    }
    println!();
}

fn print_summary(summary: &SyncSummary) {
    println!("📊 Sync Summary ({}):", summary.mode);
    if let Some(window) = &summary.window {
        println!("  Window: {window}");
    }
    println!("  Added: {}", summary.added);
    println!("  Updated: {}", summary.updated);
    println!("  Deleted: {}", summary.deleted);
    println!("  Filtered: {}", summary.filtered);
    println!("  Canonical rows: {}", summary.canonical_rows);
    if let Some(target) = &summary.target {
        println!("  Target: {} deleted, {} written", target.deleted, target.written);
    }
    if let Some(artifact) = &summary.artifact {
        println!("  Artifact: {}", artifact.display());
    }
    if let Some(digest) = &summary.digest {
        println!("  SHA-256: {digest}");
    }
    match summary.cursor_advanced_to {
        Some(cursor) => println!("  Cursor: {}", format_utc(&cursor)),
        None => println!("  Cursor: unchanged"),
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
}
