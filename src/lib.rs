// geosync - Layer Synchronization Tool
// Copyright (c) 2025 Geosync Contributors
// Licensed under the MIT License

//! # geosync - layer synchronization
//!
//! geosync keeps a local copy of a remote vector layer in step with the
//! publishing service. It takes complete snapshots through the asynchronous
//! export API and applies incremental changesets from the feature feed in
//! between.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Exporting** full snapshots through a request / poll / download job
//! - **Fetching** changesets for the window since the last sync
//! - **Filtering** records by extent polygon and attribute where clause
//! - **Synchronizing** a canonical local store and an optional target store
//! - **Tracking** the changeset cursor per dataset
//!
//! ## Architecture
//!
//! geosync follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (cursor, export, retrieval, filter, sync, pipeline)
//! - [`adapters`] - External integrations (data service, geoprocessing engine)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geosync::adapters::geoprocessing::LocalEngine;
//! use geosync::adapters::remote::DataServiceClient;
//! use geosync::config::GeosyncConfig;
//! use geosync::core::pipeline::{SyncCoordinator, SyncMode, SyncOutcome};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeosyncConfig::from_file("geosync.toml")?;
//!     let (name, dataset) = config.dataset("parcels")?;
//!     let client = Arc::new(DataServiceClient::new(&config.service)?);
//!
//!     let coordinator = SyncCoordinator::new(
//!         name,
//!         dataset.clone(),
//!         &config.storage.data_dir,
//!         Arc::new(LocalEngine::new()),
//!     )
//!     .with_service_config(&config.service)
//!     .with_export_service(client);
//!
//!     match coordinator.run(SyncMode::Full).await? {
//!         SyncOutcome::Completed(summary) => println!("Loaded {} records", summary.added),
//!         SyncOutcome::TimedOut { job_id } => println!("Resume later with job {job_id}"),
//!         SyncOutcome::ExportFailed { job_id, state } => println!("Job {job_id}: {state}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! ### Changeset Cursor
//!
//! Each dataset keeps a `last_updated.json` cursor. A changeset run asks for
//! the window `[cursor, now)` and moves the cursor to the window end only
//! after the canonical store has been committed:
//!
//! ```rust,no_run
//! use geosync::core::state::CursorTracker;
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cursor = CursorTracker::new("data/parcels/last_updated.json");
//! let window = cursor.window_for_changeset(Utc::now()).await?;
//! println!("Fetching changes in {window}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Local Filters
//!
//! Records are post-filtered with a small where-clause dialect evaluated
//! against feature attributes:
//!
//! ```rust
//! use geosync::adapters::geoprocessing::LocalFilter;
//! use serde_json::json;
//!
//! let filter = LocalFilter::parse("status = 'current' AND area > 10").unwrap();
//! let props = json!({"status": "current", "area": 12.5});
//! assert!(filter.matches(props.as_object().unwrap()));
//! ```
//!
//! ## Error Handling
//!
//! geosync uses the [`domain::GeosyncError`] type for all errors. Each
//! variant maps to a process exit code:
//!
//! ```rust,no_run
//! use geosync::domain::GeosyncError;
//!
//! fn example() -> Result<(), GeosyncError> {
//!     let _config = geosync::config::GeosyncConfig::from_file("geosync.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! geosync uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(dataset = "parcels", "Starting sync");
//! warn!(job_id = "901", "Polling budget exhausted");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
