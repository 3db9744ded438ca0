//! Core business logic for geosync.
//!
//! This module contains the synchronization pipeline and its stages.
//!
//! # Modules
//!
//! - [`state`] - Dataset directory layout and the changeset cursor
//! - [`export`] - Export job state machine and poller
//! - [`retrieval`] - Artifact download, payload sniffing and conversion
//! - [`filter`] - Request-time filters and the corrective post-filter
//! - [`sync`] - Canonical store and target store synchronization
//! - [`pipeline`] - Run orchestration and summaries
//! - [`retention`] - Purging old artifacts
//!
//! # Sync Workflow
//!
//! A run goes through these stages in order:
//!
//! 1. **Window**: Read the cursor (changeset) or request an export (full)
//! 2. **Retrieve**: Download the changeset or poll and download the export
//! 3. **Filter**: Drop or delete records outside the extent or local filter
//! 4. **Synchronize**: Replace or incrementally update the canonical store
//! 5. **Reconcile**: Mirror the result into the target store, if configured
//! 6. **Advance**: Move the cursor to the window end
//!
//! # Example
//!
//! ```rust,no_run
//! use geosync::adapters::geoprocessing::LocalEngine;
//! use geosync::adapters::remote::DataServiceClient;
//! use geosync::config::load_config;
//! use geosync::core::pipeline::{SyncCoordinator, SyncMode, SyncOutcome};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("geosync.toml")?;
//! let (name, dataset) = config.dataset("roads")?;
//! let client = Arc::new(DataServiceClient::new(&config.service)?);
//!
//! let coordinator = SyncCoordinator::new(
//!     name,
//!     dataset.clone(),
//!     &config.storage.data_dir,
//!     Arc::new(LocalEngine::new()),
//! )
//! .with_service_config(&config.service)
//! .with_export_service(client.clone())
//! .with_changeset_feed(client);
//!
//! if let SyncOutcome::Completed(summary) = coordinator.run(SyncMode::Changeset).await? {
//!     println!("Added: {}", summary.added);
//!     println!("Deleted: {}", summary.deleted);
//! }
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod filter;
pub mod pipeline;
pub mod retention;
pub mod retrieval;
pub mod state;
pub mod sync;
