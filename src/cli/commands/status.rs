//! Status command implementation
//!
//! This module implements the `status` command for displaying each
//! dataset's cursor and canonical store size.

use crate::adapters::geoprocessing::{GeoprocessingEngine, LocalEngine};
use crate::config::{load_config, GeosyncConfig};
use crate::core::state::{CursorTracker, DatasetPaths};
use crate::domain::timestamp::format_utc;
use crate::domain::Result;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this dataset
    pub dataset: Option<String>,
}

/// State of one dataset on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetStatus {
    /// Configured dataset name
    pub name: String,
    /// Cursor value, when a cursor file exists
    pub cursor: Option<String>,
    /// Canonical store row count, when the store exists
    pub rows: Option<usize>,
    /// True when a target store is configured
    pub has_target: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking dataset status");

        println!("📊 Dataset Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(2); // Configuration error exit code
            }
        };

        let statuses = match collect_status(&config, self.dataset.as_deref()).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to read dataset state");
                println!("   Error: {}", e);
                return Ok(e.exit_code());
            }
        };

        if statuses.is_empty() {
            println!("No datasets configured.");
            return Ok(0);
        }

        println!(
            "{:<24} {:<28} {:<12} {:<8}",
            "Dataset", "Cursor", "Rows", "Target"
        );
        println!("{}", "-".repeat(76));
        for status in &statuses {
            println!(
                "{:<24} {:<28} {:<12} {:<8}",
                status.name,
                status.cursor.as_deref().unwrap_or("none"),
                status
                    .rows
                    .map_or_else(|| "no store".to_string(), |r| r.to_string()),
                if status.has_target { "yes" } else { "no" }
            );
        }
        println!();
        if statuses.iter().any(|s| s.cursor.is_none()) {
            println!("Datasets without a cursor need 'geosync full <dataset>' first.");
        }
        Ok(0)
    }
}

/// Reads the cursor and canonical store size of the selected datasets
pub async fn collect_status(config: &GeosyncConfig, only: Option<&str>) -> Result<Vec<DatasetStatus>> {
    let engine = LocalEngine::new();
    let names: Vec<String> = match only {
        Some(name) => vec![name.to_string()],
        None => config.datasets.keys().cloned().collect(),
    };

    let mut statuses = Vec::with_capacity(names.len());
    for requested in names {
        let (name, dataset) = config.dataset(&requested)?;
        let paths = DatasetPaths::new(&config.storage.data_dir, &name);
        let cursor = CursorTracker::for_dataset(&paths)
            .read()
            .await?
            .map(|c| format_utc(&c));
        let store = paths.canonical_store();
        let rows = if engine.exists(&store).await? {
            Some(engine.count(&store).await?)
        } else {
            None
        };
        statuses.push(DatasetStatus {
            name: requested,
            cursor,
            rows,
            has_target: dataset.target.is_some(),
        });
    }
    Ok(statuses)
}
