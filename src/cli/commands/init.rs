//! Init command implementation
//!
//! This module implements the `init` command: it optionally writes a sample
//! configuration file, then prepares the directory layout, the canonical
//! store and the cursor of one or every configured dataset.

use crate::adapters::geoprocessing::{GeoprocessingEngine, LocalEngine};
use crate::config::schema::parse_extent;
use crate::config::{load_config, DatasetConfig, SAMPLE_CONFIG};
use crate::core::state::{CursorTracker, DatasetPaths};
use crate::core::sync::StagingSynchronizer;
use crate::domain::{DatasetName, Geometry, GeosyncError, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Dataset to initialise; every configured dataset when omitted
    pub dataset: Option<String>,

    /// GeoJSON polygon stored in the canonical store's extent slot
    #[arg(long, value_name = "GEOJSON")]
    pub extent_file: Option<PathBuf>,

    /// Write a sample configuration file first
    #[arg(long)]
    pub write_config: bool,

    /// Overwrite an existing configuration file with --write-config
    #[arg(long, requires = "write_config")]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Initializing");

        println!("📝 Initializing geosync");
        println!();

        if self.write_config {
            if Path::new(config_path).exists() && !self.force {
                println!("❌ Configuration file already exists: {config_path}");
                println!("   Use --force to overwrite");
                return Ok(2);
            }
            std::fs::write(config_path, SAMPLE_CONFIG)?;
            println!("✅ Configuration file created: {config_path}");
            if self.dataset.is_none() {
                println!();
                println!("Next steps:");
                println!("  1. Edit {config_path} with your datasets");
                println!("  2. Set GEOSYNC_SERVICE_API_KEY in the environment or a .env file");
                println!("  3. Validate configuration: geosync validate-config");
                println!("  4. Initialise a dataset: geosync init <dataset>");
                println!("  5. Run a full retrieval: geosync full <dataset>");
                println!();
                return Ok(0);
            }
        }

        let config = load_config(config_path)?;
        let names: Vec<String> = match &self.dataset {
            Some(name) => vec![name.clone()],
            None => config.datasets.keys().cloned().collect(),
        };
        if names.is_empty() {
            println!("No datasets configured in {config_path}.");
            return Ok(0);
        }
        if self.extent_file.is_some() && names.len() > 1 {
            return Err(GeosyncError::Configuration(
                "--extent-file needs a dataset name".to_string(),
            )
            .into());
        }

        let engine: Arc<dyn GeoprocessingEngine> = Arc::new(LocalEngine::new());
        for requested in &names {
            let (name, dataset) = config.dataset(requested)?;
            let extent = match &self.extent_file {
                Some(file) => Some(read_extent_file(file)?),
                None => dataset.extent_geometry(Path::new("."))?,
            };
            let seeded =
                init_dataset(engine.clone(), &config.storage.data_dir, &name, dataset, extent.as_ref())
                    .await?;
            println!(
                "✅ {name}: ready at {} ({})",
                DatasetPaths::new(&config.storage.data_dir, &name).root().display(),
                if seeded { "cursor seeded" } else { "cursor kept" }
            );
        }
        println!();
        Ok(0)
    }
}

/// Creates the layout, canonical store and cursor of one dataset
///
/// An existing canonical store keeps its rows; a given extent replaces its
/// extent slot. An existing cursor is left alone.
///
/// # Returns
///
/// Returns `true` when the cursor was seeded by this call.
pub async fn init_dataset(
    engine: Arc<dyn GeoprocessingEngine>,
    data_dir: &Path,
    name: &DatasetName,
    dataset: &DatasetConfig,
    extent: Option<&Geometry>,
) -> Result<bool> {
    let paths = DatasetPaths::new(data_dir, name);
    paths.ensure().await?;

    let staging = StagingSynchronizer::new(engine.clone(), paths.canonical_store(), dataset.id_field.clone());
    let created = staging.ensure_store(extent).await?;
    if !created && extent.is_some() {
        engine.write_extent(staging.store(), extent).await?;
        tracing::info!(store = %staging.store(), "Extent slot replaced");
    }

    CursorTracker::for_dataset(&paths).seed_now().await
}

fn read_extent_file(path: &Path) -> Result<Geometry> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        GeosyncError::Configuration(format!(
            "Failed to read extent file {}: {e}",
            path.display()
        ))
    })?;
    parse_extent(&text)
}
