//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the geosync configuration file.

use crate::config::load_config;
use crate::core::filter::FilterReconciler;
use clap::Args;
use std::path::Path;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also validates
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Extents and filters are parsed the way a run parses them
        for (name, dataset) in &config.datasets {
            let resolved = dataset
                .extent_geometry(Path::new("."))
                .and_then(|extent| FilterReconciler::from_config(dataset, extent));
            if let Err(e) = resolved {
                println!("❌ datasets.{name}: {e}");
                return Ok(2);
            }
        }

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Export API: {}", config.service.api_base_url);
        println!("  Changeset Feed: {}", config.service.feed_url);
        println!(
            "  API Key: {}",
            if config.service.api_key.is_some() {
                "set"
            } else {
                "not set (full, changeset and resume will fail)"
            }
        );
        println!("  Data Directory: {}", config.storage.data_dir.display());
        for (name, dataset) in &config.datasets {
            println!(
                "  Dataset {name}: layer {}, id field '{}', EPSG:{}{}",
                dataset.layer_id,
                dataset.id_field,
                dataset.wkid,
                if dataset.target.is_some() { ", with target" } else { "" }
            );
        }

        let warnings = config.warnings();
        if !warnings.is_empty() {
            println!();
            for warning in &warnings {
                println!("⚠️  {warning}");
            }
        }
        println!();
        Ok(0)
    }
}
