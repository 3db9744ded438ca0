//! Configuration management for geosync.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! geosync uses one TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `GEOSYNC_*` environment overrides
//! - Default values for optional settings
//! - Validation before any network call
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geosync::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("geosync.toml")?;
//!
//! println!("Data directory: {}", config.storage.data_dir.display());
//! for (name, dataset) in &config.datasets {
//!     println!("{name}: layer {} keyed on {}", dataset.layer_id, dataset.id_field);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`ServiceConfig`] - Remote service endpoints, API key, proxies
//! - [`StorageConfig`] - Local data directory
//! - [`LoggingConfig`] - Log file settings
//! - [`DatasetConfig`] - One block per synchronized dataset, with an optional [`TargetConfig`]
//!
//! # Example Configuration
//!
//! ```toml
//! [service]
//! api_key = "${LINZ_API_KEY}"
//!
//! [datasets.parcels]
//! layer_id = "50772"
//! id_field = "id"
//! remote_filter = "land_district='Otago'"
//! local_filter = "land_district = 'Otago'"
//!
//! [datasets.parcels.target]
//! location = "/srv/gis/parcels.geojson"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, SAMPLE_CONFIG};
pub use schema::{
    ApplicationConfig, DatasetConfig, GeosyncConfig, LoggingConfig, ServiceConfig, StorageConfig,
    TargetConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
