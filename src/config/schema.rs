//! Configuration schema types
//!
//! This module defines the configuration structure for geosync. Every section
//! has defaults except `[service]` credentials and the per-dataset identity
//! settings, which must be supplied by the operator.

use crate::adapters::geoprocessing::LocalFilter;
use crate::config::SecretString;
use crate::domain::{BoundingBox, DatasetName, Geometry, GeosyncError, LayerId, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main geosync configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeosyncConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Remote data service endpoints and credentials
    #[serde(default)]
    pub service: ServiceConfig,

    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Synchronized datasets keyed by operator-facing name
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,
}

impl GeosyncConfig {
    /// Loads and validates a configuration file
    ///
    /// Shorthand for [`crate::config::load_config`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        crate::config::load_config(path)
    }

    /// Validates the configuration
    ///
    /// Credentials are not checked here: `init`, `status` and local replays
    /// run without them. See [`ServiceConfig::require_api_key`].
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.application.validate()?;
        self.service.validate()?;
        self.logging.validate()?;

        let mut slugs = BTreeMap::new();
        for (name, dataset) in &self.datasets {
            let slug = DatasetName::new(name)?;
            if let Some(other) = slugs.insert(slug.clone(), name) {
                return Err(format!(
                    "Datasets '{other}' and '{name}' both map to directory '{slug}'"
                ));
            }
            dataset
                .validate()
                .map_err(|e| format!("datasets.{name}: {e}"))?;
        }
        Ok(())
    }

    /// Non-fatal configuration findings, one line each
    pub fn warnings(&self) -> Vec<String> {
        self.datasets
            .iter()
            .flat_map(|(name, dataset)| {
                dataset
                    .warnings()
                    .into_iter()
                    .map(move |w| format!("datasets.{name}: {w}"))
            })
            .collect()
    }

    /// Looks up a dataset by its configured name or by its directory slug
    ///
    /// # Errors
    ///
    /// Returns a configuration error listing the known datasets when the name
    /// does not match any of them.
    pub fn dataset(&self, name: &str) -> Result<(DatasetName, &DatasetConfig)> {
        if let Some(dataset) = self.datasets.get(name) {
            return Ok((DatasetName::new(name).map_err(GeosyncError::Configuration)?, dataset));
        }
        let wanted = DatasetName::new(name).map_err(GeosyncError::Configuration)?;
        for (key, dataset) in &self.datasets {
            if DatasetName::new(key).is_ok_and(|slug| slug == wanted) {
                return Ok((wanted, dataset));
            }
        }
        Err(GeosyncError::Configuration(format!(
            "Unknown dataset '{name}'. Configured datasets: {}",
            self.datasets.keys().cloned().collect::<Vec<_>>().join(", ")
        )))
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Remote data service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the service REST API; `exports/` and `layers/<id>/` hang off it
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// URL of the WFS endpoint serving changesets
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// API key sent as `Authorization: key <api_key>`
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Optional HTTP proxy URL
    #[serde(default)]
    pub http_proxy: Option<String>,

    /// Optional HTTPS proxy URL
    #[serde(default)]
    pub https_proxy: Option<String>,

    /// Vector format requested for full exports
    #[serde(default = "default_vector_format")]
    pub vector_format: String,
}

impl ServiceConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        for (key, value) in [
            ("service.api_base_url", &self.api_base_url),
            ("service.feed_url", &self.feed_url),
        ] {
            url::Url::parse(value).map_err(|e| format!("{key} is not a valid URL: {e}"))?;
        }
        for (key, value) in [
            ("service.http_proxy", &self.http_proxy),
            ("service.https_proxy", &self.https_proxy),
        ] {
            if let Some(proxy) = value.as_deref().filter(|p| !p.trim().is_empty()) {
                url::Url::parse(proxy).map_err(|e| format!("{key} is not a valid URL: {e}"))?;
            }
        }
        if self.timeout_seconds == 0 {
            return Err("service.timeout_seconds must be > 0".to_string());
        }
        if self.vector_format.trim().is_empty() {
            return Err("service.vector_format cannot be empty".to_string());
        }
        Ok(())
    }

    /// Returns the API key, failing when it is missing or blank
    ///
    /// Called before any network call so a missing credential aborts the run
    /// without touching the service.
    pub fn require_api_key(&self) -> Result<&SecretString> {
        use secrecy::ExposeSecret;

        match &self.api_key {
            Some(key) if !key.expose_secret().as_str().trim().is_empty() => Ok(key),
            _ => Err(GeosyncError::Configuration(
                "No API key configured. Set service.api_key or GEOSYNC_SERVICE_API_KEY".to_string(),
            )),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            feed_url: default_feed_url(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            http_proxy: None,
            https_proxy: None,
            vector_format: default_vector_format(),
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per dataset
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable JSON file logging next to console output
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Log directory; empty means `<data_dir>/<dataset>/logs`
    #[serde(default)]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: String::new(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// Per-dataset configuration
///
/// Immutable for the duration of a run and read-only to the sync core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Remote layer identifier
    pub layer_id: String,

    /// Attribute that uniquely identifies a record
    pub id_field: String,

    /// Coordinate reference id used for requests and stores
    #[serde(default = "default_wkid")]
    pub wkid: u32,

    /// Attribute filter in the service's query language (CQL)
    #[serde(default)]
    pub remote_filter: Option<String>,

    /// Attribute filter evaluated locally against the canonical store
    #[serde(default)]
    pub local_filter: Option<String>,

    /// Explicit request bounding box `minx,miny,maxx,maxy` for changesets
    #[serde(default)]
    pub bbox: Option<String>,

    /// Extent polygon as inline GeoJSON text
    #[serde(default)]
    pub extent: Option<String>,

    /// Extent polygon read from a GeoJSON file
    #[serde(default)]
    pub extent_file: Option<PathBuf>,

    /// Buffer applied to the extent for full exports, in CRS units
    #[serde(default = "default_buffer_distance")]
    pub buffer_distance: f64,

    /// Number of downloaded artifacts kept by a purge
    #[serde(default = "default_retain_after_purge")]
    pub retain_after_purge: usize,

    /// Seconds between export status checks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Polling budget in seconds before the export is reported timed out
    #[serde(default = "default_max_polling_time_secs")]
    pub max_polling_time_secs: u64,

    /// Optional downstream store
    #[serde(default)]
    pub target: Option<TargetConfig>,
}

impl DatasetConfig {
    /// Creates a dataset configuration with defaults for everything optional
    pub fn new(layer_id: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            id_field: id_field.into(),
            wkid: default_wkid(),
            remote_filter: None,
            local_filter: None,
            bbox: None,
            extent: None,
            extent_file: None,
            buffer_distance: default_buffer_distance(),
            retain_after_purge: default_retain_after_purge(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polling_time_secs: default_max_polling_time_secs(),
            target: None,
        }
    }

    /// Validates the dataset settings
    ///
    /// # Errors
    ///
    /// Returns an error for missing identity settings, unusable polling
    /// parameters, or mutually exclusive request filters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        LayerId::new(self.layer_id.as_str())?;
        if self.id_field.trim().is_empty() {
            return Err("id_field cannot be empty".to_string());
        }
        if self.wkid == 0 {
            return Err("wkid must be > 0".to_string());
        }
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be > 0".to_string());
        }
        if self.max_polling_time_secs < self.poll_interval_secs {
            return Err(format!(
                "max_polling_time_secs ({}) must be >= poll_interval_secs ({})",
                self.max_polling_time_secs, self.poll_interval_secs
            ));
        }
        if !self.buffer_distance.is_finite() || self.buffer_distance < 0.0 {
            return Err(format!(
                "buffer_distance must be a non-negative number, got {}",
                self.buffer_distance
            ));
        }
        if self.remote_filter().is_some() && self.bbox.is_some() {
            return Err(
                "bbox and remote_filter cannot both be set: the changeset feed accepts only one of them"
                    .to_string(),
            );
        }
        if self.extent.is_some() && self.extent_file.is_some() {
            return Err("extent and extent_file cannot both be set".to_string());
        }
        self.request_bbox()?;
        if let Some(filter) = self.local_filter() {
            LocalFilter::parse(filter).map_err(|e| format!("local_filter: {e}"))?;
        }
        if let Some(target) = &self.target {
            if target.location.as_os_str().is_empty() {
                return Err("target.location cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Non-fatal findings
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.remote_filter().is_some() && self.local_filter().is_none() {
            warnings.push(
                "remote_filter is set without local_filter; records that stop matching will not be removed locally"
                    .to_string(),
            );
        }
        if self.remote_filter().is_some() && self.has_extent() {
            warnings.push(
                "remote_filter and extent are both set; changeset requests use the filter and the extent is applied after retrieval"
                    .to_string(),
            );
        }
        warnings
    }

    /// Typed layer identifier
    pub fn layer(&self) -> Result<LayerId> {
        LayerId::new(self.layer_id.as_str()).map_err(GeosyncError::Configuration)
    }

    /// Remote filter, ignoring blank values
    pub fn remote_filter(&self) -> Option<&str> {
        self.remote_filter.as_deref().filter(|f| !f.trim().is_empty())
    }

    /// Local filter, ignoring blank values
    pub fn local_filter(&self) -> Option<&str> {
        self.local_filter.as_deref().filter(|f| !f.trim().is_empty())
    }

    /// Parsed explicit request bounding box
    pub fn request_bbox(&self) -> std::result::Result<Option<BoundingBox>, String> {
        self.bbox.as_deref().map(str::parse).transpose()
    }

    /// True when an extent is configured in either form
    pub fn has_extent(&self) -> bool {
        self.extent.is_some() || self.extent_file.is_some()
    }

    /// Loads the configured extent polygon
    ///
    /// Accepts a GeoJSON geometry, feature, or feature collection (first
    /// feature). Relative `extent_file` paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the file cannot be read or the
    /// GeoJSON does not hold a polygon.
    pub fn extent_geometry(&self, base_dir: &Path) -> Result<Option<Geometry>> {
        let text = match (&self.extent, &self.extent_file) {
            (Some(inline), _) => inline.clone(),
            (None, Some(file)) => {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    base_dir.join(file)
                };
                std::fs::read_to_string(&path).map_err(|e| {
                    GeosyncError::Configuration(format!(
                        "Failed to read extent file {}: {e}",
                        path.display()
                    ))
                })?
            }
            (None, None) => return Ok(None),
        };
        parse_extent(&text).map(Some)
    }

    /// Interval between export status checks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Polling budget
    pub fn max_polling_time(&self) -> Duration {
        Duration::from_secs(self.max_polling_time_secs)
    }
}

/// Parses GeoJSON text into a polygonal extent
pub fn parse_extent(text: &str) -> Result<Geometry> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| GeosyncError::Configuration(format!("Extent is not valid JSON: {e}")))?;
    let geometry = match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => value
            .get("features")
            .and_then(Value::as_array)
            .and_then(|f| f.first())
            .and_then(|f| f.get("geometry"))
            .cloned(),
        Some("Feature") => value.get("geometry").cloned(),
        _ => Some(value),
    }
    .ok_or_else(|| GeosyncError::Configuration("Extent GeoJSON holds no geometry".to_string()))?;

    let geometry: Geometry = serde_json::from_value(geometry)
        .map_err(|e| GeosyncError::Configuration(format!("Extent geometry is invalid: {e}")))?;
    if !geometry.is_polygonal() {
        return Err(GeosyncError::Configuration(
            "Extent must be a Polygon or MultiPolygon".to_string(),
        ));
    }
    Ok(geometry)
}

/// Downstream target store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Location of the target store
    pub location: PathBuf,

    /// The target enforces constraints that make a fast truncate unsafe;
    /// full refreshes then delete row by row
    #[serde(default)]
    pub fast_clear_unsafe: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base_url() -> String {
    "https://data.linz.govt.nz/services/api/v1.x/".to_string()
}

fn default_feed_url() -> String {
    "https://data.linz.govt.nz/services/wfs".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_vector_format() -> String {
    "application/vnd.geo+json".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_wkid() -> u32 {
    2193
}

fn default_buffer_distance() -> f64 {
    1000.0
}

fn default_retain_after_purge() -> usize {
    5
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_polling_time_secs() -> u64 {
    600
}
