//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::GeosyncConfig;
use super::secret::secret_string;
use crate::domain::errors::GeosyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into GeosyncConfig
/// 4. Applies environment variable overrides (GEOSYNC_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read, a referenced
/// environment variable is unset, the TOML is malformed, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use geosync::config::loader::load_config;
///
/// let config = load_config("geosync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<GeosyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(GeosyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        GeosyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents, path.parent())
}

/// Parses configuration text; relative paths resolve against `base_dir`
pub fn parse_config(contents: &str, base_dir: Option<&Path>) -> Result<GeosyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: GeosyncConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    if let Some(base) = base_dir.filter(|b| !b.as_os_str().is_empty()) {
        resolve_relative_paths(&mut config, base);
    }

    config.validate().map_err(|e| {
        GeosyncError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched so documented placeholders do not have to
/// be set.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER
        .get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex"));

    let mut missing_vars: Vec<String> = Vec::new();
    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            re.replace_all(line, |cap: &regex::Captures| match std::env::var(&cap[1]) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == &cap[1]) {
                        missing_vars.push(cap[1].to_string());
                    }
                    cap[0].to_string()
                }
            })
            .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(GeosyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using GEOSYNC_* prefix
///
/// Environment variables follow the pattern: GEOSYNC_<SECTION>_<KEY>
/// For example: GEOSYNC_SERVICE_API_KEY, GEOSYNC_STORAGE_DATA_DIR
fn apply_env_overrides(config: &mut GeosyncConfig) {
    if let Ok(val) = std::env::var("GEOSYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Service overrides
    if let Ok(val) = std::env::var("GEOSYNC_SERVICE_API_KEY") {
        config.service.api_key = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("GEOSYNC_SERVICE_API_BASE_URL") {
        config.service.api_base_url = val;
    }
    if let Ok(val) = std::env::var("GEOSYNC_SERVICE_FEED_URL") {
        config.service.feed_url = val;
    }
    if let Ok(val) = std::env::var("GEOSYNC_SERVICE_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.service.timeout_seconds = timeout;
        }
    }
    if let Ok(val) = std::env::var("GEOSYNC_SERVICE_HTTP_PROXY") {
        config.service.http_proxy = Some(val);
    }
    if let Ok(val) = std::env::var("GEOSYNC_SERVICE_HTTPS_PROXY") {
        config.service.https_proxy = Some(val);
    }

    // Storage overrides
    if let Ok(val) = std::env::var("GEOSYNC_STORAGE_DATA_DIR") {
        config.storage.data_dir = PathBuf::from(val);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("GEOSYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("GEOSYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

/// Anchors relative data and extent paths at the configuration file directory
fn resolve_relative_paths(config: &mut GeosyncConfig, base: &Path) {
    if config.storage.data_dir.is_relative() {
        config.storage.data_dir = base.join(&config.storage.data_dir);
    }
    for dataset in config.datasets.values_mut() {
        if let Some(file) = dataset.extent_file.as_mut().filter(|f| f.is_relative()) {
            *file = base.join(&*file);
        }
        if let Some(target) = dataset.target.as_mut().filter(|t| t.location.is_relative()) {
            target.location = base.join(&target.location);
        }
    }
}

/// Sample configuration written by `geosync init --write-config`
pub const SAMPLE_CONFIG: &str = r#"# geosync configuration

[application]
log_level = "info"

[service]
api_base_url = "https://data.linz.govt.nz/services/api/v1.x/"
feed_url = "https://data.linz.govt.nz/services/wfs"
# Prefer the GEOSYNC_SERVICE_API_KEY environment variable
# api_key = "${GEOSYNC_API_KEY}"
timeout_seconds = 300
vector_format = "application/vnd.geo+json"
# http_proxy = "http://proxy.example.com:8080"
# https_proxy = "http://proxy.example.com:8080"

[storage]
data_dir = "data"

[logging]
local_enabled = true
# Empty means <data_dir>/<dataset>/logs
local_path = ""
local_rotation = "daily"

[datasets.parcels]
layer_id = "50772"
id_field = "id"
wkid = 2193
# remote_filter = "land_district='Otago'"
# local_filter = "land_district = 'Otago'"
# extent_file = "extent.geojson"
buffer_distance = 1000.0
retain_after_purge = 5
poll_interval_secs = 10
max_polling_time_secs = 600

# [datasets.parcels.target]
# location = "target/parcels.geojson"
# fast_clear_unsafe = false
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("GEOSYNC_TEST_SUBST_VAR", "test_value");
        let input = "api_key = \"${GEOSYNC_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "api_key = \"test_value\"");
        std::env::remove_var("GEOSYNC_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("GEOSYNC_TEST_MISSING_VAR");
        let input = "api_key = \"${GEOSYNC_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("GEOSYNC_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# api_key = \"${GEOSYNC_TEST_NEVER_SET}\"";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(GeosyncError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[service]
api_key = "abc"

[storage]
data_dir = "data"

[datasets.parcels]
layer_id = "50772"
id_field = "id"
remote_filter = "land_district='Otago'"
local_filter = "land_district = 'Otago'"

[datasets.parcels.target]
location = "target.geojson"
fast_clear_unsafe = true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        let parcels = &config.datasets["parcels"];
        assert_eq!(parcels.wkid, 2193);
        assert!(parcels.target.as_ref().unwrap().fast_clear_unsafe);
        assert!(config.storage.data_dir.is_absolute());
    }

    #[test]
    fn test_load_config_rejects_exclusive_filters() {
        let toml_content = r#"
[datasets.parcels]
layer_id = "50772"
id_field = "id"
remote_filter = "a=1"
bbox = "1,2,3,4"
"#;
        let err = parse_config(toml_content, None).unwrap_err();
        assert!(matches!(err, GeosyncError::Configuration(_)));
    }

    #[test]
    fn test_sample_config_parses() {
        std::env::set_var("GEOSYNC_API_KEY", "sample");
        let config = parse_config(SAMPLE_CONFIG, None).unwrap();
        assert!(config.datasets.contains_key("parcels"));
    }
}
