//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables hold `ENV_MUTEX` so they do
//! not interfere with each other.

use geosync::config::{load_config, SAMPLE_CONFIG};
use geosync::domain::GeosyncError;
use secrecy::ExposeSecret;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("GEOSYNC_APPLICATION_LOG_LEVEL");
    std::env::remove_var("GEOSYNC_SERVICE_API_KEY");
    std::env::remove_var("GEOSYNC_SERVICE_FEED_URL");
    std::env::remove_var("GEOSYNC_STORAGE_DATA_DIR");
    std::env::remove_var("GEOSYNC_LOGGING_LOCAL_ENABLED");
    std::env::remove_var("TEST_GEOSYNC_KEY");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let toml_content = r#"
[application]
log_level = "debug"

[service]
api_base_url = "https://data.example.com/services/api/v1.x/"
feed_url = "https://data.example.com/services/wfs"
api_key = "test-key-12345"
timeout_seconds = 120
vector_format = "application/x-ogc-gpkg"

[storage]
data_dir = "/var/lib/geosync"

[logging]
local_enabled = false
local_path = "/tmp/geosync"
local_rotation = "hourly"

[datasets.parcels]
layer_id = "50772"
id_field = "id"
wkid = 4326
remote_filter = "land_district='Otago'"
local_filter = "land_district = 'Otago'"
buffer_distance = 250.0
retain_after_purge = 3
poll_interval_secs = 5
max_polling_time_secs = 60

[datasets.parcels.target]
location = "/var/lib/geosync/target/parcels.geojson"
fast_clear_unsafe = true

[datasets.roads]
layer_id = "50329"
id_field = "road_id"
bbox = "1570000,5180000,1580000,5190000"
"#;

    let temp_file = write_config(toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "debug");

    assert_eq!(config.service.api_base_url, "https://data.example.com/services/api/v1.x/");
    assert_eq!(config.service.feed_url, "https://data.example.com/services/wfs");
    assert_eq!(
        config.service.api_key.as_ref().unwrap().expose_secret().as_str(),
        "test-key-12345"
    );
    assert_eq!(config.service.timeout_seconds, 120);
    assert_eq!(config.service.vector_format, "application/x-ogc-gpkg");

    assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/geosync"));

    assert!(!config.logging.local_enabled);
    assert_eq!(config.logging.local_path, "/tmp/geosync");
    assert_eq!(config.logging.local_rotation, "hourly");

    let (name, parcels) = config.dataset("parcels").unwrap();
    assert_eq!(name.as_str(), "parcels");
    assert_eq!(parcels.wkid, 4326);
    assert_eq!(parcels.remote_filter(), Some("land_district='Otago'"));
    assert_eq!(parcels.local_filter(), Some("land_district = 'Otago'"));
    assert_eq!(parcels.buffer_distance, 250.0);
    assert_eq!(parcels.retain_after_purge, 3);
    assert_eq!(parcels.poll_interval_secs, 5);
    assert_eq!(parcels.max_polling_time_secs, 60);
    let target = parcels.target.as_ref().unwrap();
    assert!(target.fast_clear_unsafe);

    let (_, roads) = config.dataset("roads").unwrap();
    assert_eq!(roads.id_field, "road_id");
    assert!(roads.request_bbox().unwrap().is_some());
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = r#"
[datasets.parcels]
layer_id = "50772"
id_field = "id"
"#;

    let temp_file = write_config(toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "info");
    assert!(config.service.api_key.is_none());
    assert_eq!(config.service.timeout_seconds, 300);
    assert!(config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "daily");
    assert!(config.storage.data_dir.ends_with("data"));

    let (_, dataset) = config.dataset("parcels").unwrap();
    assert_eq!(dataset.wkid, 2193);
    assert_eq!(dataset.buffer_distance, 1000.0);
    assert_eq!(dataset.retain_after_purge, 5);
    assert_eq!(dataset.poll_interval_secs, 10);
    assert_eq!(dataset.max_polling_time_secs, 600);
    assert!(dataset.target.is_none());
}

#[test]
fn test_relative_paths_resolve_against_config_directory() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("extent.geojson"),
        r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#,
    )
    .unwrap();
    let path = dir.path().join("geosync.toml");
    std::fs::write(
        &path,
        r#"
[storage]
data_dir = "data"

[datasets.parcels]
layer_id = "50772"
id_field = "id"
extent_file = "extent.geojson"

[datasets.parcels.target]
location = "target/parcels.geojson"
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();

    assert_eq!(config.storage.data_dir, dir.path().join("data"));
    let (_, dataset) = config.dataset("parcels").unwrap();
    assert_eq!(dataset.extent_file.as_deref(), Some(dir.path().join("extent.geojson").as_path()));
    assert_eq!(
        dataset.target.as_ref().unwrap().location,
        dir.path().join("target/parcels.geojson")
    );
    assert!(dataset.extent_geometry(dir.path()).unwrap().is_some());
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_GEOSYNC_KEY", "secret_key");

    let toml_content = r#"
[service]
api_key = "${TEST_GEOSYNC_KEY}"

[datasets.parcels]
layer_id = "50772"
id_field = "id"
"#;

    let temp_file = write_config(toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(
        config.service.api_key.as_ref().unwrap().expose_secret().as_str(),
        "secret_key"
    );

    cleanup_env_vars();
}

#[test]
fn test_env_var_substitution_missing_var() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = r#"
[service]
api_key = "${TEST_GEOSYNC_KEY}"
"#;

    let temp_file = write_config(toml_content);
    let err = load_config(temp_file.path()).unwrap_err();

    assert!(matches!(err, GeosyncError::Configuration(_)));
    assert!(err.to_string().contains("TEST_GEOSYNC_KEY"));
}

#[test]
fn test_env_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("GEOSYNC_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("GEOSYNC_SERVICE_API_KEY", "from-env");
    std::env::set_var("GEOSYNC_SERVICE_FEED_URL", "https://feed.example.com/wfs");
    std::env::set_var("GEOSYNC_STORAGE_DATA_DIR", "/srv/geosync");
    std::env::set_var("GEOSYNC_LOGGING_LOCAL_ENABLED", "false");

    let toml_content = r#"
[application]
log_level = "info"

[datasets.parcels]
layer_id = "50772"
id_field = "id"
"#;

    let temp_file = write_config(toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "trace");
    assert_eq!(
        config.service.api_key.as_ref().unwrap().expose_secret().as_str(),
        "from-env"
    );
    assert_eq!(config.service.feed_url, "https://feed.example.com/wfs");
    assert_eq!(config.storage.data_dir, PathBuf::from("/srv/geosync"));
    assert!(!config.logging.local_enabled);

    cleanup_env_vars();
}

#[test]
fn test_invalid_configs_are_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        // Both request filters
        r#"
[datasets.parcels]
layer_id = "50772"
id_field = "id"
bbox = "0,0,1,1"
remote_filter = "a = 1"
"#,
        // Empty identity field
        r#"
[datasets.parcels]
layer_id = "50772"
id_field = ""
"#,
        // Budget shorter than one interval
        r#"
[datasets.parcels]
layer_id = "50772"
id_field = "id"
poll_interval_secs = 30
max_polling_time_secs = 10
"#,
        // Unparseable local filter
        r#"
[datasets.parcels]
layer_id = "50772"
id_field = "id"
local_filter = "status = "
"#,
        // Bad log level
        r#"
[application]
log_level = "loud"
"#,
    ];

    for case in cases {
        let temp_file = write_config(case);
        let err = load_config(temp_file.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2, "accepted: {case}");
    }
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/geosync.toml").unwrap_err();
    assert!(matches!(err, GeosyncError::Configuration(_)));
}

#[test]
fn test_sample_config_loads() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_config(SAMPLE_CONFIG);
    let config = load_config(temp_file.path()).expect("Sample config should load");
    assert!(config.dataset("parcels").is_ok());
    assert!(config.warnings().is_empty());
}
