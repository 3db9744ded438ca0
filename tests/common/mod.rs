//! Shared fixtures for integration tests
//!
//! In-memory stand-ins for the remote export API and changeset feed, plus
//! helpers for building payloads and coordinators over a temporary data
//! directory.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use geosync::adapters::geoprocessing::{GeoprocessingEngine, LocalEngine};
use geosync::adapters::remote::{
    ChangesetFeed, ChangesetQuery, ExportRequest, ExportService, ExportStatus,
};
use geosync::config::DatasetConfig;
use geosync::core::pipeline::{Clock, SyncCoordinator};
use geosync::domain::{DatasetName, Feature, GeosyncError, JobId, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const JOB_ID: &str = "901";

/// Fixed instant on 2024-06-20
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 20, hour, 0, 0).unwrap()
}

/// Clock that always answers `instant`
pub fn fixed_clock(instant: DateTime<Utc>) -> Clock {
    Arc::new(move || instant)
}

/// GeoJSON point feature with an `id`, a `name` and an optional change tag
pub fn point(id: i64, name: &str, x: f64, y: f64, change: Option<&str>) -> Value {
    let mut properties = json!({"id": id, "name": name});
    if let Some(tag) = change {
        properties["__change__"] = json!(tag);
    }
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [x, y]},
        "properties": properties,
    })
}

/// Feature collection text
pub fn collection(features: Vec<Value>) -> String {
    json!({
        "type": "FeatureCollection",
        "numberReturned": features.len(),
        "features": features,
    })
    .to_string()
}

/// Zip archive holding `geojson` as its only member
pub fn zip_bytes(geojson: &str) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("layer.geojson", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(geojson.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Export API that reports `processing` a fixed number of times
pub struct FakeExportService {
    processing_checks: Option<u32>,
    archive: Vec<u8>,
    created_at: Option<String>,
    pub checks: AtomicU32,
    pub created: AtomicU32,
    pub requests: Mutex<Vec<ExportRequest>>,
}

impl FakeExportService {
    /// Ready after `processing_checks` processing answers; `None` never gets ready
    pub fn new(processing_checks: Option<u32>, archive: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            processing_checks,
            archive,
            created_at: None,
            checks: AtomicU32::new(0),
            created: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same as [`FakeExportService::new`] but statuses report a creation time
    pub fn with_created_at(processing_checks: Option<u32>, archive: Vec<u8>, created_at: &str) -> Arc<Self> {
        Arc::new(Self {
            processing_checks,
            archive,
            created_at: Some(created_at.to_string()),
            checks: AtomicU32::new(0),
            created: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn status(&self, id: &str, state: &str) -> ExportStatus {
        let mut body = json!({"id": id, "state": state});
        if let Some(created_at) = &self.created_at {
            body["created_at"] = json!(created_at);
        }
        ExportStatus::from_json(&body).unwrap()
    }
}

#[async_trait]
impl ExportService for FakeExportService {
    async fn validate_export(&self, request: &ExportRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn create_export(&self, _request: &ExportRequest) -> Result<ExportStatus> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.status(JOB_ID, "processing"))
    }

    async fn export_status(&self, id: &JobId) -> Result<ExportStatus> {
        let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        let state = match self.processing_checks {
            Some(processing) if n > processing => "complete",
            _ => "processing",
        };
        Ok(self.status(id.as_str(), state))
    }

    async fn download_export(&self, _status: &ExportStatus, dest: &Path) -> Result<u64> {
        tokio::fs::write(dest, &self.archive).await?;
        Ok(self.archive.len() as u64)
    }
}

/// Changeset feed answering queued payloads in order
pub struct FakeFeed {
    payloads: Mutex<VecDeque<String>>,
    pub queries: Mutex<Vec<ChangesetQuery>>,
}

impl FakeFeed {
    pub fn new(payloads: impl IntoIterator<Item = String>) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(payloads.into_iter().collect()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl ChangesetFeed for FakeFeed {
    async fn fetch_changeset(&self, query: &ChangesetQuery, dest: &Path) -> Result<u64> {
        self.queries.lock().unwrap().push(query.clone());
        let payload = self
            .payloads
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GeosyncError::transport("No payload queued"))?;
        tokio::fs::write(dest, &payload).await?;
        Ok(payload.len() as u64)
    }
}

/// Dataset over layer 50772 keyed by `id`, polling every second for five
pub fn dataset() -> DatasetConfig {
    let mut config = DatasetConfig::new("50772", "id");
    config.poll_interval_secs = 1;
    config.max_polling_time_secs = 5;
    config
}

/// Coordinator for dataset `parcels` under `data_dir`, started at `now`
pub fn coordinator(
    data_dir: &Path,
    config: DatasetConfig,
    engine: Arc<dyn GeoprocessingEngine>,
    now: DateTime<Utc>,
) -> SyncCoordinator {
    SyncCoordinator::new(
        DatasetName::new("parcels").unwrap(),
        config,
        data_dir,
        engine,
    )
    .with_base_dir(data_dir)
    .with_clock(fixed_clock(now))
}

pub fn engine() -> Arc<dyn GeoprocessingEngine> {
    Arc::new(LocalEngine::new())
}

/// Canonical rows keyed by identity, sorted
pub async fn canonical_rows(coordinator: &SyncCoordinator) -> Vec<Feature> {
    let mut rows = LocalEngine::new()
        .read_features(&coordinator.paths().canonical_store(), "id")
        .await
        .unwrap();
    rows.sort_by(|a, b| a.identity.cmp(&b.identity));
    rows
}
