//! Bundled geoprocessing engine over GeoJSON files
//!
//! A store is a single GeoJSON `FeatureCollection` file with two foreign
//! members: `extent` (the polygon slot, or null) and `next_oid`. Every row
//! carries a surrogate `id` that is assigned on insert and kept when the row is
//! upserted in place.
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the store, so
//! a crash mid-write leaves the previous content intact.

use crate::adapters::geoprocessing::planar;
use crate::adapters::geoprocessing::traits::{
    ArtifactKind, GeoprocessingEngine, RawArtifact, RowPredicate, StoreLocation, WriteMode,
};
use crate::domain::{
    BoundingBox, Feature, FeatureSet, Geometry, GeosyncError, IdentityValue, Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// GeoJSON file engine
#[derive(Debug, Clone, Default)]
pub struct LocalEngine;

impl LocalEngine {
    /// Creates the engine
    pub fn new() -> Self {
        Self
    }

    async fn load(&self, store: &StoreLocation) -> Result<StoreDocument> {
        let bytes = match tokio::fs::read(store.path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GeosyncError::Reconciliation(format!(
                    "Feature store {store} does not exist"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            GeosyncError::Reconciliation(format!("Feature store {store} is corrupt: {e}"))
        })
    }

    async fn save(&self, store: &StoreLocation, document: &StoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec(document)?;
        write_atomic(store.path(), &bytes).await
    }
}

/// Writes `bytes` to `path` through a temporary sibling and a rename
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    extent: Option<Geometry>,
    #[serde(default)]
    next_oid: u64,
    #[serde(default)]
    features: Vec<StoredRow>,
}

impl StoreDocument {
    fn empty(extent: Option<Geometry>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            extent,
            next_oid: 1,
            features: Vec::new(),
        }
    }

    fn push(&mut self, feature: &Feature) {
        self.features.push(StoredRow {
            kind: "Feature".to_string(),
            id: self.next_oid,
            geometry: feature.geometry.clone(),
            properties: feature.properties.clone(),
        });
        self.next_oid += 1;
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRow {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl StoredRow {
    fn identity(&self, field: &str) -> Option<IdentityValue> {
        self.properties.get(field).and_then(IdentityValue::from_json)
    }
}

fn row_matches(
    predicate: &RowPredicate,
    geometry: Option<&Geometry>,
    properties: &Map<String, Value>,
) -> bool {
    match predicate {
        RowPredicate::All => true,
        RowPredicate::IdentityIn { field, ids } => properties
            .get(field)
            .and_then(IdentityValue::from_json)
            .is_some_and(|id| ids.contains(&id)),
        RowPredicate::NotIntersecting(extent) => {
            !geometry.is_some_and(|g| planar::intersects(g, extent))
        }
        RowPredicate::NotMatching(filter) => !filter.matches(properties),
    }
}

/// Parses a GeoJSON feature collection into features
fn parse_collection(text: &str, id_field: &str, source: &Path) -> Result<FeatureSet> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        GeosyncError::Serialization(format!("{} is not valid JSON: {e}", source.display()))
    })?;
    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(GeosyncError::Serialization(format!(
            "{} is not a GeoJSON FeatureCollection",
            source.display()
        )));
    }
    let features = match value.get("features") {
        Some(Value::Array(features)) => features,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => {
            return Err(GeosyncError::Serialization(format!(
                "{}: features must be an array",
                source.display()
            )))
        }
    };
    features
        .iter()
        .enumerate()
        .map(|(i, f)| {
            Feature::from_geojson(f, id_field).map_err(|e| {
                GeosyncError::Serialization(format!("{} feature #{i}: {e}", source.display()))
            })
        })
        .collect()
}

/// Reads the first GeoJSON member of a zip archive
fn read_archive_member(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_ascii_lowercase();
        if entry.is_dir() || name.starts_with("__macosx") {
            continue;
        }
        if name.ends_with(".geojson") || name.ends_with(".json") {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            return Ok(text);
        }
    }
    Err(GeosyncError::Serialization(format!(
        "Archive {} holds no GeoJSON member",
        path.display()
    )))
}

#[async_trait]
impl GeoprocessingEngine for LocalEngine {
    async fn convert_to_features(&self, artifact: &RawArtifact, id_field: &str) -> Result<FeatureSet> {
        let text = match artifact.kind {
            ArtifactKind::ChangesetPayload => tokio::fs::read_to_string(&artifact.path).await?,
            ArtifactKind::ExportArchive => {
                let path: PathBuf = artifact.path.clone();
                tokio::task::spawn_blocking(move || read_archive_member(&path))
                    .await
                    .map_err(|e| GeosyncError::Io(format!("Archive reader failed: {e}")))??
            }
        };
        let features = parse_collection(&text, id_field, &artifact.path)?;
        tracing::debug!(
            artifact = %artifact.path.display(),
            features = features.len(),
            "Converted artifact to features"
        );
        Ok(features)
    }

    async fn exists(&self, store: &StoreLocation) -> Result<bool> {
        Ok(tokio::fs::try_exists(store.path()).await?)
    }

    async fn create_store(&self, store: &StoreLocation, extent: Option<&Geometry>) -> Result<()> {
        if self.exists(store).await? {
            return Err(GeosyncError::Reconciliation(format!(
                "Feature store {store} already exists"
            )));
        }
        self.save(store, &StoreDocument::empty(extent.cloned())).await
    }

    async fn count(&self, store: &StoreLocation) -> Result<usize> {
        Ok(self.load(store).await?.features.len())
    }

    async fn read_features(&self, store: &StoreLocation, id_field: &str) -> Result<FeatureSet> {
        let document = self.load(store).await?;
        document
            .features
            .into_iter()
            .map(|row| {
                let identity = row.identity(id_field).ok_or_else(|| {
                    GeosyncError::Reconciliation(format!(
                        "Row {} of {store} has no usable '{id_field}' value",
                        row.id
                    ))
                })?;
                Ok(Feature {
                    identity,
                    geometry: row.geometry,
                    properties: row.properties,
                    change: None,
                })
            })
            .collect()
    }

    async fn read_extent(&self, store: &StoreLocation) -> Result<Option<Geometry>> {
        Ok(self.load(store).await?.extent)
    }

    async fn write_extent(&self, store: &StoreLocation, extent: Option<&Geometry>) -> Result<()> {
        let mut document = self.load(store).await?;
        document.extent = extent.cloned();
        self.save(store, &document).await
    }

    async fn truncate(&self, store: &StoreLocation) -> Result<()> {
        let mut document = self.load(store).await?;
        document.features.clear();
        self.save(store, &document).await
    }

    async fn delete_rows(&self, store: &StoreLocation, predicate: &RowPredicate) -> Result<usize> {
        let mut document = self.load(store).await?;
        let before = document.features.len();
        document
            .features
            .retain(|row| !row_matches(predicate, row.geometry.as_ref(), &row.properties));
        let removed = before - document.features.len();
        if removed > 0 {
            self.save(store, &document).await?;
        }
        Ok(removed)
    }

    async fn append_or_upsert(
        &self,
        store: &StoreLocation,
        features: &[Feature],
        match_field: &str,
        mode: WriteMode,
    ) -> Result<usize> {
        let mut document = self.load(store).await?;
        match mode {
            WriteMode::Append => features.iter().for_each(|f| document.push(f)),
            WriteMode::Upsert => {
                let mut index: HashMap<IdentityValue, usize> = document
                    .features
                    .iter()
                    .enumerate()
                    .filter_map(|(i, row)| row.identity(match_field).map(|id| (id, i)))
                    .collect();
                for feature in features {
                    let identity = feature
                        .properties
                        .get(match_field)
                        .and_then(IdentityValue::from_json)
                        .ok_or_else(|| {
                            GeosyncError::Reconciliation(format!(
                                "Feature {} has no '{match_field}' value to match on",
                                feature.identity
                            ))
                        })?;
                    match index.get(&identity) {
                        Some(&i) => {
                            let row = &mut document.features[i];
                            row.geometry = feature.geometry.clone();
                            row.properties = feature.properties.clone();
                        }
                        None => {
                            index.insert(identity, document.features.len());
                            document.push(feature);
                        }
                    }
                }
            }
        }
        self.save(store, &document).await?;
        Ok(features.len())
    }

    fn evaluate(&self, predicate: &RowPredicate, feature: &Feature) -> bool {
        row_matches(predicate, feature.geometry.as_ref(), &feature.properties)
    }

    fn buffered_envelope(&self, geometry: &Geometry, distance: f64) -> Result<BoundingBox> {
        geometry
            .envelope()
            .map(|envelope| envelope.expanded(distance))
            .ok_or_else(|| GeosyncError::Configuration("Extent geometry is empty".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::geoprocessing::LocalFilter;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::io::Write;

    fn feature(id: i64, name: &str, x: f64) -> Feature {
        let props = json!({"name": name}).as_object().cloned().unwrap_or_default();
        Feature::new("id", id.into(), Some(Geometry::Point(vec![x, 0.0])), props)
    }

    async fn store_with(engine: &LocalEngine, dir: &Path, rows: &[Feature]) -> StoreLocation {
        let store = StoreLocation::new(dir.join("canonical.geojson"));
        engine.create_store(&store, None).await.unwrap();
        engine
            .append_or_upsert(&store, rows, "id", WriteMode::Append)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_store_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new();
        let store = StoreLocation::new(dir.path().join("s.geojson"));
        engine.create_store(&store, None).await.unwrap();
        assert!(engine.create_store(&store, None).await.is_err());
        assert_eq!(engine.count(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_store_is_reconciliation_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreLocation::new(dir.path().join("absent.geojson"));
        let err = LocalEngine::new().count(&store).await.unwrap_err();
        assert!(matches!(err, GeosyncError::Reconciliation(_)));
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place_and_keeps_oid() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new();
        let store = store_with(&engine, dir.path(), &[feature(1, "a", 0.0), feature(2, "b", 1.0)]).await;

        engine
            .append_or_upsert(&store, &[feature(2, "b2", 5.0), feature(3, "c", 2.0)], "id", WriteMode::Upsert)
            .await
            .unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        let rows = raw["features"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["id"], json!(2));
        assert_eq!(rows[1]["properties"]["name"], json!("b2"));
        assert_eq!(rows[2]["id"], json!(3));
        assert_eq!(raw["next_oid"], json!(4));
    }

    #[tokio::test]
    async fn test_delete_absent_identity_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new();
        let store = store_with(&engine, dir.path(), &[feature(1, "a", 0.0)]).await;
        let predicate = RowPredicate::IdentityIn {
            field: "id".to_string(),
            ids: BTreeSet::from([99i64.into()]),
        };
        assert_eq!(engine.delete_rows(&store, &predicate).await.unwrap(), 0);
        assert_eq!(engine.count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_truncate_preserves_extent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new();
        let extent = BoundingBox::new(0.0, 0.0, 10.0, 10.0).to_polygon();
        let store = StoreLocation::new(dir.path().join("s.geojson"));
        engine.create_store(&store, Some(&extent)).await.unwrap();
        engine
            .append_or_upsert(&store, &[feature(1, "a", 0.0)], "id", WriteMode::Append)
            .await
            .unwrap();
        engine.truncate(&store).await.unwrap();
        assert_eq!(engine.count(&store).await.unwrap(), 0);
        assert_eq!(engine.read_extent(&store).await.unwrap(), Some(extent));
    }

    #[tokio::test]
    async fn test_delete_not_intersecting_and_not_matching() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new();
        let store = store_with(
            &engine,
            dir.path(),
            &[feature(1, "keep", 1.0), feature(2, "keep", 50.0), feature(3, "drop", 2.0)],
        )
        .await;
        let extent = BoundingBox::new(0.0, -1.0, 10.0, 1.0).to_polygon();
        let removed = engine
            .delete_rows(&store, &RowPredicate::NotIntersecting(extent))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let filter = LocalFilter::parse("name = 'keep'").unwrap();
        let removed = engine
            .delete_rows(&store, &RowPredicate::NotMatching(filter))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let left = engine.read_features(&store, "id").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].identity, 1i64.into());
    }

    #[tokio::test]
    async fn test_convert_changeset_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changeset.json");
        std::fs::write(
            &path,
            json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "geometry": null, "properties": {"id": 42.0, "__change__": "DELETE"}}
                ]
            })
            .to_string(),
        )
        .unwrap();
        let features = LocalEngine::new()
            .convert_to_features(&RawArtifact::changeset(&path), "id")
            .await
            .unwrap();
        assert_eq!(features.len(), 1);
        assert!(features[0].is_deletion());
        assert_eq!(features[0].identity, 42i64.into());
    }

    #[tokio::test]
    async fn test_convert_export_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.zip");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("readme.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"layer export").unwrap();
            zip.start_file("layer-50772.geojson", zip::write::SimpleFileOptions::default())
                .unwrap();
            let body = json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}, "properties": {"id": 7}}
                ]
            });
            zip.write_all(body.to_string().as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        let features = LocalEngine::new()
            .convert_to_features(&RawArtifact::archive(&path), "id")
            .await
            .unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].identity, 7i64.into());
        assert!(features[0].change.is_none());
    }

    #[test]
    fn test_evaluate_rows_without_geometry_never_intersect() {
        let engine = LocalEngine::new();
        let extent = BoundingBox::new(0.0, 0.0, 1.0, 1.0).to_polygon();
        let bare = Feature::new("id", 1i64.into(), None, Map::new());
        assert!(engine.evaluate(&RowPredicate::NotIntersecting(extent), &bare));
        assert!(engine.evaluate(&RowPredicate::All, &bare));
    }

    #[test]
    fn test_buffered_envelope() {
        let engine = LocalEngine::new();
        let extent = BoundingBox::new(0.0, 0.0, 10.0, 10.0).to_polygon();
        assert_eq!(
            engine.buffered_envelope(&extent, 5.0).unwrap(),
            BoundingBox::new(-5.0, -5.0, 15.0, 15.0)
        );
        assert!(engine
            .buffered_envelope(&Geometry::MultiPoint(vec![]), 1.0)
            .is_err());
    }
}
