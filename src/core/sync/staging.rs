//! Canonical staging store synchronizer
//!
//! The canonical store is the authoritative local copy of a dataset. A full
//! retrieval replaces its rows; a changeset is applied as delete-then-upsert
//! keyed by the identity field.

use crate::adapters::geoprocessing::{GeoprocessingEngine, RowPredicate, StoreLocation, WriteMode};
use crate::domain::{FeatureSet, Geometry, GeosyncError, IdentityValue, Result, SyncDelta};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Row counts reported after applying a delta
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Rows before the apply
    pub before: usize,
    /// Rows removed by the delete pass
    pub deleted: usize,
    /// Rows written by the upsert pass
    pub upserted: usize,
    /// Rows after the apply
    pub after: usize,
    /// Row count the delta predicts
    pub expected: usize,
}

impl ApplyReport {
    /// True when the final count matches the prediction
    pub fn is_consistent(&self) -> bool {
        self.after == self.expected
    }
}

/// Maintains the canonical staging store of one dataset
pub struct StagingSynchronizer {
    engine: Arc<dyn GeoprocessingEngine>,
    store: StoreLocation,
    id_field: String,
}

impl StagingSynchronizer {
    /// Creates a synchronizer for the store at `store`
    pub fn new(
        engine: Arc<dyn GeoprocessingEngine>,
        store: StoreLocation,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            store,
            id_field: id_field.into(),
        }
    }

    /// Location of the canonical store
    pub fn store(&self) -> &StoreLocation {
        &self.store
    }

    /// Creates the store when missing
    ///
    /// # Returns
    ///
    /// Returns `true` when the store was created by this call.
    pub async fn ensure_store(&self, extent: Option<&Geometry>) -> Result<bool> {
        if self.engine.exists(&self.store).await? {
            return Ok(false);
        }
        self.engine.create_store(&self.store, extent).await?;
        tracing::info!(store = %self.store, "Created canonical store");
        Ok(true)
    }

    /// Identities currently stored
    pub async fn existing_identities(&self) -> Result<HashSet<IdentityValue>> {
        if !self.engine.exists(&self.store).await? {
            return Ok(HashSet::new());
        }
        let rows = self.engine.read_features(&self.store, &self.id_field).await?;
        Ok(rows.into_iter().map(|f| f.identity).collect())
    }

    /// Classifies changeset records against the stored identities
    pub async fn classify(&self, records: FeatureSet) -> Result<SyncDelta> {
        let existing = self.existing_identities().await?;
        let delta = SyncDelta::classify(records, &existing);
        debug_assert!(delta.is_disjoint());
        Ok(delta)
    }

    /// Replaces every row with a full retrieval
    ///
    /// The extent slot survives the truncate.
    ///
    /// # Returns
    ///
    /// Returns the delta describing the new content: every record added.
    pub async fn replace_all(&self, features: FeatureSet) -> Result<SyncDelta> {
        self.ensure_store(None).await?;
        let delta = SyncDelta::full(features);
        let rows: FeatureSet = delta.added.values().cloned().collect();

        self.engine.truncate(&self.store).await?;
        let written = self
            .engine
            .append_or_upsert(&self.store, &rows, &self.id_field, WriteMode::Append)
            .await?;
        tracing::info!(store = %self.store, rows = written, "Canonical store replaced");
        Ok(delta)
    }

    /// Applies a classified changeset
    ///
    /// Deletions run first, then additions and updates are upserted.
    /// Re-applying the same delta leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns a reconciliation error when the store does not exist.
    pub async fn apply_changeset(&self, delta: &SyncDelta) -> Result<ApplyReport> {
        if !self.engine.exists(&self.store).await? {
            return Err(GeosyncError::Reconciliation(format!(
                "Canonical store {} does not exist; run a full retrieval first",
                self.store
            )));
        }

        let stored = self.existing_identities().await?;
        let before = stored.len();
        let deleted_present = delta.deleted.iter().filter(|id| stored.contains(*id)).count();
        let added_absent = delta.upserts().filter(|f| !stored.contains(&f.identity)).count();
        let expected = before - deleted_present + added_absent;

        let deleted = if delta.deleted.is_empty() {
            0
        } else {
            let ids: BTreeSet<IdentityValue> = delta.deleted.iter().cloned().collect();
            let predicate = RowPredicate::IdentityIn {
                field: self.id_field.clone(),
                ids,
            };
            self.engine.delete_rows(&self.store, &predicate).await?
        };

        let rows: FeatureSet = delta.upserts().cloned().collect();
        let upserted = if rows.is_empty() {
            0
        } else {
            self.engine
                .append_or_upsert(&self.store, &rows, &self.id_field, WriteMode::Upsert)
                .await?
        };

        let after = self.engine.count(&self.store).await?;
        let report = ApplyReport {
            before,
            deleted,
            upserted,
            after,
            expected,
        };
        if report.is_consistent() {
            tracing::info!(before, deleted, upserted, after, "Changeset applied to canonical store");
        } else {
            tracing::warn!(
                before,
                deleted,
                upserted,
                after,
                expected,
                "Canonical store row count differs from the changeset prediction"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::geoprocessing::LocalEngine;
    use crate::domain::{ChangeKind, Feature};
    use serde_json::{json, Map};

    fn record(id: i64, name: &str) -> Feature {
        let props = json!({"name": name}).as_object().cloned().unwrap_or_default();
        Feature::new("id", id.into(), Some(Geometry::Point(vec![1.0, 2.0])), props)
    }

    fn deletion(id: i64) -> Feature {
        Feature::new("id", id.into(), None, Map::new()).with_change(ChangeKind::Delete)
    }

    fn synchronizer(dir: &std::path::Path) -> StagingSynchronizer {
        StagingSynchronizer::new(
            Arc::new(LocalEngine::new()),
            StoreLocation::new(dir.join("canonical.geojson")),
            "id",
        )
    }

    #[tokio::test]
    async fn test_replace_all_then_changeset() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());

        let delta = sync
            .replace_all(vec![record(1, "a"), record(2, "b"), record(3, "c")])
            .await
            .unwrap();
        assert_eq!(delta.added.len(), 3);

        let changes = sync
            .classify(vec![
                record(4, "d").with_change(ChangeKind::Insert),
                record(2, "B").with_change(ChangeKind::Update),
                deletion(3),
            ])
            .await
            .unwrap();
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.deleted.len(), 1);

        let report = sync.apply_changeset(&changes).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.after, 3);

        let ids = sync.existing_identities().await.unwrap();
        assert!(ids.contains(&4i64.into()));
        assert!(!ids.contains(&3i64.into()));
    }

    #[tokio::test]
    async fn test_reapplying_changeset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());
        sync.replace_all(vec![record(1, "a"), record(2, "b")]).await.unwrap();

        let records = vec![record(5, "e").with_change(ChangeKind::Insert), deletion(1)];
        let first = sync.classify(records.clone()).await.unwrap();
        sync.apply_changeset(&first).await.unwrap();
        let snapshot = LocalEngine::new()
            .read_features(sync.store(), "id")
            .await
            .unwrap();

        let second = sync.classify(records).await.unwrap();
        assert!(second.added.is_empty());
        assert_eq!(second.updated.len(), 1);
        let report = sync.apply_changeset(&second).await.unwrap();
        assert!(report.is_consistent());

        let again = LocalEngine::new()
            .read_features(sync.store(), "id")
            .await
            .unwrap();
        assert_eq!(snapshot, again);
    }

    #[tokio::test]
    async fn test_changeset_without_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());
        let err = sync.apply_changeset(&SyncDelta::new()).await.unwrap_err();
        assert!(matches!(err, GeosyncError::Reconciliation(_)));
    }

    #[tokio::test]
    async fn test_replace_all_keeps_extent() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());
        let extent = crate::domain::BoundingBox::new(0.0, 0.0, 5.0, 5.0).to_polygon();
        assert!(sync.ensure_store(Some(&extent)).await.unwrap());
        assert!(!sync.ensure_store(None).await.unwrap());

        sync.replace_all(vec![record(1, "a")]).await.unwrap();
        let engine = LocalEngine::new();
        assert_eq!(engine.read_extent(sync.store()).await.unwrap(), Some(extent));
    }
}
