//! Target store reconciler
//!
//! Mirrors the canonical store into an optional downstream store. A full
//! retrieval replaces every target row; a changeset deletes then upserts.

use crate::adapters::geoprocessing::{GeoprocessingEngine, RowPredicate, StoreLocation, WriteMode};
use crate::config::TargetConfig;
use crate::domain::{Feature, GeosyncError, Result, SyncDelta};
use std::path::Path;
use std::sync::Arc;

/// Rows touched in the target store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetReport {
    /// Rows removed
    pub deleted: usize,
    /// Rows inserted or replaced
    pub written: usize,
}

/// Propagates the synchronized result into a target store
pub struct TargetReconciler {
    engine: Arc<dyn GeoprocessingEngine>,
    store: StoreLocation,
    id_field: String,
    fast_clear_unsafe: bool,
}

impl TargetReconciler {
    /// Creates a reconciler
    ///
    /// # Arguments
    ///
    /// * `store` - Target store location
    /// * `id_field` - Identity field shared with the canonical store
    /// * `fast_clear_unsafe` - Clear with a row delete instead of a truncate
    pub fn new(
        engine: Arc<dyn GeoprocessingEngine>,
        store: StoreLocation,
        id_field: impl Into<String>,
        fast_clear_unsafe: bool,
    ) -> Self {
        Self {
            engine,
            store,
            id_field: id_field.into(),
            fast_clear_unsafe,
        }
    }

    /// Creates a reconciler from the dataset's target section
    ///
    /// Relative locations resolve against `base_dir`.
    pub fn from_config(
        engine: Arc<dyn GeoprocessingEngine>,
        target: &TargetConfig,
        id_field: &str,
        base_dir: &Path,
    ) -> Self {
        let location = if target.location.is_absolute() {
            target.location.clone()
        } else {
            base_dir.join(&target.location)
        };
        Self::new(
            engine,
            StoreLocation::new(location),
            id_field,
            target.fast_clear_unsafe,
        )
    }

    /// Target store location
    pub fn store(&self) -> &StoreLocation {
        &self.store
    }

    /// Replaces every target row with the canonical store content
    ///
    /// # Errors
    ///
    /// Returns a reconciliation error when the target is missing or the
    /// engine rejects a write.
    pub async fn replace_all(&self, canonical: &StoreLocation) -> Result<TargetReport> {
        self.require_target().await?;
        let rows = self
            .engine
            .read_features(canonical, &self.id_field)
            .await
            .map_err(|e| self.rejected("read canonical store", e))?;

        let deleted = if self.fast_clear_unsafe {
            self.engine
                .delete_rows(&self.store, &RowPredicate::All)
                .await
                .map_err(|e| self.rejected("delete rows", e))?
        } else {
            let before = self.engine.count(&self.store).await.map_err(|e| self.rejected("count", e))?;
            self.engine
                .truncate(&self.store)
                .await
                .map_err(|e| self.rejected("truncate", e))?;
            before
        };

        let written = self
            .engine
            .append_or_upsert(&self.store, &rows, &self.id_field, WriteMode::Append)
            .await
            .map_err(|e| self.rejected("append", e))?;

        tracing::info!(
            target_store = %self.store,
            deleted,
            written,
            row_delete = self.fast_clear_unsafe,
            "Target store replaced"
        );
        Ok(TargetReport { deleted, written })
    }

    /// Deletes the delta's removed identities, then upserts the rest
    pub async fn delete_then_upsert(&self, delta: &SyncDelta) -> Result<TargetReport> {
        self.require_target().await?;

        let deleted = if delta.deleted.is_empty() {
            0
        } else {
            let predicate = RowPredicate::IdentityIn {
                field: self.id_field.clone(),
                ids: delta.deleted.clone(),
            };
            self.engine
                .delete_rows(&self.store, &predicate)
                .await
                .map_err(|e| self.rejected("delete rows", e))?
        };

        let rows: Vec<Feature> = delta.upserts().cloned().collect();
        let written = if rows.is_empty() {
            0
        } else {
            self.engine
                .append_or_upsert(&self.store, &rows, &self.id_field, WriteMode::Upsert)
                .await
                .map_err(|e| self.rejected("upsert", e))?
        };

        tracing::info!(target_store = %self.store, deleted, written, "Target store updated");
        Ok(TargetReport { deleted, written })
    }

    async fn require_target(&self) -> Result<()> {
        let exists = self
            .engine
            .exists(&self.store)
            .await
            .map_err(|e| self.rejected("open", e))?;
        if !exists {
            return Err(GeosyncError::Reconciliation(format!(
                "Target store {} does not exist",
                self.store
            )));
        }
        Ok(())
    }

    fn rejected(&self, action: &str, error: GeosyncError) -> GeosyncError {
        match error {
            GeosyncError::Reconciliation(_) => error,
            other => GeosyncError::Reconciliation(format!(
                "Target store {} rejected {action}: {other}",
                self.store
            )),
        }
    }
}
