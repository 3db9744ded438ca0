//! Extent and filter reconciliation
//!
//! Request-time narrowing differs between the two retrieval modes: the export
//! API crops geometries to a polygon, the changeset feed selects by bounding
//! box and accepts either a bbox or a CQL filter, not both. After retrieval a
//! corrective pass drops or deletes every record outside the unbuffered
//! extent or failing the local filter.

use crate::adapters::geoprocessing::{GeoprocessingEngine, LocalFilter, RowPredicate};
use crate::adapters::remote::RequestConstraint;
use crate::config::DatasetConfig;
use crate::domain::{BoundingBox, FeatureSet, Geometry, GeosyncError, Result, SyncDelta};

/// Filters of one dataset, resolved for a run
#[derive(Debug, Clone, PartialEq)]
pub struct FilterReconciler {
    remote_filter: Option<String>,
    local_filter: Option<LocalFilter>,
    bbox: Option<BoundingBox>,
    extent: Option<Geometry>,
    buffer_distance: f64,
}

impl FilterReconciler {
    /// Creates a reconciler from explicit parts
    pub fn new(
        remote_filter: Option<String>,
        local_filter: Option<LocalFilter>,
        bbox: Option<BoundingBox>,
        extent: Option<Geometry>,
        buffer_distance: f64,
    ) -> Self {
        Self {
            remote_filter,
            local_filter,
            bbox,
            extent,
            buffer_distance,
        }
    }

    /// Resolves the filters of a dataset
    ///
    /// `extent` is the configured extent, or the canonical store's extent slot
    /// when none is configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the filters cannot be parsed or both
    /// an explicit bbox and a remote filter are set.
    pub fn from_config(dataset: &DatasetConfig, extent: Option<Geometry>) -> Result<Self> {
        let remote_filter = dataset.remote_filter().map(str::to_string);
        let bbox = dataset.request_bbox().map_err(GeosyncError::Configuration)?;
        if remote_filter.is_some() && bbox.is_some() {
            return Err(GeosyncError::Configuration(
                "bbox and remote_filter cannot both be set".to_string(),
            ));
        }
        let local_filter = dataset
            .local_filter()
            .map(LocalFilter::parse)
            .transpose()
            .map_err(|e| GeosyncError::Configuration(format!("local_filter: {e}")))?;
        if let Some(geometry) = &extent {
            if !geometry.is_polygonal() {
                return Err(GeosyncError::Configuration(
                    "Extent must be a Polygon or MultiPolygon".to_string(),
                ));
            }
        }
        for warning in dataset.warnings() {
            tracing::warn!("{warning}");
        }
        Ok(Self::new(
            remote_filter,
            local_filter,
            bbox,
            extent,
            dataset.buffer_distance,
        ))
    }

    /// Extent polygon used for post-filtering
    pub fn extent(&self) -> Option<&Geometry> {
        self.extent.as_ref()
    }

    /// Constraint sent with a changeset request
    ///
    /// At most one constraint is sent. A remote filter wins; the extent is then
    /// only applied after retrieval. Otherwise an explicit bbox, then the
    /// unbuffered extent envelope, is used.
    pub fn request_filter(&self) -> RequestConstraint {
        if let Some(filter) = &self.remote_filter {
            return RequestConstraint::Filter(filter.clone());
        }
        if let Some(bbox) = self.bbox {
            return RequestConstraint::BoundingBox(bbox);
        }
        match self.extent.as_ref().and_then(Geometry::envelope) {
            Some(envelope) => RequestConstraint::BoundingBox(envelope),
            None => RequestConstraint::None,
        }
    }

    /// Crop rectangle sent with an export request
    ///
    /// The extent envelope is grown by the buffer distance so geometries
    /// crossing the extent are not clipped short; the post-filter later
    /// removes what lies outside the unbuffered extent.
    pub fn export_extent(&self, engine: &dyn GeoprocessingEngine) -> Result<Option<BoundingBox>> {
        match &self.extent {
            Some(extent) => engine
                .buffered_envelope(extent, self.buffer_distance)
                .map(Some),
            None => Ok(self.bbox),
        }
    }

    /// Corrective predicates selecting records to remove
    pub fn post_predicates(&self) -> Vec<RowPredicate> {
        let mut predicates = Vec::new();
        if let Some(extent) = &self.extent {
            predicates.push(RowPredicate::NotIntersecting(extent.clone()));
        }
        if let Some(filter) = &self.local_filter {
            predicates.push(RowPredicate::NotMatching(filter.clone()));
        }
        predicates
    }

    /// Drops records of a full retrieval that fail the corrective filters
    ///
    /// # Returns
    ///
    /// Returns the kept records and the number dropped.
    pub fn post_filter_full(
        &self,
        engine: &dyn GeoprocessingEngine,
        features: FeatureSet,
    ) -> (FeatureSet, usize) {
        let predicates = self.post_predicates();
        if predicates.is_empty() {
            return (features, 0);
        }
        let before = features.len();
        let kept: FeatureSet = features
            .into_iter()
            .filter(|f| !predicates.iter().any(|p| engine.evaluate(p, f)))
            .collect();
        let dropped = before - kept.len();
        if dropped > 0 {
            tracing::info!(dropped, kept = kept.len(), "Post-filter removed records");
        }
        (kept, dropped)
    }

    /// Turns changeset upserts that fail the corrective filters into deletions
    ///
    /// A record that moved out of the extent or stopped matching the local
    /// filter must leave the canonical store.
    ///
    /// # Returns
    ///
    /// Returns the number of records demoted.
    pub fn post_filter_delta(&self, engine: &dyn GeoprocessingEngine, delta: &mut SyncDelta) -> usize {
        let predicates = self.post_predicates();
        if predicates.is_empty() {
            return 0;
        }
        let failing: Vec<_> = delta
            .upserts()
            .filter(|f| predicates.iter().any(|p| engine.evaluate(p, f)))
            .map(|f| f.identity.clone())
            .collect();
        for id in &failing {
            delta.demote_to_deletion(id);
        }
        if !failing.is_empty() {
            tracing::info!(demoted = failing.len(), "Post-filter turned records into deletions");
        }
        failing.len()
    }
}
