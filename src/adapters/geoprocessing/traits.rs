//! Geoprocessing engine abstraction
//!
//! This module defines the capability the sync core needs from a feature
//! storage engine: converting downloaded artifacts into features and reading
//! or mutating feature stores. The core never touches store files directly.

use crate::adapters::geoprocessing::LocalFilter;
use crate::domain::{BoundingBox, Feature, FeatureSet, Geometry, IdentityValue, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Location of a feature store managed by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation(PathBuf);

impl StoreLocation {
    /// Creates a store location
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Path of the store
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Kind of downloaded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Zip archive produced by a full export
    ExportArchive,
    /// Feature collection returned by the changeset feed
    ChangesetPayload,
}

/// Artifact on local disk waiting to be converted into features
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    /// Path of the artifact
    pub path: PathBuf,
    /// What the artifact holds
    pub kind: ArtifactKind,
}

impl RawArtifact {
    /// Full export archive at `path`
    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::ExportArchive,
        }
    }

    /// Changeset payload at `path`
    pub fn changeset(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::ChangesetPayload,
        }
    }
}

/// How [`GeoprocessingEngine::append_or_upsert`] treats existing rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert every feature as a new row
    Append,
    /// Replace attributes of rows with a matching identity in place, insert the rest
    Upsert,
}

/// Row selection for deletes and post-filtering
#[derive(Debug, Clone, PartialEq)]
pub enum RowPredicate {
    /// Every row
    All,
    /// Rows whose identity field holds one of the values
    IdentityIn {
        /// Identity field name
        field: String,
        /// Identity values to match
        ids: BTreeSet<IdentityValue>,
    },
    /// Rows whose geometry does not intersect the polygon
    ///
    /// Rows without geometry never intersect.
    NotIntersecting(Geometry),
    /// Rows whose attributes fail the filter
    NotMatching(LocalFilter),
}

/// Geoprocessing engine capability
///
/// Implementations must make each mutating call atomic: after an error the
/// store holds either the old or the new content, never a mix.
#[async_trait]
pub trait GeoprocessingEngine: Send + Sync {
    /// Converts a downloaded artifact into features
    ///
    /// # Arguments
    ///
    /// * `artifact` - Archive or changeset payload on disk
    /// * `id_field` - Identity field every record must carry
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read or a record has no
    /// usable identity.
    async fn convert_to_features(&self, artifact: &RawArtifact, id_field: &str) -> Result<FeatureSet>;

    /// Returns `true` when the store exists
    async fn exists(&self, store: &StoreLocation) -> Result<bool>;

    /// Creates an empty store, optionally holding an extent polygon
    ///
    /// # Errors
    ///
    /// Returns an error if a store already exists at the location.
    async fn create_store(&self, store: &StoreLocation, extent: Option<&Geometry>) -> Result<()>;

    /// Number of rows in the store
    async fn count(&self, store: &StoreLocation) -> Result<usize>;

    /// Reads every row of the store
    async fn read_features(&self, store: &StoreLocation, id_field: &str) -> Result<FeatureSet>;

    /// Reads the extent polygon slot
    async fn read_extent(&self, store: &StoreLocation) -> Result<Option<Geometry>>;

    /// Replaces the extent polygon slot
    async fn write_extent(&self, store: &StoreLocation, extent: Option<&Geometry>) -> Result<()>;

    /// Removes every row, keeping the store and its extent
    async fn truncate(&self, store: &StoreLocation) -> Result<()>;

    /// Deletes the rows selected by the predicate
    ///
    /// # Returns
    ///
    /// Returns the number of rows removed. Deleting absent rows is not an error.
    async fn delete_rows(&self, store: &StoreLocation, predicate: &RowPredicate) -> Result<usize>;

    /// Appends or upserts features keyed by `match_field`
    ///
    /// # Returns
    ///
    /// Returns the number of rows written.
    async fn append_or_upsert(
        &self,
        store: &StoreLocation,
        features: &[Feature],
        match_field: &str,
        mode: WriteMode,
    ) -> Result<usize>;

    /// Evaluates a predicate against one feature without touching a store
    fn evaluate(&self, predicate: &RowPredicate, feature: &Feature) -> bool;

    /// Envelope of the geometry grown by `distance` on every side
    ///
    /// # Errors
    ///
    /// Returns an error for an empty geometry.
    fn buffered_envelope(&self, geometry: &Geometry, distance: f64) -> Result<BoundingBox>;
}
