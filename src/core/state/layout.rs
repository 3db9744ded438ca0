//! On-disk layout of a dataset directory
//!
//! ```text
//! <data_dir>/<dataset>/
//!     last_updated.json        cursor
//!     full/                    downloaded export archives
//!     changesets/              downloaded changeset payloads
//!     staging/canonical.geojson
//!     logs/
//! ```

use crate::adapters::geoprocessing::StoreLocation;
use crate::domain::context::ResultExt;
use crate::domain::{DatasetName, LayerId, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Paths of one dataset directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    root: PathBuf,
}

impl DatasetPaths {
    /// Layout of `dataset` under `data_dir`
    pub fn new(data_dir: &Path, dataset: &DatasetName) -> Self {
        Self {
            root: data_dir.join(dataset.as_str()),
        }
    }

    /// Dataset directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cursor file
    pub fn cursor_file(&self) -> PathBuf {
        self.root.join("last_updated.json")
    }

    /// Directory of downloaded export archives
    pub fn full_dir(&self) -> PathBuf {
        self.root.join("full")
    }

    /// Directory of downloaded changeset payloads
    pub fn changesets_dir(&self) -> PathBuf {
        self.root.join("changesets")
    }

    /// Directory holding the canonical store
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Per-dataset log directory
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// The canonical store
    pub fn canonical_store(&self) -> StoreLocation {
        StoreLocation::new(self.staging_dir().join("canonical.geojson"))
    }

    /// Destination of an export archive downloaded at `at`
    pub fn archive_file(&self, layer: &LayerId, at: &DateTime<Utc>) -> PathBuf {
        self.full_dir()
            .join(format!("layer_{}_{}.zip", layer, at.format("%Y%m%d_%H%M%S")))
    }

    /// Destination of a changeset payload whose window ends at `at`
    pub fn changeset_file(&self, layer: &LayerId, at: &DateTime<Utc>) -> PathBuf {
        self.changesets_dir()
            .join(format!("layer_{}_{}.json", layer, at.format("%Y%m%dT%H%M%S")))
    }

    /// Creates every directory of the layout
    pub async fn ensure(&self) -> Result<()> {
        for dir in [
            self.full_dir(),
            self.changesets_dir(),
            self.staging_dir(),
            self.logs_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
