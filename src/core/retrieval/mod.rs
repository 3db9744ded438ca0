//! Retrieval adapter
//!
//! Turns downloaded artifacts into feature sets. Full retrievals wrap the
//! archive produced by the export poller; changeset retrievals stream the feed
//! response to disk, sniff it for error documents, and convert it.

pub mod payload;

use crate::adapters::geoprocessing::{GeoprocessingEngine, RawArtifact};
use crate::adapters::remote::{ChangesetFeed, ChangesetQuery};
use crate::domain::{FeatureSet, GeosyncError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

pub use payload::{reject_payload, sniff_payload, PayloadKind};

/// Features read from one downloaded artifact
#[derive(Debug, Clone)]
pub struct Retrieved {
    /// Artifact the features came from
    pub artifact: RawArtifact,
    /// SHA-256 of the artifact, hex encoded
    pub digest: String,
    /// Converted records; empty for an empty changeset
    pub features: FeatureSet,
}

impl Retrieved {
    /// True when the artifact held no records
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Hex SHA-256 digest of a file
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Reads the features of a downloaded export archive
pub async fn retrieve_full(
    engine: &dyn GeoprocessingEngine,
    archive: &Path,
    id_field: &str,
) -> Result<Retrieved> {
    let artifact = RawArtifact::archive(archive);
    let digest = sha256_file(archive).await?;
    tracing::info!(artifact = %archive.display(), sha256 = %digest, "Reading export archive");
    let features = engine.convert_to_features(&artifact, id_field).await?;
    Ok(Retrieved {
        artifact,
        digest,
        features,
    })
}

/// Downloads the changeset for `query` to `dest` and reads it
///
/// # Errors
///
/// Returns a retrieval error when the feed fails or answers with an error
/// document; the raw body is attached.
pub async fn retrieve_changeset(
    feed: &dyn ChangesetFeed,
    engine: &dyn GeoprocessingEngine,
    query: &ChangesetQuery,
    dest: &Path,
    id_field: &str,
) -> Result<Retrieved> {
    let bytes = feed.fetch_changeset(query, dest).await?;
    tracing::info!(path = %dest.display(), bytes, "Changeset downloaded");
    read_changeset(engine, dest, id_field).await
}

/// Reads a changeset payload already on disk
pub async fn read_changeset(
    engine: &dyn GeoprocessingEngine,
    path: &Path,
    id_field: &str,
) -> Result<Retrieved> {
    let artifact = RawArtifact::changeset(path);
    let digest = sha256_file(path).await?;
    tracing::info!(artifact = %path.display(), sha256 = %digest, "Reading changeset payload");

    let features = match sniff_payload(path).await? {
        PayloadKind::Empty => {
            tracing::info!("Changeset holds no features");
            Vec::new()
        }
        PayloadKind::Features { count } => {
            tracing::debug!(count, "Changeset payload holds features");
            match engine.convert_to_features(&artifact, id_field).await {
                Ok(features) => features,
                Err(GeosyncError::Serialization(message)) => {
                    return Err(reject_payload(
                        path,
                        format!("Changeset holds malformed features: {message}"),
                    )
                    .await)
                }
                Err(e) => return Err(e),
            }
        }
    };
    Ok(Retrieved {
        artifact,
        digest,
        features,
    })
}
