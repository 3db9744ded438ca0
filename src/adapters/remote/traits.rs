//! Remote service abstraction traits
//!
//! The sync core talks to the remote data service only through these traits,
//! so runs can be driven by the HTTP client or by in-memory fakes.

use crate::adapters::remote::models::{ChangesetQuery, ExportRequest, ExportStatus};
use crate::domain::{JobId, Result};
use async_trait::async_trait;
use std::path::Path;

/// Asynchronous full-export protocol
#[async_trait]
pub trait ExportService: Send + Sync {
    /// Asks the service whether the export request is acceptable
    ///
    /// # Errors
    ///
    /// Returns a retrieval error carrying the raw response when any item is
    /// reported invalid.
    async fn validate_export(&self, request: &ExportRequest) -> Result<()>;

    /// Creates an export job
    ///
    /// # Returns
    ///
    /// Returns the initial status, including the job identifier.
    async fn create_export(&self, request: &ExportRequest) -> Result<ExportStatus>;

    /// Fetches the current status of a job
    async fn export_status(&self, id: &JobId) -> Result<ExportStatus>;

    /// Streams the prepared artifact of a ready job to `dest`
    ///
    /// # Returns
    ///
    /// Returns the number of bytes written.
    async fn download_export(&self, status: &ExportStatus, dest: &Path) -> Result<u64>;
}

/// Synchronous changeset feed
#[async_trait]
pub trait ChangesetFeed: Send + Sync {
    /// Streams the changeset payload for the query window to `dest`
    ///
    /// The payload is written as received; callers sniff it for error
    /// documents.
    ///
    /// # Returns
    ///
    /// Returns the number of bytes written.
    async fn fetch_changeset(&self, query: &ChangesetQuery, dest: &Path) -> Result<u64>;
}
