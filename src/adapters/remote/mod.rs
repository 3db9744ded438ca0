//! Remote data service adapter
//!
//! Two protocols are exposed by the service: an asynchronous export API
//! ([`ExportService`]: validate, create, poll, download) and a synchronous
//! WFS changeset feed ([`ChangesetFeed`]). [`DataServiceClient`] implements
//! both over HTTP.

pub mod client;
pub mod models;
pub mod traits;

pub use client::DataServiceClient;
pub use models::{
    ChangesetQuery, ExportPhase, ExportRequest, ExportStatus, ExportValidation, RequestConstraint,
};
pub use traits::{ChangesetFeed, ExportService};
