//! Synchronization pipeline
//!
//! [`SyncCoordinator`] wires the cursor, export poller, retrieval adapter,
//! filter reconciler and store synchronizers into one run per invocation.

pub mod coordinator;
pub mod summary;

pub use coordinator::{Clock, SyncCoordinator, SyncMode, SyncOutcome};
pub use summary::SyncSummary;
