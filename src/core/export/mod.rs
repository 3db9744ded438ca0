//! Full export retrieval
//!
//! The export API is asynchronous: a job is requested, polled until the
//! service has prepared the artifact, then downloaded. [`ExportJob`] holds the
//! state machine and [`JobPoller`] drives it.

pub mod job;
pub mod poller;

pub use job::{ExportJob, JobState};
pub use poller::JobPoller;
