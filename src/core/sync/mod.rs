//! Canonical and target store synchronization

pub mod staging;
pub mod target;

pub use staging::{ApplyReport, StagingSynchronizer};
pub use target::{TargetReconciler, TargetReport};
