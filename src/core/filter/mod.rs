//! Spatial and attribute filter reconciliation

pub mod reconciler;

pub use reconciler::FilterReconciler;
