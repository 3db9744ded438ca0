//! Geoprocessing engine
//!
//! The sync core delegates every feature storage and geometry operation to a
//! [`GeoprocessingEngine`]. [`LocalEngine`] is the bundled implementation over
//! GeoJSON files; it evaluates extent tests with planar geometry and local
//! filters with a small where-clause dialect ([`LocalFilter`]).

pub mod local;
pub mod planar;
pub mod traits;
pub mod where_clause;

pub(crate) use local::write_atomic;
pub use local::LocalEngine;
pub use traits::{
    ArtifactKind, GeoprocessingEngine, RawArtifact, RowPredicate, StoreLocation, WriteMode,
};
pub use where_clause::LocalFilter;
