//! Domain models and types for geosync.
//!
//! This module contains the core domain models, types, and rules shared by
//! every stage of a synchronization run.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`DatasetName`], [`LayerId`], [`JobId`], [`IdentityValue`])
//! - **Feature models** ([`Feature`], [`Geometry`], [`BoundingBox`], [`ChangeKind`])
//! - **The classified delta** ([`SyncDelta`])
//! - **Error types** ([`GeosyncError`]) and the [`Result`] alias
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern so a layer id can never be passed where
//! an export job id is expected:
//!
//! ```rust
//! use geosync::domain::{JobId, LayerId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let layer = LayerId::new("50772")?;
//! let job: JobId = "901".parse()?;
//!
//! // let wrong: JobId = layer;  // Compile error!
//! # let _ = (layer, job);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, GeosyncError>`]:
//!
//! ```rust
//! use geosync::domain::{GeosyncError, Result};
//!
//! fn example() -> Result<()> {
//!     let _config = geosync::config::GeosyncConfig::from_file("geosync.toml")?;
//!     Ok(())
//! }
//! # let _ = example();
//! ```

pub mod context;
pub mod delta;
pub mod errors;
pub mod feature;
pub mod ids;
pub mod result;
pub mod timestamp;

// Re-export commonly used types for convenience
pub use delta::SyncDelta;
pub use errors::GeosyncError;
pub use feature::{BoundingBox, ChangeKind, Feature, FeatureSet, Geometry, CHANGE_TAG};
pub use ids::{DatasetName, IdentityValue, JobId, LayerId};
pub use result::Result;
