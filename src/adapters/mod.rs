//! External system integrations for geosync.
//!
//! This module provides adapters for the two collaborators of a sync run:
//!
//! - [`remote`] - The remote data service (export API and changeset feed)
//! - [`geoprocessing`] - Feature storage and geometry operations
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations. The core only sees the
//! [`remote::ExportService`], [`remote::ChangesetFeed`] and
//! [`geoprocessing::GeoprocessingEngine`] traits.
//!
//! ```rust,no_run
//! use geosync::adapters::geoprocessing::LocalEngine;
//! use geosync::adapters::remote::DataServiceClient;
//! use geosync::config::GeosyncConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GeosyncConfig::from_file("geosync.toml")?;
//! let client = DataServiceClient::new(&config.service)?;
//! let engine = LocalEngine::new();
//! # let _ = (client, engine);
//! # Ok(())
//! # }
//! ```

pub mod geoprocessing;
pub mod remote;
