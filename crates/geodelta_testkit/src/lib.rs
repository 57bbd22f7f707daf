//! # geodelta testkit
//!
//! Test utilities for geodelta.
//!
//! This crate provides:
//! - Geometry and snapshot fixtures
//! - Property-based test generators using proptest
//! - A store wrapper that injects per-collection failures
//!
//! ## Usage
//!
//! ```rust
//! use geodelta_testkit::prelude::*;
//! use geodelta_storage::FeatureStore;
//!
//! let store = SnapshotBuilder::new("initial")
//!     .parcels("PARCELS", parcel_grid(0.0, 0.0, 2, 5))
//!     .build();
//! assert_eq!(store.list_collections().unwrap()[0].feature_count, 10);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
