//! # geodelta core
//!
//! Spatial delta detection and incremental merge between two snapshots of
//! a feature store.
//!
//! The *initial* snapshot has already been delivered downstream; the
//! *latest* snapshot is a fresh extract. The engine finds latest features
//! with no geometric counterpart in the initial snapshot and appends
//! exactly those to it. Row ids are not stable across extracts, so
//! identity is positional: each feature is reduced to a representative
//! point and compared against tolerance buffers around the initial
//! snapshot's points.
//!
//! ## Components
//!
//! - [`collapse`] - features to representative points and buffers
//! - [`diff`] - latest points outside every initial buffer
//! - [`FieldMap`] - which attributes may be transferred
//! - [`merge_collection`] - candidate selection, duplicate suppression,
//!   delete and append
//! - [`SyncEngine`] - phases, worker pool and scratch workspace
//!
//! ## Re-running
//!
//! A run is safe to repeat. Features merged by one run fall inside the
//! initial snapshot's buffers on the next and are not detected again.
//!
//! ## Example
//!
//! ```rust
//! use geodelta_core::{SyncConfig, SyncEngine};
//! use geodelta_storage::{CollectionRef, FeatureStore, GeometryKind, InMemoryStore, NewFeature, Schema};
//! use geo_types::point;
//!
//! let initial = InMemoryStore::new("initial");
//! let latest = InMemoryStore::new("latest");
//! let wells = CollectionRef::new("WELLS");
//! for store in [&initial, &latest] {
//!     store
//!         .create_collection(wells.clone(), GeometryKind::Point, Schema::with_system_fields(vec![]))
//!         .unwrap();
//!     store
//!         .append_features(&wells, vec![NewFeature::new(point!(x: 0.0, y: 0.0))])
//!         .unwrap();
//! }
//! latest
//!     .append_features(&wells, vec![NewFeature::new(point!(x: 50.0, y: 50.0))])
//!     .unwrap();
//!
//! let report = SyncEngine::new(SyncConfig::default()).run(&initial, &latest).unwrap();
//! assert_eq!(report.deltas[0].new_features, 1);
//! assert_eq!(initial.read_features(&wells).unwrap().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collaborators;
mod collapse;
mod config;
mod diff;
mod engine;
mod error;
mod field_map;
pub mod geometry;
mod merge;
mod pattern;
mod pool;
mod report;
mod scratch;

pub use collaborators::{BulkCopier, ReportSink, SchemaUpgrader};
pub use collapse::{collapse, representative_points, CollapseOutcome};
pub use config::SyncConfig;
pub use diff::{diff, new_points, BufferIndex};
pub use engine::{catalogue, plan, CollectionPair, RunPlan, SyncEngine};
pub use error::{
    CollectionError, CollectionErrorKind, CollectionResult, Operation, SyncError, SyncResult,
};
pub use field_map::{FieldMap, FieldMapping, EXCLUDED_FIELDS};
pub use merge::{
    find_duplicates, merge_collection, select_candidates, MergeTarget, MergeTolerances,
    WriterLocks,
};
pub use pattern::NamePattern;
pub use pool::{worker_count, WorkerPool};
pub use report::{DeltaRecord, MergeOutcome, RunFailure, SyncReport};
pub use scratch::{
    ArtifactKey, ArtifactKind, RepresentativePoint, ScratchWorkspace, SnapshotRole,
    ToleranceBuffer,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
