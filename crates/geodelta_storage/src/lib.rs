//! # geodelta storage
//!
//! Feature model, store trait and store backends for geodelta.
//!
//! A feature store holds collections of geospatial features. Every
//! collection has one geometry kind, an ordered attribute schema and
//! features addressed by row id. The synchronization engine sees stores
//! only through [`FeatureStore`].
//!
//! ## Design Principles
//!
//! - Stores know nothing about synchronization
//! - Deletes are scoped to explicit row ids
//! - Appends validate the whole batch before writing
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For testing and ephemeral snapshots
//! - [`FileStore`] - Directory-backed persistent snapshots
//!
//! ## Example
//!
//! ```rust
//! use geodelta_storage::{CollectionRef, FeatureStore, GeometryKind, InMemoryStore, Schema};
//!
//! let store = InMemoryStore::new("initial");
//! store
//!     .create_collection(
//!         CollectionRef::new("ROADS"),
//!         GeometryKind::Line,
//!         Schema::with_system_fields(vec![]),
//!     )
//!     .unwrap();
//! assert_eq!(store.list_collections().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod feature;
mod file;
mod memory;
mod model;
mod schema;
mod store;

pub use collection::CollectionData;
pub use error::{StoreError, StoreResult};
pub use feature::{parse_wkt, to_wkt, Feature, NewFeature};
pub use file::{FileStore, MANIFEST_MAGIC};
pub use memory::InMemoryStore;
pub use model::{CollectionInfo, CollectionRef, GeometryKind, RowId, Value};
pub use schema::{FieldDescriptor, FieldType, Schema};
pub use store::{FeatureStore, CURRENT_FORMAT_VERSION};
