//! Geometry and snapshot fixtures.
//!
//! Parcels are 10 x 10 squares laid out on a 20-unit pitch, so neighbouring
//! centroids are far apart compared to any tolerance used in tests.

use geo_types::{LineString, Point, Polygon};
use geodelta_storage::{
    CollectionRef, FeatureStore, FieldDescriptor, FileStore, GeometryKind, InMemoryStore,
    NewFeature, Schema, StoreResult,
};
use std::path::Path;
use tempfile::TempDir;

/// Side of a fixture parcel.
pub const PARCEL_SIZE: f64 = 10.0;

/// Distance between neighbouring parcel origins.
pub const PARCEL_PITCH: f64 = 20.0;

/// Axis-aligned square with its lower-left corner at `(x, y)`.
#[must_use]
pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ]),
        vec![],
    )
}

/// A parcel feature with `LOT_NO` and `OWNER` attributes.
#[must_use]
pub fn parcel(x: f64, y: f64, lot: i64) -> NewFeature {
    NewFeature::new(square(x, y, PARCEL_SIZE))
        .with_attribute("LOT_NO", lot)
        .with_attribute("OWNER", format!("owner-{}", lot))
}

/// `rows * cols` parcels starting at `(x, y)`, numbered from 1.
#[must_use]
pub fn parcel_grid(x: f64, y: f64, rows: usize, cols: usize) -> Vec<NewFeature> {
    let mut out = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let lot = (r * cols + c + 1) as i64;
            out.push(parcel(
                x + c as f64 * PARCEL_PITCH,
                y + r as f64 * PARCEL_PITCH,
                lot,
            ));
        }
    }
    out
}

/// Straight road segment from `(x, y)` running `length` units east.
#[must_use]
pub fn road(x: f64, y: f64, length: f64, name: &str) -> NewFeature {
    NewFeature::new(LineString::from(vec![(x, y), (x + length, y)])).with_attribute("NAME", name)
}

/// Point feature with a `NAME` attribute.
#[must_use]
pub fn well(x: f64, y: f64, name: &str) -> NewFeature {
    NewFeature::new(Point::new(x, y)).with_attribute("NAME", name)
}

/// Schema of fixture parcels.
#[must_use]
pub fn parcel_schema() -> Schema {
    Schema::with_system_fields(vec![
        FieldDescriptor::integer("LOT_NO"),
        FieldDescriptor::text("OWNER", 60),
    ])
}

/// Schema of fixture roads and wells.
#[must_use]
pub fn named_schema() -> Schema {
    Schema::with_system_fields(vec![FieldDescriptor::text("NAME", 40)])
}

/// Builds an in-memory snapshot collection by collection.
#[derive(Debug)]
pub struct SnapshotBuilder {
    store: InMemoryStore,
}

impl SnapshotBuilder {
    /// Starts an empty snapshot.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            store: InMemoryStore::new(name),
        }
    }

    /// Adds a collection with the given contents.
    ///
    /// # Panics
    ///
    /// Panics if the collection exists or the features do not fit it.
    #[must_use]
    pub fn collection(
        self,
        reference: CollectionRef,
        kind: GeometryKind,
        schema: Schema,
        features: Vec<NewFeature>,
    ) -> Self {
        self.store
            .create_collection(reference.clone(), kind, schema)
            .expect("create fixture collection");
        if !features.is_empty() {
            self.store
                .append_features(&reference, features)
                .expect("append fixture features");
        }
        self
    }

    /// Adds a standalone polygon collection with the parcel schema.
    #[must_use]
    pub fn parcels(self, name: &str, features: Vec<NewFeature>) -> Self {
        self.collection(CollectionRef::new(name), GeometryKind::Polygon, parcel_schema(), features)
    }

    /// Adds a standalone line collection with the named schema.
    #[must_use]
    pub fn lines(self, name: &str, features: Vec<NewFeature>) -> Self {
        self.collection(CollectionRef::new(name), GeometryKind::Line, named_schema(), features)
    }

    /// Adds a standalone point collection with the named schema.
    #[must_use]
    pub fn points(self, name: &str, features: Vec<NewFeature>) -> Self {
        self.collection(CollectionRef::new(name), GeometryKind::Point, named_schema(), features)
    }

    /// Finishes the snapshot.
    #[must_use]
    pub fn build(self) -> InMemoryStore {
        self.store
    }
}

/// Copies every collection of `source` into a new file store at `root`.
///
/// Row ids are reassigned by the target.
pub fn write_file_store(source: &dyn FeatureStore, root: &Path) -> StoreResult<FileStore> {
    let target = FileStore::create(root)?;
    for info in source.list_collections()? {
        target.create_collection(
            info.reference.clone(),
            info.kind,
            source.schema(&info.reference)?,
        )?;
        let features: Vec<NewFeature> = source
            .read_features(&info.reference)?
            .into_iter()
            .map(|f| NewFeature {
                geometry: f.geometry,
                attributes: f.attributes,
            })
            .collect();
        if !features.is_empty() {
            target.append_features(&info.reference, features)?;
        }
    }
    target.flush()?;
    Ok(target)
}

/// A temporary directory for file stores and scratch workspaces.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}
