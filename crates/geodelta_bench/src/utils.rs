//! Benchmark utilities.

use geo_types::{LineString, Point, Polygon};
use geodelta_core::{RepresentativePoint, ToleranceBuffer};
use geodelta_storage::{
    CollectionRef, FeatureStore, FieldDescriptor, GeometryKind, InMemoryStore, NewFeature, RowId,
    Schema,
};
use rand::Rng;

/// Side of the square area random features are scattered over.
pub const EXTENT: f64 = 10_000.0;

/// Generate random coordinates inside the benchmark extent.
pub fn random_coords(count: usize) -> Vec<(f64, f64)> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| (rng.gen_range(0.0..EXTENT), rng.gen_range(0.0..EXTENT)))
        .collect()
}

/// Generate representative points, one per coordinate.
pub fn representative_points(coords: &[(f64, f64)]) -> Vec<RepresentativePoint> {
    coords
        .iter()
        .zip(1u64..)
        .map(|(&(x, y), row)| RepresentativePoint::new(RowId(row), Point::new(x, y)))
        .collect()
}

/// Generate tolerance buffers around every coordinate.
pub fn buffers(coords: &[(f64, f64)], radius: f64) -> Vec<ToleranceBuffer> {
    representative_points(coords)
        .iter()
        .map(|p| ToleranceBuffer::around(p, radius))
        .collect()
}

/// Generate a feature of the given kind anchored at a coordinate.
pub fn feature(kind: GeometryKind, (x, y): (f64, f64)) -> NewFeature {
    let feature = match kind {
        GeometryKind::Polygon => NewFeature::new(Polygon::new(
            LineString::from(vec![(x, y), (x + 5.0, y), (x + 5.0, y + 5.0), (x, y + 5.0), (x, y)]),
            vec![],
        )),
        GeometryKind::Line => {
            NewFeature::new(LineString::from(vec![(x, y), (x + 3.0, y + 4.0), (x + 8.0, y)]))
        }
        GeometryKind::Point => NewFeature::new(Point::new(x, y)),
    };
    feature.with_attribute("NAME", "bench")
}

/// Build a pair of in-memory snapshots where the latest one has
/// `new_features` extra features per collection.
pub fn snapshot_pair(
    collections: usize,
    kind: GeometryKind,
    features: usize,
    new_features: usize,
) -> (InMemoryStore, InMemoryStore) {
    let initial = InMemoryStore::new("initial");
    let latest = InMemoryStore::new("latest");
    let schema = Schema::with_system_fields(vec![FieldDescriptor::text("NAME", 40)]);

    for i in 0..collections {
        let reference = CollectionRef::new(format!("C{:03}", i));
        let coords = random_coords(features + new_features);
        for store in [&initial, &latest] {
            store
                .create_collection(reference.clone(), kind, schema.clone())
                .expect("create bench collection");
        }
        let known: Vec<_> = coords[..features].iter().map(|&c| feature(kind, c)).collect();
        let all: Vec<_> = coords.iter().map(|&c| feature(kind, c)).collect();
        initial
            .append_features(&reference, known)
            .expect("fill initial snapshot");
        latest
            .append_features(&reference, all)
            .expect("fill latest snapshot");
    }
    (initial, latest)
}
