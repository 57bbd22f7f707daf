//! Behavioural properties of a synchronization run.

use geodelta_core::{
    new_points, BufferIndex, FieldMap, Operation, RepresentativePoint, SyncConfig, SyncEngine,
    SyncReport, ToleranceBuffer,
};
use geodelta_storage::{CollectionRef, FeatureStore, InMemoryStore, RowId, Value};
use geodelta_testkit::prelude::*;
use geo_types::{Geometry, Point};
use proptest::prelude::*;

fn run(initial: &dyn FeatureStore, latest: &dyn FeatureStore) -> SyncReport {
    SyncEngine::new(SyncConfig::default())
        .run(initial, latest)
        .expect("run should not fail")
}

fn count(store: &dyn FeatureStore, name: &str) -> usize {
    store
        .read_features(&CollectionRef::new(name))
        .expect("collection exists")
        .len()
}

fn twelve_parcels() -> (InMemoryStore, InMemoryStore) {
    let initial = SnapshotBuilder::new("initial")
        .parcels("PARCELS", parcel_grid(0.0, 0.0, 2, 5))
        .build();
    let mut latest_features = parcel_grid(0.0, 0.0, 2, 5);
    latest_features.push(parcel(200.0, 0.0, 11));
    latest_features.push(parcel(220.0, 0.0, 12));
    let latest = SnapshotBuilder::new("latest")
        .parcels("PARCELS", latest_features)
        .build();
    (initial, latest)
}

#[test]
fn parcels_scenario_detects_two_and_merges() {
    let (initial, latest) = twelve_parcels();

    let report = run(&initial, &latest);
    assert_eq!(report.deltas.len(), 1);
    assert_eq!(report.deltas[0].collection, "PARCELS");
    assert_eq!(report.deltas[0].new_features, 2);
    assert_eq!(report.deltas[0].to_string(), "PARCELS,2");
    assert_eq!(report.merges[0].appended, 2);
    assert_eq!(report.merges[0].deleted, 0);
    assert_eq!(report.merges[0].field_count, 2);
    assert!(report.is_clean());
    assert_eq!(count(&initial, "PARCELS"), 12);

    let merged = initial.read_features(&CollectionRef::new("PARCELS")).unwrap();
    let lots: Vec<_> = merged[10..].iter().map(|f| f.attributes["LOT_NO"].clone()).collect();
    assert_eq!(lots, vec![Value::Integer(11), Value::Integer(12)]);
}

#[test]
fn rerun_is_idempotent() {
    let (initial, latest) = twelve_parcels();
    run(&initial, &latest);

    let second = run(&initial, &latest);
    assert!(second.deltas.is_empty());
    assert!(second.merges.is_empty());
    assert_eq!(second.unchanged, vec!["PARCELS".to_string()]);
    assert_eq!(count(&initial, "PARCELS"), 12);
}

#[test]
fn merged_polygon_not_reselected_after_small_shift() {
    let (initial, latest) = twelve_parcels();
    run(&initial, &latest);

    // Nudge the merged parcels by less than the duplicate tolerance
    let mut nudged = parcel_grid(0.0, 0.0, 2, 5);
    nudged.push(parcel(200.15, 0.0, 11));
    nudged.push(parcel(220.0, 0.1, 12));
    let latest = SnapshotBuilder::new("latest").parcels("PARCELS", nudged).build();

    let report = run(&initial, &latest);
    assert!(report.deltas.is_empty());
    assert_eq!(count(&initial, "PARCELS"), 12);
}

#[test]
fn relocated_polygon_replaces_its_duplicate() {
    let initial = SnapshotBuilder::new("initial")
        .parcels("PARCELS", vec![parcel(0.0, 0.0, 1), parcel(40.0, 0.0, 2)])
        .build();
    // Parcel 1 moved a full unit: outside the buffer, but it still covers
    // the old centroid well inside its boundary
    let latest = SnapshotBuilder::new("latest")
        .parcels("PARCELS", vec![parcel(1.0, 0.0, 1), parcel(40.0, 0.0, 2)])
        .build();

    let report = run(&initial, &latest);
    assert_eq!(report.deltas[0].new_features, 1);
    assert_eq!(report.merges[0].deleted, 1);
    assert_eq!(report.merges[0].appended, 1);

    let features = initial.read_features(&CollectionRef::new("PARCELS")).unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].row_id, RowId(2));
    assert_eq!(features[1].geometry, Geometry::from(square(1.0, 0.0, PARCEL_SIZE)));

    assert!(run(&initial, &latest).deltas.is_empty());
}

#[test]
fn tolerance_boundary_is_inclusive() {
    let eps = 1.0 / 1_048_576.0;
    let initial = SnapshotBuilder::new("initial")
        .points("WELLS", vec![well(100.0, 200.0, "origin")])
        .build();
    let latest = SnapshotBuilder::new("latest")
        .points(
            "WELLS",
            vec![
                well(100.0, 200.0, "origin"),
                well(100.5 - eps, 200.0, "inside"),
                well(100.0, 200.5, "boundary"),
                well(100.0, 199.5 - eps, "outside"),
            ],
        )
        .build();

    let report = run(&initial, &latest);
    assert_eq!(report.delta("WELLS").map(|d| d.new_features), Some(1));

    let features = initial.read_features(&CollectionRef::new("WELLS")).unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[1].geometry, Geometry::Point(Point::new(100.0, 199.5 - eps)));
    assert_eq!(features[1].attributes["NAME"], Value::from("outside"));
}

#[test]
fn failed_collapse_does_not_affect_siblings() {
    let initial = SnapshotBuilder::new("initial")
        .parcels("A", vec![parcel(0.0, 0.0, 1)])
        .parcels("B", vec![parcel(0.0, 0.0, 1)])
        .build();
    let latest = FaultInjectingStore::new(
        SnapshotBuilder::new("latest")
            .parcels("A", vec![parcel(0.0, 0.0, 1), parcel(100.0, 0.0, 2)])
            .parcels("B", vec![parcel(0.0, 0.0, 1), parcel(100.0, 0.0, 2)])
            .build(),
    )
    .with_fault(Fault::Read, "A");

    let report = run(&initial, &latest);

    assert!(report.failed("A"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].operation, Operation::Collapse);
    assert!(report.delta("A").is_none());

    assert_eq!(report.delta("B").map(|d| d.new_features), Some(1));
    assert_eq!(count(&initial, "A"), 1);
    assert_eq!(count(&initial, "B"), 2);
}

#[test]
fn failed_append_does_not_affect_siblings() {
    let initial = FaultInjectingStore::new(
        SnapshotBuilder::new("initial")
            .points("A", vec![well(0.0, 0.0, "a")])
            .points("B", vec![well(0.0, 0.0, "b")])
            .build(),
    )
    .with_fault(Fault::Append, "A");
    let latest = SnapshotBuilder::new("latest")
        .points("A", vec![well(0.0, 0.0, "a"), well(9.0, 9.0, "a2")])
        .points("B", vec![well(0.0, 0.0, "b"), well(9.0, 9.0, "b2")])
        .build();

    let report = run(&initial, &latest);

    // A failed, so it is listed under failures only
    assert_eq!(report.deltas.len(), 1);
    assert_eq!(report.deltas[0].collection, "B");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].collection, "A");
    assert_eq!(report.failures[0].operation, Operation::Append);
    assert_eq!(report.merges.len(), 1);
    assert_eq!(report.merges[0].collection, "B");
    assert_eq!(count(initial.inner(), "A"), 1);
    assert_eq!(count(initial.inner(), "B"), 2);
}

#[test]
fn latest_only_collection_is_excluded() {
    let initial = SnapshotBuilder::new("initial")
        .parcels("PARCELS", parcel_grid(0.0, 0.0, 1, 2))
        .build();
    let latest = SnapshotBuilder::new("latest")
        .parcels("PARCELS", parcel_grid(0.0, 0.0, 1, 2))
        .points("HYDRANTS", vec![well(1.0, 1.0, "h1"), well(5.0, 5.0, "h2")])
        .build();

    let report = run(&initial, &latest);
    assert!(report.deltas.is_empty());
    assert_eq!(report.latest_only, vec!["HYDRANTS".to_string()]);
    assert!(report.bulk_copied.is_empty());
    assert_eq!(initial.list_collections().unwrap().len(), 1);
}

proptest! {
    #[test]
    fn boundary_classification(
        (x, y) in grid_coord_strategy(),
        axis in 0usize..4,
    ) {
        let radius = 0.5;
        let eps = 1.0 / 1_048_576.0;
        let index = BufferIndex::build(&[ToleranceBuffer { x, y, radius }]);

        let (dx, dy) = [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)][axis];
        let at = |d: f64| RepresentativePoint {
            source_row: RowId(1),
            x: x + dx * d,
            y: y + dy * d,
        };

        prop_assert!(new_points(&[at(radius - eps)], &index).is_empty());
        prop_assert!(new_points(&[at(radius)], &index).is_empty());
        prop_assert_eq!(new_points(&[at(radius + eps)], &index).len(), 1);
    }

    #[test]
    fn field_map_is_deterministic(source in schema_strategy(), target in schema_strategy()) {
        let first = FieldMap::build(&source, &target);
        let second = FieldMap::build(&source, &target);
        prop_assert_eq!(first.descriptor(), second.descriptor());
        prop_assert_eq!(first.digest(), second.digest());

        let mut last_position = None;
        for mapping in first.mappings() {
            let field = target.field(&mapping.target).unwrap();
            prop_assert!(field.accepts_writes());
            prop_assert!(source.field(&mapping.source).is_some());

            let position = source.fields().position(|f| f.name == mapping.source);
            prop_assert!(position > last_position);
            last_position = position;
        }
    }

    #[test]
    fn known_points_never_survive(points in sparse_points_strategy(30, 5.0)) {
        let survivors: Vec<RepresentativePoint> = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| RepresentativePoint { source_row: RowId(i as u64), x, y })
            .collect();
        let buffers: Vec<ToleranceBuffer> = survivors
            .iter()
            .map(|p| ToleranceBuffer::around(p, 0.5))
            .collect();
        let index = BufferIndex::build(&buffers);
        prop_assert!(new_points(&survivors, &index).is_empty());
    }
}
