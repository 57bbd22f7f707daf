//! Merge executor: moves detected new features into the initial snapshot.
//!
//! Per collection:
//! 1. select the latest features behind the surviving points
//! 2. (polygons) flag initial features the candidates would duplicate
//! 3. delete exactly the flagged rows
//! 4. append the candidates through the field map
//!
//! Steps 3 and 4 run under the target collection's writer lock.

use crate::error::{CollectionError, CollectionResult, Operation};
use crate::field_map::FieldMap;
use crate::geometry::{distance_to, inward_depth, representative_point};
use crate::report::MergeOutcome;
use crate::scratch::{ArtifactKey, RepresentativePoint, ScratchWorkspace, SnapshotRole};
use geo::BoundingRect;
use geodelta_storage::{CollectionRef, Feature, FeatureStore, GeometryKind, NewFeature, RowId};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Registry of per-collection writer locks.
///
/// Deletes and appends against the same target collection never overlap;
/// writes to different collections proceed in parallel.
#[derive(Debug, Default)]
pub struct WriterLocks {
    locks: Mutex<HashMap<CollectionRef, Arc<Mutex<()>>>>,
}

impl WriterLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a collection, creating it on first use.
    #[must_use]
    pub fn lock_for(&self, collection: &CollectionRef) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(collection.clone()).or_default())
    }
}

/// Tolerances used by [`merge_collection`].
#[derive(Debug, Clone, Copy)]
pub struct MergeTolerances {
    /// How close a latest geometry must be to a surviving point.
    pub selection: f64,
    /// How deep inside a candidate polygon an initial centroid must be.
    pub duplicate: f64,
}

/// One collection's merge job.
#[derive(Debug, Clone, Copy)]
pub struct MergeTarget<'a> {
    /// Collection base name (artifact key and report name).
    pub name: &'a str,
    /// Geometry kind shared by both sides.
    pub kind: GeometryKind,
    /// Collection in the initial snapshot.
    pub initial: &'a CollectionRef,
    /// Collection in the latest snapshot.
    pub latest: &'a CollectionRef,
}

/// Selects latest features within `tolerance` of a surviving point, or
/// collapsed from one. Input order is preserved.
#[must_use]
pub fn select_candidates(
    features: Vec<Feature>,
    survivors: &[RepresentativePoint],
    tolerance: f64,
) -> Vec<Feature> {
    let sources: HashSet<RowId> = survivors.iter().map(|p| p.source_row).collect();
    features
        .into_iter()
        .filter(|feature| {
            sources.contains(&feature.row_id) || touches_any(feature, survivors, tolerance)
        })
        .collect()
}

fn touches_any(feature: &Feature, survivors: &[RepresentativePoint], tolerance: f64) -> bool {
    let Some(rect) = feature.geometry.bounding_rect() else {
        return false;
    };
    let (min, max) = (rect.min(), rect.max());
    survivors.iter().any(|p| {
        p.x >= min.x - tolerance
            && p.x <= max.x + tolerance
            && p.y >= min.y - tolerance
            && p.y <= max.y + tolerance
            && distance_to(p.point(), &feature.geometry) <= tolerance
    })
}

/// Flags initial features whose centroid lies inside some candidate polygon
/// at least `tolerance` from its boundary. Returns row ids in ascending
/// order.
#[must_use]
pub fn find_duplicates(initial: &[Feature], candidates: &[Feature], tolerance: f64) -> Vec<RowId> {
    let mut flagged = BTreeSet::new();
    for feature in initial {
        let Some(center) = representative_point(&feature.geometry) else {
            continue;
        };
        let inside = candidates.iter().any(|candidate| {
            inward_depth(center, &candidate.geometry).is_some_and(|depth| depth >= tolerance)
        });
        if inside {
            flagged.insert(feature.row_id);
        }
    }
    flagged.into_iter().collect()
}

/// Merges one collection's surviving points into the initial snapshot.
///
/// # Errors
///
/// - `Select` if the survivors or latest features cannot be read
/// - `Delete` if reading the initial collection or deleting fails
/// - `Append` if the store rejects the new features
///
/// A failed append after a successful delete is reported as is; the next
/// run detects the missing features again.
pub fn merge_collection(
    initial: &dyn FeatureStore,
    latest: &dyn FeatureStore,
    workspace: &ScratchWorkspace,
    locks: &WriterLocks,
    target: MergeTarget<'_>,
    field_map: &FieldMap,
    tolerances: MergeTolerances,
) -> CollectionResult<MergeOutcome> {
    let name = target.name;

    let survivors = workspace
        .points(&ArtifactKey::points(SnapshotRole::Latest, name))
        .map_err(CollectionError::during(name, Operation::Select))?;
    let latest_features = latest
        .read_features(target.latest)
        .map_err(CollectionError::during(name, Operation::Select))?;
    let candidates = select_candidates(latest_features, &survivors, tolerances.selection);

    let lock = locks.lock_for(target.initial);
    let _writer = lock.lock();

    let flagged = if target.kind == GeometryKind::Polygon {
        let existing = initial
            .read_features(target.initial)
            .map_err(CollectionError::during(name, Operation::Delete))?;
        find_duplicates(&existing, &candidates, tolerances.duplicate)
    } else {
        Vec::new()
    };

    let deleted = if flagged.is_empty() {
        0
    } else {
        initial
            .delete_features(target.initial, &flagged)
            .map_err(CollectionError::during(name, Operation::Delete))?
    };

    if field_map.is_empty() {
        tracing::warn!(
            collection = %name,
            "field map is empty, appending geometry only"
        );
    }
    tracing::debug!(
        collection = %name,
        field_map = %field_map.descriptor(),
        digest = %field_map.digest(),
        "appending with field map"
    );

    let batch: Vec<NewFeature> = candidates
        .iter()
        .map(|feature| NewFeature {
            geometry: feature.geometry.clone(),
            attributes: field_map.apply(feature),
        })
        .collect();
    let appended = if batch.is_empty() {
        0
    } else {
        initial
            .append_features(target.initial, batch)
            .map_err(CollectionError::during(name, Operation::Append))?
            .len()
    };

    tracing::info!(
        collection = %name,
        kind = %target.kind,
        candidates = candidates.len(),
        deleted,
        appended,
        "merged collection"
    );

    Ok(MergeOutcome {
        collection: name.to_string(),
        kind: target.kind,
        candidates: candidates.len(),
        deleted,
        appended,
        field_count: field_map.len(),
        field_map_digest: field_map.digest(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodelta_storage::Value;
    use geo_types::{line_string, point, polygon, Geometry};
    use std::collections::BTreeMap;

    fn feature(row: u64, geometry: impl Into<Geometry<f64>>) -> Feature {
        Feature {
            row_id: RowId(row),
            geometry: geometry.into(),
            attributes: BTreeMap::new(),
        }
    }

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
        .into()
    }

    fn survivor(row: u64, x: f64, y: f64) -> RepresentativePoint {
        RepresentativePoint::new(RowId(row), point!(x: x, y: y))
    }

    #[test]
    fn selection_by_source_row_and_proximity() {
        let features = vec![
            feature(1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
            feature(2, line_string![(x: 0.0, y: 5.0), (x: 10.0, y: 5.0)]),
            feature(3, line_string![(x: 20.0, y: 5.0), (x: 30.0, y: 5.0)]),
        ];
        // Row 1 is the source; row 2 passes within the tolerance of the point
        let survivors = vec![survivor(1, 5.0, 0.0), survivor(99, 3.0, 5.0005)];
        let rows: Vec<_> = select_candidates(features, &survivors, 0.001)
            .iter()
            .map(|f| f.row_id)
            .collect();
        assert_eq!(rows, vec![RowId(1), RowId(2)]);
    }

    #[test]
    fn selection_without_survivors_is_empty() {
        let features = vec![feature(1, square(0.0, 0.0, 10.0))];
        assert!(select_candidates(features, &[], 0.001).is_empty());
    }

    #[test]
    fn duplicates_need_depth() {
        let candidates = vec![feature(10, square(0.0, 0.0, 10.0))];
        let initial = vec![
            // Centroid (5, 5), deep inside
            feature(1, square(4.0, 4.0, 2.0)),
            // Centroid (0.1, 5), too close to the edge
            feature(2, square(-0.9, 4.0, 2.0)),
            // Outside entirely
            feature(3, square(20.0, 20.0, 2.0)),
        ];
        assert_eq!(find_duplicates(&initial, &candidates, 0.2), vec![RowId(1)]);
    }

    #[test]
    fn writer_locks_are_shared_per_collection() {
        let locks = WriterLocks::new();
        let a = CollectionRef::new("A");
        let first = locks.lock_for(&a);
        let second = locks.lock_for(&a);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &locks.lock_for(&CollectionRef::new("B"))));

        let _held = first.lock();
        assert!(second.try_lock().is_none());
    }

    #[test]
    fn empty_field_map_drops_attributes() {
        let mut f = feature(1, point!(x: 0.0, y: 0.0));
        f.attributes.insert("NAME".into(), Value::from("bore 7"));
        let map = FieldMap::default();
        assert!(map.apply(&f).is_empty());
    }
}
