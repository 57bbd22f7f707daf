//! Geometry collapser: features to representative points and buffers.

use crate::error::{CollectionError, CollectionErrorKind, CollectionResult, Operation};
use crate::geometry::representative_point;
use crate::scratch::{
    ArtifactKey, RepresentativePoint, ScratchWorkspace, SnapshotRole, ToleranceBuffer,
};
use geodelta_storage::{CollectionRef, Feature, FeatureStore};

/// What a collapse produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseOutcome {
    /// Representative points written.
    pub points: usize,
    /// Buffers written (always zero for the latest role).
    pub buffers: usize,
    /// True if the artifacts already existed and nothing was recomputed.
    pub reused: bool,
}

/// Reduces features to representative points, in input order.
///
/// # Errors
///
/// Fails on the first feature without a representative point.
pub fn representative_points(
    features: &[Feature],
) -> Result<Vec<RepresentativePoint>, CollectionErrorKind> {
    features
        .iter()
        .map(|feature| {
            representative_point(&feature.geometry)
                .map(|p| RepresentativePoint::new(feature.row_id, p))
                .ok_or(CollectionErrorKind::DegenerateGeometry(feature.row_id))
        })
        .collect()
}

/// Collapses one collection into the scratch workspace.
///
/// Artifacts are keyed by `name`, the collection's base name. Buffers are
/// only built for the initial role. Existing artifacts for the same key are
/// kept as they are.
///
/// # Errors
///
/// Returns a `Collapse` error if the features cannot be read, a feature has
/// no representative point, or an artifact cannot be written. Nothing is
/// left behind in the workspace for a failed collapse.
pub fn collapse(
    store: &dyn FeatureStore,
    collection: &CollectionRef,
    name: &str,
    role: SnapshotRole,
    workspace: &ScratchWorkspace,
    buffer_distance: f64,
) -> CollectionResult<CollapseOutcome> {
    let points_key = ArtifactKey::points(role, name);
    let buffers_key = ArtifactKey::buffers(role, name);
    let wants_buffers = role == SnapshotRole::Initial;

    if workspace.contains(&points_key) && (!wants_buffers || workspace.contains(&buffers_key)) {
        tracing::debug!(collection = %name, role = %role, "collapse artifacts already present");
        return Ok(CollapseOutcome {
            points: 0,
            buffers: 0,
            reused: true,
        });
    }

    let features = store
        .read_features(collection)
        .map_err(CollectionError::during(name, Operation::Collapse))?;
    let points = representative_points(&features)
        .map_err(CollectionError::during(name, Operation::Collapse))?;

    let buffers: Vec<ToleranceBuffer> = if wants_buffers {
        points
            .iter()
            .map(|p| ToleranceBuffer::around(p, buffer_distance))
            .collect()
    } else {
        Vec::new()
    };

    let written = write_artifacts(
        workspace,
        &points_key,
        &points,
        wants_buffers.then_some((&buffers_key, &buffers[..])),
    );
    if let Err(e) = written {
        // Half-written pairs would be taken as already computed next time
        let _ = workspace.remove(&points_key);
        let _ = workspace.remove(&buffers_key);
        return Err(CollectionError::new(name, Operation::Collapse, e));
    }

    tracing::debug!(
        collection = %name,
        role = %role,
        points = points.len(),
        buffers = buffers.len(),
        "collapsed collection"
    );
    Ok(CollapseOutcome {
        points: points.len(),
        buffers: buffers.len(),
        reused: false,
    })
}

fn write_artifacts(
    workspace: &ScratchWorkspace,
    points_key: &ArtifactKey,
    points: &[RepresentativePoint],
    buffers: Option<(&ArtifactKey, &[ToleranceBuffer])>,
) -> std::io::Result<()> {
    if let Some((key, buffers)) = buffers {
        workspace.put_buffers(key, buffers)?;
    }
    workspace.put_points(points_key, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodelta_storage::{GeometryKind, InMemoryStore, NewFeature, RowId, Schema};
    use geo_types::{line_string, polygon, LineString, Polygon};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn store_with(kind: GeometryKind, features: Vec<NewFeature>) -> (InMemoryStore, CollectionRef) {
        let store = InMemoryStore::new("t");
        let r = CollectionRef::new("C");
        store
            .create_collection(r.clone(), kind, Schema::with_system_fields(vec![]))
            .unwrap();
        store.append_features(&r, features).unwrap();
        (store, r)
    }

    #[test]
    fn initial_role_builds_buffers() {
        let dir = tempdir().unwrap();
        let ws = ScratchWorkspace::create(Some(dir.path()), Uuid::new_v4()).unwrap();
        let (store, r) = store_with(
            GeometryKind::Polygon,
            vec![NewFeature::new(polygon![
                (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0),
            ])],
        );

        let outcome = collapse(&store, &r, "C", SnapshotRole::Initial, &ws, 0.5).unwrap();
        assert_eq!(outcome, CollapseOutcome { points: 1, buffers: 1, reused: false });

        let buffers = ws.buffers(&ArtifactKey::buffers(SnapshotRole::Initial, "C")).unwrap();
        assert_eq!(buffers[0].radius, 0.5);
        assert!((buffers[0].x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn latest_role_has_no_buffers() {
        let dir = tempdir().unwrap();
        let ws = ScratchWorkspace::create(Some(dir.path()), Uuid::new_v4()).unwrap();
        let (store, r) = store_with(
            GeometryKind::Line,
            vec![NewFeature::new(line_string![(x: 0.0, y: 0.0), (x: 8.0, y: 0.0)])],
        );

        let outcome = collapse(&store, &r, "C", SnapshotRole::Latest, &ws, 0.5).unwrap();
        assert_eq!(outcome.buffers, 0);
        assert!(!ws.contains(&ArtifactKey::buffers(SnapshotRole::Latest, "C")));

        let points = ws.points(&ArtifactKey::points(SnapshotRole::Latest, "C")).unwrap();
        assert_eq!((points[0].x, points[0].y), (4.0, 0.0));
        assert_eq!(points[0].source_row, RowId(1));
    }

    #[test]
    fn existing_artifacts_are_reused() {
        let dir = tempdir().unwrap();
        let ws = ScratchWorkspace::create(Some(dir.path()), Uuid::new_v4()).unwrap();
        let (store, r) = store_with(
            GeometryKind::Line,
            vec![NewFeature::new(line_string![(x: 0.0, y: 0.0), (x: 8.0, y: 0.0)])],
        );

        collapse(&store, &r, "C", SnapshotRole::Latest, &ws, 0.5).unwrap();
        let again = collapse(&store, &r, "C", SnapshotRole::Latest, &ws, 0.5).unwrap();
        assert!(again.reused);
    }

    #[test]
    fn degenerate_geometry_fails_without_artifacts() {
        let dir = tempdir().unwrap();
        let ws = ScratchWorkspace::create(Some(dir.path()), Uuid::new_v4()).unwrap();
        let (store, r) = store_with(
            GeometryKind::Line,
            vec![
                NewFeature::new(line_string![(x: 0.0, y: 0.0), (x: 8.0, y: 0.0)]),
                NewFeature::new(LineString::<f64>::new(vec![])),
            ],
        );

        let err = collapse(&store, &r, "C", SnapshotRole::Initial, &ws, 0.5).unwrap_err();
        assert_eq!(err.operation, Operation::Collapse);
        assert!(matches!(err.source, CollectionErrorKind::DegenerateGeometry(RowId(2))));
        assert!(ws.keys().unwrap().is_empty());
    }

    #[test]
    fn missing_collection_is_a_collapse_failure() {
        let dir = tempdir().unwrap();
        let ws = ScratchWorkspace::create(Some(dir.path()), Uuid::new_v4()).unwrap();
        let store = InMemoryStore::new("t");
        let err = collapse(&store, &CollectionRef::new("X"), "X", SnapshotRole::Latest, &ws, 0.5)
            .unwrap_err();
        assert!(matches!(err.source, CollectionErrorKind::Store(_)));
    }

    #[test]
    fn representative_points_keep_row_order() {
        let features = vec![
            Feature {
                row_id: RowId(4),
                geometry: Polygon::new(
                    LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]),
                    vec![],
                )
                .into(),
                attributes: Default::default(),
            },
            Feature {
                row_id: RowId(9),
                geometry: geo_types::point!(x: 3.0, y: 3.0).into(),
                attributes: Default::default(),
            },
        ];
        let points = representative_points(&features).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].source_row, RowId(9));
    }
}
