//! Spatial differ: which latest points fall outside every initial buffer.
//!
//! Identity across snapshots is geometric proximity. Row ids are not
//! stable between extracts, so they play no part here.

use crate::error::{CollectionError, CollectionResult, Operation};
use crate::scratch::{
    ArtifactKey, RepresentativePoint, ScratchWorkspace, SnapshotRole, ToleranceBuffer,
};
use std::collections::HashMap;

type Cell = (i64, i64);

/// Uniform grid over tolerance buffers.
///
/// The cell size is twice the largest radius, so any point covered by a
/// buffer lies in the buffer's cell or one of its eight neighbours.
#[derive(Debug, Clone)]
pub struct BufferIndex {
    cell: f64,
    cells: HashMap<Cell, Vec<ToleranceBuffer>>,
    len: usize,
}

impl BufferIndex {
    /// Indexes the buffers.
    #[must_use]
    pub fn build(buffers: &[ToleranceBuffer]) -> Self {
        let max_radius = buffers.iter().map(|b| b.radius).fold(0.0, f64::max);
        let cell = if max_radius > 0.0 { 2.0 * max_radius } else { 1.0 };

        let mut cells: HashMap<Cell, Vec<ToleranceBuffer>> = HashMap::new();
        for buffer in buffers {
            cells
                .entry(cell_of(cell, buffer.x, buffer.y))
                .or_default()
                .push(*buffer);
        }
        Self {
            cell,
            cells,
            len: buffers.len(),
        }
    }

    /// Number of indexed buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if some buffer covers `(x, y)`, boundary included.
    #[must_use]
    pub fn covers(&self, x: f64, y: f64) -> bool {
        let (cx, cy) = cell_of(self.cell, x, y);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let key = (cx.saturating_add(dx), cy.saturating_add(dy));
                if let Some(bucket) = self.cells.get(&key) {
                    if bucket.iter().any(|b| b.covers(x, y)) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

fn cell_of(cell: f64, x: f64, y: f64) -> Cell {
    // `as` saturates for out-of-range floats
    ((x / cell).floor() as i64, (y / cell).floor() as i64)
}

/// Returns the points not covered by any indexed buffer, in input order.
#[must_use]
pub fn new_points(
    points: &[RepresentativePoint],
    index: &BufferIndex,
) -> Vec<RepresentativePoint> {
    points
        .iter()
        .filter(|p| !index.covers(p.x, p.y))
        .copied()
        .collect()
}

/// Diffs one collection's artifacts.
///
/// Reads the latest points and initial buffers stored under `name`, drops
/// every latest point that lies inside a buffer from the latest points
/// artifact, and returns how many points survived.
///
/// Returns `Ok(None)` when either artifact is missing: the collection did
/// not collapse on one side and takes no part in the diff.
///
/// # Errors
///
/// Returns a `Diff` error if an artifact cannot be read or rewritten.
pub fn diff(workspace: &ScratchWorkspace, name: &str) -> CollectionResult<Option<usize>> {
    let points_key = ArtifactKey::points(SnapshotRole::Latest, name);
    let buffers_key = ArtifactKey::buffers(SnapshotRole::Initial, name);
    if !workspace.contains(&points_key) || !workspace.contains(&buffers_key) {
        tracing::debug!(collection = %name, "diff skipped, artifacts missing");
        return Ok(None);
    }

    let buffers = workspace
        .buffers(&buffers_key)
        .map_err(CollectionError::during(name, Operation::Diff))?;
    let index = BufferIndex::build(&buffers);

    let surviving = workspace
        .retain_points(&points_key, |p| !index.covers(p.x, p.y))
        .map_err(CollectionError::during(name, Operation::Diff))?;

    tracing::debug!(
        collection = %name,
        buffers = index.len(),
        new_features = surviving,
        "diffed collection"
    );
    Ok(Some(surviving))
}
