//! Run results.

use crate::error::{CollectionError, Operation};
use geodelta_storage::GeometryKind;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// A collection with at least one new feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaRecord {
    /// Collection base name.
    pub collection: String,
    /// Container of the initial collection, if any.
    pub container: Option<String>,
    /// Geometry kind.
    pub kind: GeometryKind,
    /// Number of latest features with no counterpart in the initial
    /// snapshot.
    pub new_features: usize,
}

impl DeltaRecord {
    /// Sort key: kind, then container, then name.
    #[must_use]
    pub fn sort_key(&self) -> (GeometryKind, Option<&str>, &str) {
        (self.kind, self.container.as_deref(), &self.collection)
    }
}

impl fmt::Display for DeltaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.collection, self.new_features)
    }
}

/// What the merge did to one initial collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Collection base name.
    pub collection: String,
    /// Geometry kind.
    pub kind: GeometryKind,
    /// Latest features selected for transfer.
    pub candidates: usize,
    /// Initial rows deleted as duplicates.
    pub deleted: usize,
    /// Rows appended.
    pub appended: usize,
    /// Attribute fields transferred per row.
    pub field_count: usize,
    /// Digest of the field map used.
    pub field_map_digest: String,
}

/// A collection-level failure recorded during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    /// Collection base name.
    pub collection: String,
    /// Failing step.
    pub operation: Operation,
    /// Error message.
    pub message: String,
}

impl From<&CollectionError> for RunFailure {
    fn from(err: &CollectionError) -> Self {
        Self {
            collection: err.collection.clone(),
            operation: err.operation,
            message: err.source.to_string(),
        }
    }
}

/// Everything a run produced.
///
/// Collections that failed appear under `failures` and nowhere else.
/// Collections diffed with no new features appear under `unchanged`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Run identifier (also names the scratch workspace).
    pub run_id: Uuid,
    /// True if the run stopped after the diff phase.
    pub detect_only: bool,
    /// Collections with new features, ordered by kind then
    /// `(container, name)`.
    pub deltas: Vec<DeltaRecord>,
    /// Collections diffed with zero new features.
    pub unchanged: Vec<String>,
    /// Per-collection merge results, in delta order.
    pub merges: Vec<MergeOutcome>,
    /// Collections present only in the latest snapshot.
    pub latest_only: Vec<String>,
    /// Latest-only collections handed to the bulk copier successfully.
    pub bulk_copied: Vec<String>,
    /// Per-collection failures, in the order they occurred within each
    /// phase.
    pub failures: Vec<RunFailure>,
    /// Error from the report sink, if one was configured and failed.
    pub sink_error: Option<String>,
    /// Wall time of the run in milliseconds.
    pub elapsed_ms: u64,
}

impl SyncReport {
    pub(crate) fn new(run_id: Uuid, detect_only: bool) -> Self {
        Self {
            run_id,
            detect_only,
            deltas: Vec::new(),
            unchanged: Vec::new(),
            merges: Vec::new(),
            latest_only: Vec::new(),
            bulk_copied: Vec::new(),
            failures: Vec::new(),
            sink_error: None,
            elapsed_ms: 0,
        }
    }

    /// Total new features across all deltas.
    #[must_use]
    pub fn total_new_features(&self) -> usize {
        self.deltas.iter().map(|d| d.new_features).sum()
    }

    /// Total rows appended across all merges.
    #[must_use]
    pub fn total_appended(&self) -> usize {
        self.merges.iter().map(|m| m.appended).sum()
    }

    /// Returns true if every collection went through without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.sink_error.is_none()
    }

    /// Returns the delta for a collection, if it had one.
    #[must_use]
    pub fn delta(&self, collection: &str) -> Option<&DeltaRecord> {
        self.deltas.iter().find(|d| d.collection == collection)
    }

    /// Returns true if the collection failed at any step.
    #[must_use]
    pub fn failed(&self, collection: &str) -> bool {
        self.failures.iter().any(|f| f.collection == collection)
    }
}
