//! Error types for synchronization runs.
//!
//! Two layers:
//! - [`SyncError`] is fatal and aborts the run before any mutation
//! - [`CollectionError`] is scoped to one collection; the engine records it
//!   in the run report and moves on to the next collection

use geodelta_storage::{GeometryKind, RowId, StoreError};
use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for whole-run operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for per-collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The worker pool or scratch workspace could not be set up.
    #[error("geometry engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A snapshot is missing, unreadable or out of date.
    #[error("invalid snapshot {location}: {reason}")]
    InvalidSnapshot {
        /// Store location.
        location: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Creates an engine-unavailable error.
    pub fn engine_unavailable(message: impl fmt::Display) -> Self {
        Self::EngineUnavailable(message.to_string())
    }

    /// Creates an invalid-snapshot error.
    pub fn invalid_snapshot(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidSnapshot {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

/// The per-collection step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Reducing features to representative points and buffers.
    Collapse,
    /// Testing latest points against initial buffers.
    Diff,
    /// Recovering full geometries for surviving points.
    Select,
    /// Deleting superseded rows from the initial snapshot.
    Delete,
    /// Appending new features to the initial snapshot.
    Append,
    /// Handing a latest-only collection to the bulk copier.
    BulkCopy,
}

impl Operation {
    /// Returns the lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Collapse => "collapse",
            Operation::Diff => "diff",
            Operation::Select => "select",
            Operation::Delete => "delete",
            Operation::Append => "append",
            Operation::BulkCopy => "bulk_copy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a per-collection operation failed.
#[derive(Debug, Error)]
pub enum CollectionErrorKind {
    /// The store rejected the read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A scratch artifact could not be read or written.
    #[error("scratch workspace: {0}")]
    Scratch(#[from] io::Error),

    /// A feature has no representative point (empty or unsupported geometry).
    #[error("degenerate geometry at row {0}")]
    DegenerateGeometry(RowId),

    /// The two snapshots disagree on the collection's geometry kind.
    #[error("geometry kind differs: initial is {initial}, latest is {latest}")]
    KindMismatch {
        /// Kind in the initial snapshot.
        initial: GeometryKind,
        /// Kind in the latest snapshot.
        latest: GeometryKind,
    },

    /// An external collaborator reported failure.
    #[error("{0}")]
    Collaborator(String),
}

/// A failed operation on one collection.
#[derive(Debug, Error)]
#[error("{operation} failed for {collection}: {source}")]
pub struct CollectionError {
    /// Collection name.
    pub collection: String,
    /// The failing step.
    pub operation: Operation,
    /// Underlying cause.
    #[source]
    pub source: CollectionErrorKind,
}

impl CollectionError {
    /// Creates a collection error.
    pub fn new(
        collection: impl Into<String>,
        operation: Operation,
        source: impl Into<CollectionErrorKind>,
    ) -> Self {
        Self {
            collection: collection.into(),
            operation,
            source: source.into(),
        }
    }

    /// Returns a closure that wraps a cause for `collection` and `operation`.
    ///
    /// Handy with `map_err`.
    pub fn during<E: Into<CollectionErrorKind>>(
        collection: &str,
        operation: Operation,
    ) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::new(collection, operation, e)
    }
}
