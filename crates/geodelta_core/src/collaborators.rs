//! Interfaces to work the engine hands off.
//!
//! The engine never implements these; callers plug them into
//! [`crate::SyncEngine`].

use crate::report::DeltaRecord;
use geodelta_storage::{CollectionRef, FeatureStore};

/// Copies a whole collection that exists only in the latest snapshot.
pub trait BulkCopier: Send + Sync {
    /// Copies `source_ref` from `source` into `target` as `target_ref`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason on failure.
    fn copy(
        &self,
        source: &dyn FeatureStore,
        source_ref: &CollectionRef,
        target: &dyn FeatureStore,
        target_ref: &CollectionRef,
    ) -> Result<(), String>;
}

/// Brings a store written by an older format up to date.
pub trait SchemaUpgrader: Send + Sync {
    /// Upgrades the store in place.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason on failure.
    fn upgrade(&self, store: &dyn FeatureStore) -> Result<(), String>;
}

/// Receives the delta sequence of a finished run.
pub trait ReportSink: Send + Sync {
    /// Writes the records, already in stable collection order.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason on failure.
    fn write(&self, records: &[DeltaRecord]) -> Result<(), String>;
}
