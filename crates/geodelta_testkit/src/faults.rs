//! Failure injection for feature stores.
//!
//! [`FaultInjectingStore`] wraps any store and fails selected operations
//! for selected collections, matched by base name. Everything else is
//! passed through.

use geodelta_storage::{
    CollectionInfo, CollectionRef, Feature, FeatureStore, NewFeature, RowId, Schema, StoreError,
    StoreResult,
};
use parking_lot::RwLock;
use std::collections::HashSet;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `read_features` fails.
    Read,
    /// `delete_features` fails.
    Delete,
    /// `append_features` fails.
    Append,
}

/// Store wrapper that injects failures.
#[derive(Debug)]
pub struct FaultInjectingStore<S> {
    inner: S,
    faults: RwLock<HashSet<(Fault, String)>>,
}

impl<S: FeatureStore> FaultInjectingStore<S> {
    /// Wraps a store with no faults armed.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: RwLock::new(HashSet::new()),
        }
    }

    /// Arms `fault` for the collection with base name `collection`.
    #[must_use]
    pub fn with_fault(self, fault: Fault, collection: &str) -> Self {
        self.arm(fault, collection);
        self
    }

    /// Arms `fault` for a collection.
    pub fn arm(&self, fault: Fault, collection: &str) {
        self.faults.write().insert((fault, collection.to_string()));
    }

    /// Disarms every fault.
    pub fn clear(&self) {
        self.faults.write().clear();
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, fault: Fault, collection: &CollectionRef) -> StoreResult<()> {
        let armed = self
            .faults
            .read()
            .contains(&(fault, collection.base_name().to_string()));
        if armed {
            return Err(StoreError::corrupted(format!(
                "injected {:?} failure for {}",
                fault, collection
            )));
        }
        Ok(())
    }
}

impl<S: FeatureStore> FeatureStore for FaultInjectingStore<S> {
    fn location(&self) -> String {
        self.inner.location()
    }

    fn format_version(&self) -> (u16, u16) {
        self.inner.format_version()
    }

    fn list_collections(&self) -> StoreResult<Vec<CollectionInfo>> {
        self.inner.list_collections()
    }

    fn schema(&self, collection: &CollectionRef) -> StoreResult<Schema> {
        self.inner.schema(collection)
    }

    fn read_features(&self, collection: &CollectionRef) -> StoreResult<Vec<Feature>> {
        self.check(Fault::Read, collection)?;
        self.inner.read_features(collection)
    }

    fn delete_features(
        &self,
        collection: &CollectionRef,
        row_ids: &[RowId],
    ) -> StoreResult<usize> {
        self.check(Fault::Delete, collection)?;
        self.inner.delete_features(collection, row_ids)
    }

    fn append_features(
        &self,
        collection: &CollectionRef,
        features: Vec<NewFeature>,
    ) -> StoreResult<Vec<RowId>> {
        self.check(Fault::Append, collection)?;
        self.inner.append_features(collection, features)
    }

    fn flush(&self) -> StoreResult<()> {
        self.inner.flush()
    }
}
