//! In-memory feature store for testing.

use crate::collection::CollectionData;
use crate::error::{StoreError, StoreResult};
use crate::feature::{Feature, NewFeature};
use crate::model::{CollectionInfo, CollectionRef, GeometryKind, RowId};
use crate::schema::Schema;
use crate::store::{FeatureStore, CURRENT_FORMAT_VERSION};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory feature store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral snapshots that never touch disk
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use geodelta_storage::{
///     CollectionRef, FeatureStore, GeometryKind, InMemoryStore, NewFeature, Schema,
/// };
///
/// let store = InMemoryStore::new("scratchpad");
/// let wells = CollectionRef::new("WELLS");
/// store
///     .create_collection(wells.clone(), GeometryKind::Point, Schema::with_system_fields(vec![]))
///     .unwrap();
/// store
///     .append_features(&wells, vec![NewFeature::new(geo_types::point!(x: 1.0, y: 2.0))])
///     .unwrap();
/// assert_eq!(store.read_features(&wells).unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    format_version: RwLock<(u16, u16)>,
    collections: RwLock<BTreeMap<CollectionRef, CollectionData>>,
}

impl InMemoryStore {
    /// Creates an empty store with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format_version: RwLock::new(CURRENT_FORMAT_VERSION),
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates an empty collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the reference cannot name a path component,
    /// or `CollectionExists` if the reference is taken.
    pub fn create_collection(
        &self,
        reference: CollectionRef,
        kind: GeometryKind,
        schema: Schema,
    ) -> StoreResult<()> {
        reference.validate()?;
        let mut collections = self.collections.write();
        if collections.contains_key(&reference) {
            return Err(StoreError::CollectionExists(reference));
        }
        collections.insert(reference.clone(), CollectionData::new(reference, kind, schema));
        Ok(())
    }

    /// Overrides the reported format version.
    ///
    /// Useful for exercising upgrade paths.
    pub fn set_format_version(&self, version: (u16, u16)) {
        *self.format_version.write() = version;
    }

    fn with_collection<R>(
        &self,
        collection: &CollectionRef,
        f: impl FnOnce(&CollectionData) -> R,
    ) -> StoreResult<R> {
        let collections = self.collections.read();
        let data = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
        Ok(f(data))
    }

    fn with_collection_mut<R>(
        &self,
        collection: &CollectionRef,
        f: impl FnOnce(&mut CollectionData) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut collections = self.collections.write();
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
        f(data)
    }
}

impl FeatureStore for InMemoryStore {
    fn location(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn format_version(&self) -> (u16, u16) {
        *self.format_version.read()
    }

    fn list_collections(&self) -> StoreResult<Vec<CollectionInfo>> {
        Ok(self.collections.read().values().map(CollectionData::info).collect())
    }

    fn schema(&self, collection: &CollectionRef) -> StoreResult<Schema> {
        self.with_collection(collection, |c| c.schema.clone())
    }

    fn read_features(&self, collection: &CollectionRef) -> StoreResult<Vec<Feature>> {
        self.with_collection(collection, |c| c.features().to_vec())
    }

    fn delete_features(
        &self,
        collection: &CollectionRef,
        row_ids: &[RowId],
    ) -> StoreResult<usize> {
        self.with_collection_mut(collection, |c| Ok(c.delete(row_ids)))
    }

    fn append_features(
        &self,
        collection: &CollectionRef,
        features: Vec<NewFeature>,
    ) -> StoreResult<Vec<RowId>> {
        self.with_collection_mut(collection, |c| c.append(features))
    }

    fn flush(&self) -> StoreResult<()> {
        // Nothing is pending in memory
        Ok(())
    }
}
