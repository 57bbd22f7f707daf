//! Feature store trait definition.

use crate::error::StoreResult;
use crate::feature::{Feature, NewFeature};
use crate::model::{CollectionInfo, CollectionRef, RowId};
use crate::schema::Schema;

/// Format version written by this release.
pub const CURRENT_FORMAT_VERSION: (u16, u16) = (1, 0);

/// A snapshot of a geospatial feature store.
///
/// Stores enumerate their collections, expose schemas and features, and
/// accept targeted deletes and appends. Stores do not know anything about
/// synchronization; the engine drives them through this trait only.
///
/// # Invariants
///
/// - `list_collections` is sorted by `(container, name)`
/// - `read_features` is ordered by row id
/// - `delete_features` removes exactly the listed row ids and nothing else
/// - `append_features` validates the whole batch before writing any of it
/// - Stores must be `Send + Sync`; concurrent calls for different
///   collections are allowed
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and ephemeral snapshots
/// - [`super::FileStore`] - Directory-backed persistent snapshots
pub trait FeatureStore: Send + Sync {
    /// Human-readable identity used in logs and errors.
    fn location(&self) -> String;

    /// Format version of the store's on-disk layout.
    fn format_version(&self) -> (u16, u16);

    /// Returns true if the store was written by an older format and must
    /// be upgraded before synchronization.
    fn needs_upgrade(&self) -> bool {
        self.format_version() < CURRENT_FORMAT_VERSION
    }

    /// Enumerates collections, sorted by `(container, name)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store catalogue cannot be read.
    fn list_collections(&self) -> StoreResult<Vec<CollectionInfo>>;

    /// Returns the attribute schema of a collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections.
    fn schema(&self, collection: &CollectionRef) -> StoreResult<Schema>;

    /// Reads every feature of a collection, ordered by row id.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections, or an I/O or
    /// codec error if stored data cannot be read.
    fn read_features(&self, collection: &CollectionRef) -> StoreResult<Vec<Feature>>;

    /// Deletes the listed rows and returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections.
    fn delete_features(&self, collection: &CollectionRef, row_ids: &[RowId])
        -> StoreResult<usize>;

    /// Appends features and returns their assigned row ids.
    ///
    /// # Errors
    ///
    /// Returns an error if any feature has the wrong geometry kind or
    /// writes a field that is unknown or not editable. Nothing is written
    /// in that case.
    fn append_features(
        &self,
        collection: &CollectionRef,
        features: Vec<NewFeature>,
    ) -> StoreResult<Vec<RowId>>;

    /// Persists pending changes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn flush(&self) -> StoreResult<()>;
}
