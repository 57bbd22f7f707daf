//! Directory-backed feature store.
//!
//! Layout:
//!
//! ```text
//! <root>/
//! ├─ MANIFEST                       # Format version + collection catalogue
//! ├─ LOCK                           # Advisory lock for single-writer access
//! └─ collections/
//!    └─ <container>/<name>.cbor     # Schema + features of one collection
//! ```
//!
//! Collections are loaded on first use and cached. Mutations only touch the
//! cache; [`FeatureStore::flush`] rewrites dirty collections atomically.
//! The manifest carries each collection's kind and feature count, so
//! listing never decodes a collection file.

use crate::collection::CollectionData;
use crate::error::{StoreError, StoreResult};
use crate::feature::{Feature, NewFeature};
use crate::model::{CollectionInfo, CollectionRef, GeometryKind, RowId};
use crate::schema::Schema;
use crate::store::{FeatureStore, CURRENT_FORMAT_VERSION};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOCK_FILE: &str = "LOCK";
const COLLECTIONS_DIR: &str = "collections";
/// Directory used for collections without a container.
const ROOT_CONTAINER: &str = "_root";

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"GDMF";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    reference: CollectionRef,
    kind: GeometryKind,
    file: String,
    #[serde(default)]
    feature_count: usize,
}

impl ManifestEntry {
    fn info(&self) -> CollectionInfo {
        CollectionInfo {
            reference: self.reference.clone(),
            kind: self.kind,
            feature_count: self.feature_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    format_version: (u16, u16),
    collections: Vec<ManifestEntry>,
}

impl Manifest {
    fn entry(&self, reference: &CollectionRef) -> Option<&ManifestEntry> {
        self.collections.iter().find(|e| &e.reference == reference)
    }

    fn entry_mut(&mut self, reference: &CollectionRef) -> Option<&mut ManifestEntry> {
        self.collections.iter_mut().find(|e| &e.reference == reference)
    }

    fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut buf = MANIFEST_MAGIC.to_vec();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < 4 || data[0..4] != MANIFEST_MAGIC {
            return Err(StoreError::corrupted("invalid manifest magic"));
        }
        Ok(ciborium::from_reader(&data[4..])?)
    }
}

/// A feature store persisted in a directory.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on its directory for its whole
/// lifetime. Within the process it is `Send + Sync`; internal locking keeps
/// the cache consistent.
///
/// # Example
///
/// ```no_run
/// use geodelta_storage::{CollectionRef, FeatureStore, FileStore, GeometryKind, Schema};
/// use std::path::Path;
///
/// let store = FileStore::create(Path::new("cadastre.store")).unwrap();
/// store
///     .create_collection(
///         CollectionRef::in_container("CADASTRE", "PARCELS"),
///         GeometryKind::Polygon,
///         Schema::with_system_fields(vec![]),
///     )
///     .unwrap();
/// store.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    _lock_file: File,
    manifest: RwLock<Manifest>,
    loaded: RwLock<HashMap<CollectionRef, CollectionData>>,
    dirty: Mutex<BTreeSet<CollectionRef>>,
}

impl FileStore {
    /// Creates a new, empty store at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory already holds a store, cannot be
    /// created, or is locked.
    pub fn create(root: &Path) -> StoreResult<Self> {
        if root.join(MANIFEST_FILE).exists() {
            return Err(StoreError::corrupted(format!(
                "a store already exists at {}",
                root.display()
            )));
        }
        fs::create_dir_all(root.join(COLLECTIONS_DIR))?;
        let lock_file = Self::lock(root)?;

        let manifest = Manifest {
            format_version: CURRENT_FORMAT_VERSION,
            collections: Vec::new(),
        };
        write_atomic(&root.join(MANIFEST_FILE), &root.join(MANIFEST_TEMP), &manifest.encode()?)?;

        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
            manifest: RwLock::new(manifest),
            loaded: RwLock::new(HashMap::new()),
            dirty: Mutex::new(BTreeSet::new()),
        })
    }

    /// Opens an existing store.
    ///
    /// # Errors
    ///
    /// Returns `NotAStore` if `root` is not a directory holding a manifest,
    /// `Locked` if another handle holds the lock, or a corruption error if
    /// the manifest cannot be decoded.
    pub fn open(root: &Path) -> StoreResult<Self> {
        let manifest_path = root.join(MANIFEST_FILE);
        if !root.is_dir() || !manifest_path.is_file() {
            return Err(StoreError::not_a_store(root.display().to_string()));
        }
        let lock_file = Self::lock(root)?;
        let manifest = Manifest::decode(&fs::read(&manifest_path)?)?;

        tracing::debug!(
            store = %root.display(),
            collections = manifest.collections.len(),
            "opened feature store"
        );

        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
            manifest: RwLock::new(manifest),
            loaded: RwLock::new(HashMap::new()),
            dirty: Mutex::new(BTreeSet::new()),
        })
    }

    /// Returns the store root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates an empty collection and records it in the manifest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the container or name cannot be used as a
    /// path component (the container `_root` is reserved),
    /// `CollectionExists` if the reference is taken, or an I/O error if the
    /// collection file or manifest cannot be written.
    pub fn create_collection(
        &self,
        reference: CollectionRef,
        kind: GeometryKind,
        schema: Schema,
    ) -> StoreResult<()> {
        reference.validate()?;
        if reference
            .container
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(ROOT_CONTAINER))
        {
            return Err(StoreError::invalid_name(
                &reference,
                format!("container {ROOT_CONTAINER} is reserved"),
            ));
        }

        let mut manifest = self.manifest.write();
        if manifest.entry(&reference).is_some() {
            return Err(StoreError::CollectionExists(reference));
        }

        let file = collection_file(&reference);
        let data = CollectionData::new(reference.clone(), kind, schema);
        self.write_collection(&file, &data)?;

        manifest.collections.push(ManifestEntry {
            reference: reference.clone(),
            kind,
            file,
            feature_count: 0,
        });
        manifest
            .collections
            .sort_by(|a, b| a.reference.cmp(&b.reference));
        self.save_manifest(&manifest)?;

        self.loaded.write().insert(reference, data);
        Ok(())
    }

    /// Rewrites the manifest with a new format version.
    ///
    /// Used by upgrade tooling after migrating the on-disk layout.
    pub fn set_format_version(&self, version: (u16, u16)) -> StoreResult<()> {
        let mut manifest = self.manifest.write();
        manifest.format_version = version;
        self.save_manifest(&manifest)
    }

    fn lock(root: &Path) -> StoreResult<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked {
                path: root.display().to_string(),
            });
        }
        Ok(lock_file)
    }

    fn save_manifest(&self, manifest: &Manifest) -> StoreResult<()> {
        write_atomic(
            &self.root.join(MANIFEST_FILE),
            &self.root.join(MANIFEST_TEMP),
            &manifest.encode()?,
        )
    }

    fn write_collection(&self, file: &str, data: &CollectionData) -> StoreResult<()> {
        let path = self.root.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut bytes = Vec::new();
        ciborium::into_writer(data, &mut bytes)?;
        write_atomic(&path, &path.with_extension("tmp"), &bytes)
    }

    fn ensure_loaded(&self, reference: &CollectionRef) -> StoreResult<()> {
        if self.loaded.read().contains_key(reference) {
            return Ok(());
        }

        let file = {
            let manifest = self.manifest.read();
            manifest
                .entry(reference)
                .map(|e| e.file.clone())
                .ok_or_else(|| StoreError::CollectionNotFound(reference.clone()))?
        };
        let bytes = fs::read(self.root.join(&file))?;
        let data: CollectionData = ciborium::from_reader(bytes.as_slice())?;
        if &data.reference != reference {
            return Err(StoreError::corrupted(format!(
                "{} holds {} instead of {}",
                file, data.reference, reference
            )));
        }

        self.loaded
            .write()
            .entry(reference.clone())
            .or_insert(data);
        Ok(())
    }

    fn with_collection<R>(
        &self,
        reference: &CollectionRef,
        f: impl FnOnce(&CollectionData) -> R,
    ) -> StoreResult<R> {
        self.ensure_loaded(reference)?;
        let loaded = self.loaded.read();
        let data = loaded
            .get(reference)
            .ok_or_else(|| StoreError::CollectionNotFound(reference.clone()))?;
        Ok(f(data))
    }

    fn with_collection_mut<R>(
        &self,
        reference: &CollectionRef,
        f: impl FnOnce(&mut CollectionData) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.ensure_loaded(reference)?;
        let mut loaded = self.loaded.write();
        let data = loaded
            .get_mut(reference)
            .ok_or_else(|| StoreError::CollectionNotFound(reference.clone()))?;
        let result = f(data)?;
        self.dirty.lock().insert(reference.clone());
        Ok(result)
    }
}

impl FeatureStore for FileStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn format_version(&self) -> (u16, u16) {
        self.manifest.read().format_version
    }

    fn list_collections(&self) -> StoreResult<Vec<CollectionInfo>> {
        let manifest = self.manifest.read();
        let loaded = self.loaded.read();
        let mut infos: Vec<CollectionInfo> = manifest
            .collections
            .iter()
            .map(|entry| match loaded.get(&entry.reference) {
                Some(data) => data.info(),
                None => entry.info(),
            })
            .collect();
        infos.sort_by(|a, b| a.reference.cmp(&b.reference));
        Ok(infos)
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
        let pending: Vec<CollectionRef> = self.dirty.lock().iter().cloned().collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut manifest = self.manifest.write();
        let loaded = self.loaded.read();
        for reference in &pending {
            let (Some(data), Some(entry)) = (loaded.get(reference), manifest.entry_mut(reference))
            else {
                continue;
            };
            self.write_collection(&entry.file, data)?;
            entry.feature_count = data.features().len();
            self.dirty.lock().remove(reference);
        }
        self.save_manifest(&manifest)?;

        tracing::debug!(
            store = %self.root.display(),
            collections = pending.len(),
            "flushed feature store"
        );
        Ok(())
    }
}

fn collection_file(reference: &CollectionRef) -> String {
    let container = reference.container.as_deref().unwrap_or(ROOT_CONTAINER);
    format!("{}/{}/{}.cbor", COLLECTIONS_DIR, container, reference.name)
}

/// Write-then-rename so readers never observe a half-written file.
fn write_atomic(path: &Path, temp_path: &Path, data: &[u8]) -> StoreResult<()> {
    let mut file = File::create(temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)?;

    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;
    use geo_types::polygon;
    use tempfile::tempdir;

    fn parcels() -> CollectionRef {
        CollectionRef::in_container("CADASTRE", "PARCELS")
    }

    fn square(x: f64, y: f64) -> NewFeature {
        NewFeature::new(polygon![
            (x: x, y: y),
            (x: x + 10.0, y: y),
            (x: x + 10.0, y: y + 10.0),
            (x: x, y: y + 10.0),
        ])
        .with_attribute("LOT_NO", 1_i64)
    }

    fn schema() -> Schema {
        Schema::with_system_fields(vec![FieldDescriptor::integer("LOT_NO")])
    }

    #[test]
    fn open_missing_directory_is_not_a_store() {
        let dir = tempdir().unwrap();
        let err = FileStore::open(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, StoreError::NotAStore { .. }));

        let err = FileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::NotAStore { .. }));
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        let _store = FileStore::create(&root).unwrap();

        let err = FileStore::open(&root).unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));
    }

    #[test]
    fn persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        {
            let store = FileStore::create(&root).unwrap();
            store
                .create_collection(parcels(), GeometryKind::Polygon, schema())
                .unwrap();
            store
                .append_features(&parcels(), vec![square(0.0, 0.0), square(20.0, 0.0)])
                .unwrap();
            store.flush().unwrap();
        }

        {
            let store = FileStore::open(&root).unwrap();
            let infos = store.list_collections().unwrap();
            assert_eq!(infos.len(), 1);
            assert_eq!(infos[0].kind, GeometryKind::Polygon);
            assert_eq!(infos[0].feature_count, 2);

            let features = store.read_features(&parcels()).unwrap();
            assert_eq!(features[1].row_id, RowId(2));
            assert_eq!(store.schema(&parcels()).unwrap(), schema());
        }
    }

    #[test]
    fn unflushed_changes_are_not_persisted() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        {
            let store = FileStore::create(&root).unwrap();
            store
                .create_collection(parcels(), GeometryKind::Polygon, schema())
                .unwrap();
            store
                .append_features(&parcels(), vec![square(0.0, 0.0)])
                .unwrap();
        }

        let store = FileStore::open(&root).unwrap();
        assert!(store.read_features(&parcels()).unwrap().is_empty());
    }

    #[test]
    fn format_version_roundtrip() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        {
            let store = FileStore::create(&root).unwrap();
            assert!(!store.needs_upgrade());
            store.set_format_version((0, 7)).unwrap();
        }
        let store = FileStore::open(&root).unwrap();
        assert_eq!(store.format_version(), (0, 7));
        assert!(store.needs_upgrade());
    }

    #[test]
    fn listing_reads_only_the_manifest() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        {
            let store = FileStore::create(&root).unwrap();
            store
                .create_collection(parcels(), GeometryKind::Polygon, schema())
                .unwrap();
            store
                .append_features(&parcels(), vec![square(0.0, 0.0), square(20.0, 0.0)])
                .unwrap();
            store.flush().unwrap();
        }
        fs::write(root.join(collection_file(&parcels())), b"garbage").unwrap();

        let store = FileStore::open(&root).unwrap();
        let infos = store.list_collections().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].feature_count, 2);
        assert!(store.read_features(&parcels()).is_err());
    }

    #[test]
    fn listing_reflects_unflushed_changes() {
        let dir = tempdir().unwrap();
        let store = FileStore::create(&dir.path().join("store")).unwrap();
        store
            .create_collection(parcels(), GeometryKind::Polygon, schema())
            .unwrap();
        store
            .append_features(&parcels(), vec![square(0.0, 0.0)])
            .unwrap();
        assert_eq!(store.list_collections().unwrap()[0].feature_count, 1);
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileStore::create(&root).unwrap();

        for reference in [
            CollectionRef::new("../../escape"),
            CollectionRef::in_container("CADASTRE", "a/b"),
            CollectionRef::in_container("_root", "PARCELS"),
            CollectionRef::in_container("_ROOT", "PARCELS"),
        ] {
            let err = store
                .create_collection(reference, GeometryKind::Polygon, schema())
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidName { .. }));
        }
        assert!(store.list_collections().unwrap().is_empty());
        assert!(!dir.path().join("escape.cbor").exists());
    }

    #[test]
    fn corrupted_manifest_detected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(MANIFEST_FILE), b"nope").unwrap();

        let err = FileStore::open(&root).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }
}
