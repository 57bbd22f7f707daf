//! Per-run scratch workspace for collapse artifacts.
//!
//! Every run owns one directory `geodelta-<run id>` holding CBOR artifact
//! files named after their [`ArtifactKey`]. The directory is removed when
//! the workspace is closed or dropped, on success and failure paths alike.

use geodelta_storage::RowId;
use geo_types::Point;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ARTIFACT_EXTENSION: &str = "cbor";

/// Which snapshot an artifact was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotRole {
    /// The snapshot already delivered downstream; receives the merge.
    Initial,
    /// The fresh extract from the source of record.
    Latest,
}

impl SnapshotRole {
    /// Returns the lowercase label used in artifact keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SnapshotRole::Initial => "initial",
            SnapshotRole::Latest => "latest",
        }
    }
}

impl fmt::Display for SnapshotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Representative points.
    Points,
    /// Tolerance buffers.
    Buffers,
}

impl ArtifactKind {
    /// Returns the key suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Points => "pts",
            ArtifactKind::Buffers => "buf",
        }
    }
}

/// Identifies one artifact: `{role}_{collection}_{pts|buf}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    /// Source snapshot.
    pub role: SnapshotRole,
    /// Collection base name.
    pub collection: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
}

impl ArtifactKey {
    /// Key for a collection's representative points.
    pub fn points(role: SnapshotRole, collection: impl Into<String>) -> Self {
        Self {
            role,
            collection: collection.into(),
            kind: ArtifactKind::Points,
        }
    }

    /// Key for a collection's tolerance buffers.
    pub fn buffers(role: SnapshotRole, collection: impl Into<String>) -> Self {
        Self {
            role,
            collection: collection.into(),
            kind: ArtifactKind::Buffers,
        }
    }

    /// Artifact file name. Bytes outside `[A-Za-z0-9._-]` in the collection
    /// name are percent-encoded so the key always stays one path component.
    fn file_name(&self) -> String {
        let mut collection = String::with_capacity(self.collection.len());
        for byte in self.collection.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                collection.push(char::from(byte));
            } else {
                collection.push_str(&format!("%{byte:02X}"));
            }
        }
        format!(
            "{}_{}_{}.{}",
            self.role,
            collection,
            self.kind.as_str(),
            ARTIFACT_EXTENSION
        )
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.role, self.collection, self.kind.as_str())
    }
}

/// Single-point proxy for a feature.
///
/// `source_row` is only meaningful within the run that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepresentativePoint {
    /// Row the point was collapsed from.
    pub source_row: RowId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl RepresentativePoint {
    /// Creates a representative point.
    #[must_use]
    pub fn new(source_row: RowId, point: Point<f64>) -> Self {
        Self {
            source_row,
            x: point.x(),
            y: point.y(),
        }
    }

    /// Returns the coordinates as a point.
    #[must_use]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.x, self.y)
    }
}

/// Disk of "already known" space around an initial representative point.
///
/// The boundary is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBuffer {
    /// Center X.
    pub x: f64,
    /// Center Y.
    pub y: f64,
    /// Radius.
    pub radius: f64,
}

impl ToleranceBuffer {
    /// Builds the buffer around a representative point.
    #[must_use]
    pub fn around(point: &RepresentativePoint, radius: f64) -> Self {
        Self {
            x: point.x,
            y: point.y,
            radius,
        }
    }

    /// Returns true if `(x, y)` lies within the buffer or on its boundary.
    #[must_use]
    pub fn covers(&self, x: f64, y: f64) -> bool {
        (x - self.x).hypot(y - self.y) <= self.radius
    }
}

/// Scratch directory owned by one run.
///
/// Shared by every worker of the run. Workers only ever write distinct
/// keys, so no locking is needed beyond the filesystem's own.
#[derive(Debug)]
pub struct ScratchWorkspace {
    root: PathBuf,
    run_id: Uuid,
    closed: bool,
}

impl ScratchWorkspace {
    /// Creates the workspace directory under `base` (or the system temp
    /// dir).
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or already exists.
    pub fn create(base: Option<&Path>, run_id: Uuid) -> io::Result<Self> {
        let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
        fs::create_dir_all(&base)?;
        let root = base.join(format!("geodelta-{}", run_id));
        fs::create_dir(&root)?;

        tracing::debug!(scratch = %root.display(), "created scratch workspace");
        Ok(Self {
            root,
            run_id,
            closed: false,
        })
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the owning run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns true if the artifact exists.
    #[must_use]
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.artifact_path(key).is_file()
    }

    /// Writes a points artifact, replacing any previous one.
    pub fn put_points(&self, key: &ArtifactKey, points: &[RepresentativePoint]) -> io::Result<()> {
        self.write(key, points)
    }

    /// Writes a buffers artifact, replacing any previous one.
    pub fn put_buffers(&self, key: &ArtifactKey, buffers: &[ToleranceBuffer]) -> io::Result<()> {
        self.write(key, buffers)
    }

    /// Reads a points artifact.
    pub fn points(&self, key: &ArtifactKey) -> io::Result<Vec<RepresentativePoint>> {
        self.read(key)
    }

    /// Reads a buffers artifact.
    pub fn buffers(&self, key: &ArtifactKey) -> io::Result<Vec<ToleranceBuffer>> {
        self.read(key)
    }

    /// Rewrites a points artifact keeping only points that satisfy `keep`,
    /// and returns how many remain.
    pub fn retain_points(
        &self,
        key: &ArtifactKey,
        keep: impl FnMut(&RepresentativePoint) -> bool,
    ) -> io::Result<usize> {
        let mut points = self.points(key)?;
        points.retain(keep);
        self.put_points(key, &points)?;
        Ok(points.len())
    }

    /// Deletes an artifact. Missing artifacts are ignored.
    pub fn remove(&self, key: &ArtifactKey) -> io::Result<()> {
        match fs::remove_file(self.artifact_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Lists artifact names currently in the workspace, sorted.
    pub fn keys(&self) -> io::Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Removes the workspace directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns the removal error; the workspace is considered closed either
    /// way.
    pub fn close(mut self) -> io::Result<()> {
        self.closed = true;
        remove_root(&self.root)
    }

    fn artifact_path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn write<T: Serialize + ?Sized>(&self, key: &ArtifactKey, value: &T) -> io::Result<()> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let path = self.artifact_path(key);
        let temp = path.with_extension("tmp");
        let mut file = File::create(&temp)?;
        file.write_all(&bytes)?;
        drop(file);
        fs::rename(temp, path)
    }

    fn read<T: DeserializeOwned>(&self, key: &ArtifactKey) -> io::Result<T> {
        let bytes = fs::read(self.artifact_path(key))?;
        ciborium::from_reader(bytes.as_slice())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = remove_root(&self.root) {
            tracing::warn!(
                scratch = %self.root.display(),
                error = %e,
                "failed to remove scratch workspace"
            );
        }
    }
}

fn remove_root(root: &Path) -> io::Result<()> {
    match fs::remove_dir_all(root) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => {
            tracing::debug!(scratch = %root.display(), "removed scratch workspace");
            Ok(())
        }
    }
}
