//! Core identifiers and value types shared by every store.

use crate::error::{StoreError, StoreResult};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The geometry kind shared by every feature of a collection.
///
/// Ordering follows the processing order of a run: polygons first,
/// then lines, then points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    /// Polygon or multipolygon features.
    Polygon,
    /// Linestring or multilinestring features.
    Line,
    /// Point or multipoint features.
    Point,
}

impl GeometryKind {
    /// All kinds in processing order.
    pub const ALL: [GeometryKind; 3] = [
        GeometryKind::Polygon,
        GeometryKind::Line,
        GeometryKind::Point,
    ];

    /// Classifies a geometry, returning `None` for unsupported variants.
    #[must_use]
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Some(GeometryKind::Polygon),
            Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_) => {
                Some(GeometryKind::Line)
            }
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(GeometryKind::Point),
            _ => None,
        }
    }

    /// Returns the lowercase label used in logs and artifact keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            GeometryKind::Polygon => "polygon",
            GeometryKind::Line => "line",
            GeometryKind::Point => "point",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a collection inside a store: an optional container
/// (feature dataset) plus the collection name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
    /// Containing dataset, `None` for standalone collections.
    pub container: Option<String>,
    /// Collection name, possibly owner-qualified (`SDE.PARCELS`).
    pub name: String,
}

impl CollectionRef {
    /// Creates a reference to a standalone collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            container: None,
            name: name.into(),
        }
    }

    /// Creates a reference to a collection inside a container.
    pub fn in_container(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            name: name.into(),
        }
    }

    /// Returns the name with any owner qualifier stripped.
    ///
    /// `SDE.PARCELS` and `PARCELS` share the base name `PARCELS`; collections
    /// are matched across snapshots by this name. Only the leading
    /// qualifier is an owner: `SDE.ROADS.V2` has the base name `ROADS.V2`.
    #[must_use]
    pub fn base_name(&self) -> &str {
        strip_owner(&self.name)
    }

    /// Returns the container with any owner qualifier stripped.
    #[must_use]
    pub fn base_container(&self) -> Option<&str> {
        self.container.as_deref().map(strip_owner)
    }

    /// Checks that the container and name are usable as single path
    /// components.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for empty names, `.` or `..`, and names holding
    /// a path separator or NUL.
    pub fn validate(&self) -> StoreResult<()> {
        if let Some(container) = &self.container {
            check_component(self, container)?;
        }
        check_component(self, &self.name)
    }
}

fn strip_owner(name: &str) -> &str {
    match name.split_once('.') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => name,
    }
}

fn check_component(reference: &CollectionRef, component: &str) -> StoreResult<()> {
    let reason = if component.is_empty() {
        "is empty"
    } else if component == "." || component == ".." {
        "is a relative path"
    } else if component.contains(['/', '\\', '\0']) {
        "contains a path separator"
    } else {
        return Ok(());
    };
    Err(StoreError::invalid_name(reference, format!("{component:?} {reason}")))
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{}/{}", container, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Row identifier, unique within one collection.
///
/// Not stable across snapshots: the same geometry may carry different
/// row ids in the initial and latest extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl RowId {
    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Missing value.
    Null,
    /// Integer of any width.
    Integer(i64),
    /// Floating point of any width.
    Double(f64),
    /// Text.
    Text(String),
    /// Date in ISO-8601 form.
    Date(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Summary of one collection as enumerated by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Where the collection lives.
    pub reference: CollectionRef,
    /// Geometry kind of its features.
    pub kind: GeometryKind,
    /// Number of features currently stored.
    pub feature_count: usize,
}
