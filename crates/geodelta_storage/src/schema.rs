//! Attribute schema descriptors.
//!
//! A [`Schema`] is obtained once per collection and is the single source of
//! truth for which fields exist, their types, and whether they accept writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Row identifier maintained by the store.
    ObjectId,
    /// The geometry column.
    Geometry,
    /// 16-bit integer.
    SmallInteger,
    /// 32/64-bit integer.
    Integer,
    /// 32-bit float.
    Single,
    /// 64-bit float.
    Double,
    /// Text of bounded length.
    Text,
    /// Date.
    Date,
    /// User-maintained GUID.
    Guid,
    /// Store-maintained global identifier.
    GlobalId,
}

impl FieldType {
    /// Returns the type name used in field map descriptors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::ObjectId => "OID",
            FieldType::Geometry => "Geometry",
            FieldType::SmallInteger => "SmallInteger",
            FieldType::Integer => "Integer",
            FieldType::Single => "Single",
            FieldType::Double => "Double",
            FieldType::Text => "String",
            FieldType::Date => "Date",
            FieldType::Guid => "Guid",
            FieldType::GlobalId => "GlobalID",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one attribute field of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Data type.
    pub data_type: FieldType,
    /// Declared length (text width or storage size).
    pub length: u32,
    /// Whether the field accepts writes.
    pub is_editable: bool,
    /// Whether the field is an identity (row id) field.
    pub is_identity: bool,
}

impl FieldDescriptor {
    /// Creates an editable, non-identity field.
    pub fn new(name: impl Into<String>, data_type: FieldType, length: u32) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            data_type,
            length,
            is_editable: true,
            is_identity: false,
        }
    }

    /// The `OBJECTID` identity field.
    #[must_use]
    pub fn object_id() -> Self {
        Self {
            is_editable: false,
            is_identity: true,
            ..Self::new("OBJECTID", FieldType::ObjectId, 4)
        }
    }

    /// The `SHAPE` geometry field.
    #[must_use]
    pub fn shape() -> Self {
        Self::new("SHAPE", FieldType::Geometry, 0)
    }

    /// An editable text field.
    pub fn text(name: impl Into<String>, length: u32) -> Self {
        Self::new(name, FieldType::Text, length)
    }

    /// An editable integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer, 4)
    }

    /// An editable double field.
    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Double, 8)
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Marks the field read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.is_editable = false;
        self
    }

    /// Returns true if a store accepts client-supplied values for this field.
    #[must_use]
    pub fn accepts_writes(&self) -> bool {
        self.is_editable
            && !self.is_identity
            && !matches!(
                self.data_type,
                FieldType::ObjectId | FieldType::Geometry | FieldType::GlobalId
            )
    }
}

/// Ordered field list of a collection.
///
/// Enumeration order is declaration order and is preserved through
/// persistence, so anything derived from it is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Creates a schema from fields in declaration order.
    #[must_use]
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Creates the conventional layout: `OBJECTID`, `SHAPE`, then `fields`.
    #[must_use]
    pub fn with_system_fields(fields: Vec<FieldDescriptor>) -> Self {
        let mut all = vec![FieldDescriptor::object_id(), FieldDescriptor::shape()];
        all.extend(fields);
        Self { fields: all }
    }

    /// Iterates fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Looks up a field by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
