//! Schema field mapper.
//!
//! Decides which attribute fields can be copied from a latest collection
//! into its initial counterpart.

use geodelta_storage::{Feature, FieldType, Schema, Value};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Field names that are never mapped, whatever their descriptors say.
pub const EXCLUDED_FIELDS: [&str; 5] =
    ["OBJECT_ID", "OBJECTID", "OBJECT_ID1", "OBJECT_ID2", "SHAPE"];

/// One source-to-target field correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    /// Field name in the latest collection.
    pub source: String,
    /// Field name in the initial collection.
    pub target: String,
    /// Target field type.
    pub data_type: FieldType,
    /// Target field length.
    pub length: u32,
}

/// Ordered list of transferable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    mappings: Vec<FieldMapping>,
}

impl FieldMap {
    /// Builds the map for copying from `source` into `target`.
    ///
    /// A target field is eligible when it accepts writes (editable, not an
    /// identity or geometry field) and is not in [`EXCLUDED_FIELDS`].
    /// Entries follow source enumeration order; fields present on one side
    /// only are dropped silently.
    #[must_use]
    pub fn build(source: &Schema, target: &Schema) -> Self {
        let mappings = source
            .fields()
            .filter_map(|field| {
                let target_field = target.field(&field.name)?;
                let excluded = EXCLUDED_FIELDS
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&target_field.name));
                (target_field.accepts_writes() && !excluded).then(|| FieldMapping {
                    source: field.name.clone(),
                    target: target_field.name.clone(),
                    data_type: target_field.data_type,
                    length: target_field.length,
                })
            })
            .collect();
        Self { mappings }
    }

    /// Mappings in order.
    #[must_use]
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// Number of mapped fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns true if no field can be transferred.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Renders the map as `source>target:type:length;` entries.
    #[must_use]
    pub fn descriptor(&self) -> String {
        self.mappings
            .iter()
            .map(|m| format!("{}>{}:{}:{};", m.source, m.target, m.data_type, m.length))
            .collect()
    }

    /// Hex SHA-256 of [`FieldMap::descriptor`].
    #[must_use]
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.descriptor().as_bytes());
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Projects a source feature's attributes onto target field names.
    ///
    /// Unmapped attributes are dropped; mapped fields the feature lacks are
    /// left out rather than written as null.
    #[must_use]
    pub fn apply(&self, feature: &Feature) -> BTreeMap<String, Value> {
        self.mappings
            .iter()
            .filter_map(|m| {
                feature
                    .attributes
                    .get(&m.source)
                    .map(|value| (m.target.clone(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodelta_storage::{FieldDescriptor, RowId};

    fn source() -> Schema {
        Schema::with_system_fields(vec![
            FieldDescriptor::text("OWNER", 60),
            FieldDescriptor::integer("LOT_NO"),
            FieldDescriptor::integer("OBJECT_ID1"),
            FieldDescriptor::text("SOURCE_ONLY", 10),
            FieldDescriptor::double("AREA"),
            FieldDescriptor::text("GLOBALID", 38),
        ])
    }

    fn target() -> Schema {
        Schema::with_system_fields(vec![
            FieldDescriptor::double("AREA").read_only(),
            FieldDescriptor::integer("LOT_NO"),
            FieldDescriptor::text("OWNER", 80),
            FieldDescriptor::integer("OBJECT_ID1"),
            FieldDescriptor::text("TARGET_ONLY", 10),
            FieldDescriptor::new("GLOBALID", FieldType::GlobalId, 38),
        ])
    }

    #[test]
    fn follows_source_order_and_target_descriptors() {
        let map = FieldMap::build(&source(), &target());
        let names: Vec<_> = map.mappings().iter().map(|m| m.target.as_str()).collect();
        assert_eq!(names, vec!["OWNER", "LOT_NO"]);
        assert_eq!(map.mappings()[0].length, 80);
        assert_eq!(map.descriptor(), "OWNER>OWNER:String:80;LOT_NO>LOT_NO:Integer:4;");
    }

    #[test]
    fn digest_is_stable() {
        let a = FieldMap::build(&source(), &target());
        let b = FieldMap::build(&source(), &target());
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_ne!(a.digest(), FieldMap::default().digest());
    }

    #[test]
    fn disjoint_schemas_map_nothing() {
        let a = Schema::with_system_fields(vec![FieldDescriptor::text("A", 1)]);
        let b = Schema::with_system_fields(vec![FieldDescriptor::text("B", 1)]);
        let map = FieldMap::build(&a, &b);
        assert!(map.is_empty());
        assert_eq!(map.descriptor(), "");
    }

    #[test]
    fn exclusion_is_case_insensitive() {
        let s = Schema::new(vec![FieldDescriptor::integer("ObjectId")]);
        assert!(FieldMap::build(&s, &s).is_empty());
    }

    #[test]
    fn apply_projects_attributes() {
        let map = FieldMap::build(&source(), &target());
        let feature = Feature {
            row_id: RowId(1),
            geometry: geo_types::point!(x: 0.0, y: 0.0).into(),
            attributes: BTreeMap::from([
                ("OWNER".to_string(), Value::from("Crown")),
                ("SOURCE_ONLY".to_string(), Value::from("x")),
                ("AREA".to_string(), Value::from(12.5)),
            ]),
        };
        let attrs = map.apply(&feature);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["OWNER"], Value::Text("Crown".into()));
    }
}
