//! In-memory representation of one collection, shared by both backends.

use crate::error::{StoreError, StoreResult};
use crate::feature::{Feature, NewFeature};
use crate::model::{CollectionInfo, CollectionRef, GeometryKind, RowId};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A collection's schema and features.
///
/// Features are kept sorted by row id. Row ids are assigned from a
/// monotonically increasing counter and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionData {
    /// Where the collection lives.
    pub reference: CollectionRef,
    /// Geometry kind of every feature.
    pub kind: GeometryKind,
    /// Attribute schema.
    pub schema: Schema,
    features: Vec<Feature>,
    next_row_id: u64,
}

impl CollectionData {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(reference: CollectionRef, kind: GeometryKind, schema: Schema) -> Self {
        Self {
            reference,
            kind,
            schema,
            features: Vec::new(),
            next_row_id: 1,
        }
    }

    /// Returns the collection summary.
    #[must_use]
    pub fn info(&self) -> CollectionInfo {
        CollectionInfo {
            reference: self.reference.clone(),
            kind: self.kind,
            feature_count: self.features.len(),
        }
    }

    /// Returns all features ordered by row id.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Validates and appends features, returning their new row ids.
    ///
    /// Validation happens for the whole batch before anything is written,
    /// so a rejected batch leaves the collection unchanged.
    pub fn append(&mut self, features: Vec<NewFeature>) -> StoreResult<Vec<RowId>> {
        for feature in &features {
            self.validate(feature)?;
        }

        let mut ids = Vec::with_capacity(features.len());
        for feature in features {
            let row_id = RowId(self.next_row_id);
            self.next_row_id += 1;
            self.features.push(Feature {
                row_id,
                geometry: feature.geometry,
                attributes: feature.attributes,
            });
            ids.push(row_id);
        }
        Ok(ids)
    }

    /// Deletes exactly the listed rows, returning how many existed.
    pub fn delete(&mut self, row_ids: &[RowId]) -> usize {
        let doomed: HashSet<RowId> = row_ids.iter().copied().collect();
        let before = self.features.len();
        self.features.retain(|f| !doomed.contains(&f.row_id));
        before - self.features.len()
    }

    fn validate(&self, feature: &NewFeature) -> StoreResult<()> {
        match GeometryKind::of(&feature.geometry) {
            Some(kind) if kind == self.kind => {}
            other => {
                return Err(StoreError::GeometryKindMismatch {
                    collection: self.reference.clone(),
                    expected: self.kind,
                    actual: other.map_or_else(|| "unsupported".to_string(), |k| k.to_string()),
                })
            }
        }

        for name in feature.attributes.keys() {
            let field = self
                .schema
                .field(name)
                .ok_or_else(|| StoreError::UnknownField {
                    collection: self.reference.clone(),
                    field: name.clone(),
                })?;
            if !field.accepts_writes() {
                return Err(StoreError::FieldNotEditable {
                    collection: self.reference.clone(),
                    field: name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;
    use geo_types::{line_string, point};

    fn points() -> CollectionData {
        CollectionData::new(
            CollectionRef::new("WELLS"),
            GeometryKind::Point,
            Schema::with_system_fields(vec![FieldDescriptor::text("NAME", 20)]),
        )
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let mut c = points();
        let ids = c
            .append(vec![
                NewFeature::new(point!(x: 0.0, y: 0.0)),
                NewFeature::new(point!(x: 1.0, y: 0.0)),
            ])
            .unwrap();
        assert_eq!(ids, vec![RowId(1), RowId(2)]);
        assert_eq!(c.info().feature_count, 2);
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let mut c = points();
        c.append(vec![NewFeature::new(point!(x: 0.0, y: 0.0))]).unwrap();
        assert_eq!(c.delete(&[RowId(1)]), 1);
        let ids = c.append(vec![NewFeature::new(point!(x: 0.0, y: 0.0))]).unwrap();
        assert_eq!(ids, vec![RowId(2)]);
    }

    #[test]
    fn delete_is_scoped_to_listed_ids() {
        let mut c = points();
        c.append(vec![
            NewFeature::new(point!(x: 0.0, y: 0.0)),
            NewFeature::new(point!(x: 1.0, y: 0.0)),
            NewFeature::new(point!(x: 2.0, y: 0.0)),
        ])
        .unwrap();
        assert_eq!(c.delete(&[RowId(2), RowId(99)]), 1);
        let remaining: Vec<_> = c.features().iter().map(|f| f.row_id).collect();
        assert_eq!(remaining, vec![RowId(1), RowId(3)]);
    }

    #[test]
    fn rejects_wrong_kind_without_partial_write() {
        let mut c = points();
        let result = c.append(vec![
            NewFeature::new(point!(x: 0.0, y: 0.0)),
            NewFeature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]);
        assert!(matches!(result, Err(StoreError::GeometryKindMismatch { .. })));
        assert_eq!(c.info().feature_count, 0);
    }

    #[test]
    fn rejects_identity_and_unknown_fields() {
        let mut c = points();
        let result = c.append(vec![
            NewFeature::new(point!(x: 0.0, y: 0.0)).with_attribute("OBJECTID", 5_i64)
        ]);
        assert!(matches!(result, Err(StoreError::FieldNotEditable { .. })));

        let result = c.append(vec![
            NewFeature::new(point!(x: 0.0, y: 0.0)).with_attribute("COLOUR", "red")
        ]);
        assert!(matches!(result, Err(StoreError::UnknownField { .. })));
    }
}
