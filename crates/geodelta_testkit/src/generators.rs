//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use geodelta_storage::{FieldDescriptor, FieldType, Schema};
use proptest::prelude::*;
use std::collections::HashSet;

/// Strategy for coordinates on an integer grid.
///
/// Integer coordinates keep offsets by small binary fractions exact,
/// which boundary tests rely on.
pub fn grid_coord_strategy() -> impl Strategy<Value = (f64, f64)> {
    (-100_000i32..100_000, -100_000i32..100_000).prop_map(|(x, y)| (f64::from(x), f64::from(y)))
}

/// Strategy for distinct points on a grid of pitch `spacing`, so any two
/// points are at least `spacing` apart.
pub fn sparse_points_strategy(
    max_len: usize,
    spacing: f64,
) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::btree_set((0u32..1000, 0u32..1000), 1..=max_len).prop_map(move |cells| {
        cells
            .into_iter()
            .map(|(cx, cy)| (f64::from(cx) * spacing, f64::from(cy) * spacing))
            .collect()
    })
}

/// Strategy for field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for writable field types.
pub fn field_type_strategy() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::SmallInteger),
        Just(FieldType::Integer),
        Just(FieldType::Single),
        Just(FieldType::Double),
        Just(FieldType::Text),
        Just(FieldType::Date),
        Just(FieldType::Guid),
        Just(FieldType::GlobalId),
    ]
}

/// Strategy for a field descriptor with random flags.
pub fn field_strategy() -> impl Strategy<Value = FieldDescriptor> {
    (
        field_name_strategy(),
        field_type_strategy(),
        1u32..255,
        any::<bool>(),
        prop::bool::weighted(0.1),
    )
        .prop_map(|(name, data_type, length, editable, identity)| FieldDescriptor {
            alias: name.to_lowercase(),
            name,
            data_type,
            length,
            is_editable: editable,
            is_identity: identity,
        })
}

/// Strategy for a schema with the system fields and unique field names.
pub fn schema_strategy() -> impl Strategy<Value = Schema> {
    prop::collection::vec(field_strategy(), 0..12).prop_map(|fields| {
        let mut seen: HashSet<String> =
            ["OBJECTID", "SHAPE"].iter().map(|s| s.to_string()).collect();
        let unique = fields
            .into_iter()
            .filter(|f| seen.insert(f.name.clone()))
            .collect();
        Schema::with_system_fields(unique)
    })
}
