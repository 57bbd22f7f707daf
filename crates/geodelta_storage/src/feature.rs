//! Feature records and their persisted form.

use crate::error::{StoreError, StoreResult};
use crate::model::{RowId, Value};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored record: geometry, attributes and row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Row identifier, unique within the collection.
    pub row_id: RowId,
    /// The geometry, persisted as WKT.
    #[serde(with = "wkt_geometry")]
    pub geometry: Geometry<f64>,
    /// Attribute values keyed by field name.
    pub attributes: BTreeMap<String, Value>,
}

/// A feature about to be appended; the store assigns its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeature {
    /// The geometry.
    pub geometry: Geometry<f64>,
    /// Attribute values keyed by field name.
    pub attributes: BTreeMap<String, Value>,
}

impl NewFeature {
    /// Creates a feature with no attributes.
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute value.
    #[must_use]
    pub fn with_attribute(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }
}

/// Parses a WKT string into a geometry.
pub fn parse_wkt(text: &str) -> StoreResult<Geometry<f64>> {
    use std::str::FromStr;
    wkt::Wkt::from_str(text)
        .map_err(|e| StoreError::Wkt(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| StoreError::Wkt(format!("{:?}", e)))
        })
}

/// Renders a geometry as WKT.
#[must_use]
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    use wkt::ToWkt;
    geometry.wkt_string()
}

mod wkt_geometry {
    use geo_types::Geometry;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(geometry: &Geometry<f64>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_wkt(geometry))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Geometry<f64>, D::Error> {
        let text = String::deserialize(d)?;
        super::parse_wkt(&text).map_err(de::Error::custom)
    }
}
