//! Planar geometry helpers used by collapse, selection and duplicate
//! suppression.
//!
//! Distances are Euclidean in the snapshot's coordinate units.

use geo::{BoundingRect, Centroid, Contains, Distance, Euclidean, Length, LineInterpolatePoint};
use geo_types::{Geometry, LineString, Point, Polygon};

/// Reduces a geometry to its representative point.
///
/// - polygons: area-weighted centroid
/// - lines: the point at half the total arc length
/// - points: the point itself (a multipoint collapses to its centroid)
///
/// Returns `None` for empty geometries and for variants that have no
/// collection kind.
#[must_use]
pub fn representative_point(geometry: &Geometry<f64>) -> Option<Point<f64>> {
    match geometry {
        Geometry::Polygon(p) => p.centroid(),
        Geometry::MultiPolygon(mp) => mp.centroid(),
        Geometry::Line(line) => line.line_interpolate_point(0.5),
        Geometry::LineString(ls) => point_along(std::slice::from_ref(ls), 0.5),
        Geometry::MultiLineString(mls) => point_along(&mls.0, 0.5),
        Geometry::Point(p) => Some(*p),
        Geometry::MultiPoint(mp) => mp.centroid(),
        _ => None,
    }
}

/// Returns the point at `fraction` of the total length of `parts`, walking
/// the parts in order.
///
/// A zero-length input yields its first vertex.
#[must_use]
pub fn point_along(parts: &[LineString<f64>], fraction: f64) -> Option<Point<f64>> {
    let first = parts.iter().find_map(|ls| ls.0.first().copied())?;
    let lengths: Vec<f64> = parts.iter().map(|ls| ls.length::<Euclidean>()).collect();
    let total: f64 = lengths.iter().sum();
    if total <= 0.0 {
        return Some(first.into());
    }

    let mut remaining = total * fraction.clamp(0.0, 1.0);
    for (ls, &length) in parts.iter().zip(&lengths) {
        if length > 0.0 && remaining <= length {
            return ls.line_interpolate_point(remaining / length);
        }
        remaining -= length;
    }
    // Rounding left a sliver past the final vertex
    parts
        .iter()
        .rev()
        .find_map(|ls| ls.0.last().copied())
        .map(Point::from)
}

/// Distance from a point to the nearest ring of a polygon.
fn boundary_distance(point: Point<f64>, polygon: &Polygon<f64>) -> f64 {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .filter(|ring| !ring.0.is_empty())
        .map(|ring| Euclidean::distance(&point, ring))
        .fold(f64::INFINITY, f64::min)
}

/// Euclidean distance from a point to a geometry; zero inside polygons.
///
/// Returns infinity for empty geometries.
#[must_use]
pub fn distance_to(point: Point<f64>, geometry: &Geometry<f64>) -> f64 {
    if geometry.bounding_rect().is_none() {
        return f64::INFINITY;
    }
    Euclidean::distance(&point, geometry)
}

/// How deep a point sits inside a polygonal geometry.
///
/// Returns the distance to the nearest boundary when the point is strictly
/// inside, and `None` when it is outside, on the boundary, or the geometry
/// is not polygonal.
#[must_use]
pub fn inward_depth(point: Point<f64>, geometry: &Geometry<f64>) -> Option<f64> {
    match geometry {
        Geometry::Polygon(polygon) => polygon
            .contains(&point)
            .then(|| boundary_distance(point, polygon)),
        Geometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .find(|polygon| polygon.contains(&point))
            .map(|polygon| boundary_distance(point, polygon)),
        _ => None,
    }
}
