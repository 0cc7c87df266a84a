//! Geometry normalizer.
//!
//! # Responsibility
//! - Reproject source shapes into the target reference system.
//! - Upgrade single polygons to one-part multi-polygons.
//!
//! # Invariants
//! - Output part count equals input part count (one for single polygons).
//! - Pure transform; no store access, no side effects.

use crate::geo::spatial_ref::{CoordTransform, SpatialRef};
use crate::geo::NormalizeError;
use crate::model::geometry::{MultiPolygon, Polygon, ShapeGeometry};

/// Normalizes one source shape into a canonical multi-polygon.
///
/// Accepts polygons and multi-polygons only; everything else fails with
/// [`NormalizeError::UnsupportedGeometryKind`]. Every vertex is transformed
/// from `source` into `target` coordinates.
pub fn normalize(
    shape: &ShapeGeometry,
    source: &SpatialRef,
    target: &SpatialRef,
) -> Result<MultiPolygon, NormalizeError> {
    let transform = CoordTransform::new(source, target)?;

    let polygons = match shape {
        ShapeGeometry::Polygon(polygon) => vec![transform_polygon(polygon, &transform)],
        ShapeGeometry::MultiPolygon(parts) => parts
            .iter()
            .map(|polygon| transform_polygon(polygon, &transform))
            .collect(),
        other => return Err(NormalizeError::UnsupportedGeometryKind(other.kind())),
    };

    Ok(MultiPolygon::new(target.srid(), polygons))
}

fn transform_polygon(polygon: &Polygon, transform: &CoordTransform) -> Polygon {
    Polygon::new(
        polygon
            .rings
            .iter()
            .map(|ring| ring.iter().map(|coord| transform.apply(*coord)).collect())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::normalize;
    use crate::geo::spatial_ref::SpatialRef;
    use crate::geo::NormalizeError;
    use crate::model::geometry::{Coord, GeometryKind, Polygon, ShapeGeometry};

    fn square(origin: Coord, side: f64) -> Polygon {
        Polygon::from_exterior(vec![
            origin,
            Coord::new(origin.x + side, origin.y),
            Coord::new(origin.x + side, origin.y + side),
            Coord::new(origin.x, origin.y + side),
            origin,
        ])
    }

    #[test]
    fn single_polygon_is_upgraded_to_one_part_multi_polygon() {
        let shape = ShapeGeometry::Polygon(square(Coord::new(-3.7, 40.3), 0.1));
        let source = SpatialRef::from_epsg(4258).unwrap();

        let normalized = normalize(&shape, &source, &SpatialRef::wgs84()).unwrap();

        assert_eq!(normalized.part_count(), 1);
        assert_eq!(normalized.srid, 4326);
        assert_eq!(normalized.polygons[0].rings[0].len(), 5);
    }

    #[test]
    fn multi_polygon_preserves_part_count() {
        let shape = ShapeGeometry::MultiPolygon(vec![
            square(Coord::new(0.0, 0.0), 1.0),
            square(Coord::new(5.0, 5.0), 1.0),
            square(Coord::new(9.0, 9.0), 0.5),
        ]);
        let source = SpatialRef::from_epsg(4326).unwrap();

        let normalized = normalize(&shape, &source, &SpatialRef::wgs84()).unwrap();

        assert_eq!(normalized.part_count(), 3);
    }

    #[test]
    fn projected_vertices_are_reprojected() {
        let shape = ShapeGeometry::Polygon(square(Coord::new(440_000.0, 4_400_000.0), 1_000.0));
        let source = SpatialRef::from_epsg(25830).unwrap();

        let normalized = normalize(&shape, &source, &SpatialRef::wgs84()).unwrap();

        // Every vertex must now be in plausible lon/lat range for Spain.
        for coord in &normalized.polygons[0].rings[0] {
            assert!(coord.x > -4.5 && coord.x < -3.0, "lon {}", coord.x);
            assert!(coord.y > 39.0 && coord.y < 41.0, "lat {}", coord.y);
        }
    }

    #[test]
    fn interior_rings_survive_normalization() {
        let mut polygon = square(Coord::new(0.0, 0.0), 10.0);
        polygon.rings.push(vec![
            Coord::new(4.0, 4.0),
            Coord::new(6.0, 4.0),
            Coord::new(6.0, 6.0),
            Coord::new(4.0, 4.0),
        ]);
        let shape = ShapeGeometry::Polygon(polygon);

        let normalized =
            normalize(&shape, &SpatialRef::wgs84(), &SpatialRef::wgs84()).unwrap();

        assert_eq!(normalized.polygons[0].rings.len(), 2);
    }

    #[test]
    fn points_and_lines_are_rejected() {
        let source = SpatialRef::wgs84();

        let point = ShapeGeometry::Point(Coord::new(0.0, 0.0));
        assert_eq!(
            normalize(&point, &source, &SpatialRef::wgs84()),
            Err(NormalizeError::UnsupportedGeometryKind(GeometryKind::Point))
        );

        let line = ShapeGeometry::LineString(vec![Coord::new(0.0, 0.0), Coord::new(1.0, 1.0)]);
        assert_eq!(
            normalize(&line, &source, &SpatialRef::wgs84()),
            Err(NormalizeError::UnsupportedGeometryKind(
                GeometryKind::LineString
            ))
        );
    }
}
