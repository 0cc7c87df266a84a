//! Spatial reference definitions and coordinate transforms.
//!
//! # Responsibility
//! - Resolve the EPSG codes the supported source files are published in.
//! - Transform projected coordinates into geographic longitude/latitude.
//!
//! # Invariants
//! - Transform targets are geographic; the store's canonical system is
//!   EPSG:4326.
//! - ETRS89/NAD83 to WGS84 datum shifts are identity: the deltas are below
//!   the precision of the source data.

use crate::geo::NormalizeError;
use crate::model::geometry::Coord;

/// Canonical storage reference system (WGS84 geographic).
pub const CANONICAL_SRID: u32 = 4326;

/// Reference ellipsoid parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major_m: f64,
    pub inv_flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        semi_major_m: 6_378_137.0,
        inv_flattening: 298.257_223_563,
    };

    /// GRS 1980, used by ETRS89 and NAD83.
    pub const GRS80: Ellipsoid = Ellipsoid {
        semi_major_m: 6_378_137.0,
        inv_flattening: 298.257_222_101,
    };

    /// First eccentricity squared.
    fn e2(&self) -> f64 {
        let f = 1.0 / self.inv_flattening;
        f * (2.0 - f)
    }
}

/// A reference system a source file can declare.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialRef {
    /// Geographic longitude/latitude in degrees.
    Geographic { srid: u32 },
    /// Projected transverse Mercator (the UTM family).
    TransverseMercator {
        srid: u32,
        central_meridian_deg: f64,
        scale_factor: f64,
        false_easting_m: f64,
        false_northing_m: f64,
        ellipsoid: Ellipsoid,
    },
}

impl SpatialRef {
    /// The canonical WGS84 geographic system.
    pub fn wgs84() -> Self {
        Self::Geographic {
            srid: CANONICAL_SRID,
        }
    }

    /// Resolves a known EPSG code.
    ///
    /// Supported: geographic 4326/4258/4269, ETRS89 UTM zones 28N-31N
    /// (25828-25831), WGS84 UTM zones 28N-31N (32628-32631). That covers the
    /// national grids Iberian census shapefiles are published in.
    pub fn from_epsg(srid: u32) -> Result<Self, NormalizeError> {
        match srid {
            4326 | 4258 | 4269 => Ok(Self::Geographic { srid }),
            25828..=25831 => Ok(Self::utm(srid, srid - 25800, Ellipsoid::GRS80)),
            32628..=32631 => Ok(Self::utm(srid, srid - 32600, Ellipsoid::WGS84)),
            other => Err(NormalizeError::UnknownSpatialRef(other)),
        }
    }

    fn utm(srid: u32, zone: u32, ellipsoid: Ellipsoid) -> Self {
        Self::TransverseMercator {
            srid,
            central_meridian_deg: f64::from(zone) * 6.0 - 183.0,
            scale_factor: 0.9996,
            false_easting_m: 500_000.0,
            false_northing_m: 0.0,
            ellipsoid,
        }
    }

    pub fn srid(&self) -> u32 {
        match self {
            Self::Geographic { srid } => *srid,
            Self::TransverseMercator { srid, .. } => *srid,
        }
    }
}

/// Vertex transform from a source reference system to a geographic target.
#[derive(Debug, Clone)]
pub struct CoordTransform {
    source: SpatialRef,
    target_srid: u32,
}

impl CoordTransform {
    /// Builds a transform between two reference systems.
    ///
    /// The target must be geographic; projected targets are not part of this
    /// pipeline and yield `UnsupportedTransform`.
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<Self, NormalizeError> {
        match target {
            SpatialRef::Geographic { srid } => Ok(Self {
                source: source.clone(),
                target_srid: *srid,
            }),
            SpatialRef::TransverseMercator { srid, .. } => {
                Err(NormalizeError::UnsupportedTransform {
                    source_srid: source.srid(),
                    target_srid: *srid,
                })
            }
        }
    }

    /// Transforms one vertex into target longitude/latitude degrees.
    pub fn apply(&self, coord: Coord) -> Coord {
        match &self.source {
            // Geographic sources pass through: datum deltas are identity here.
            SpatialRef::Geographic { .. } => coord,
            SpatialRef::TransverseMercator {
                central_meridian_deg,
                scale_factor,
                false_easting_m,
                false_northing_m,
                ellipsoid,
                ..
            } => inverse_transverse_mercator(
                coord,
                *central_meridian_deg,
                *scale_factor,
                *false_easting_m,
                *false_northing_m,
                *ellipsoid,
            ),
        }
    }
}

/// Inverse transverse Mercator projection, standard series expansion
/// (Snyder, "Map Projections: A Working Manual", eqs. 8-12 to 8-25).
///
/// Input is easting/northing in meters; output is longitude/latitude degrees.
fn inverse_transverse_mercator(
    coord: Coord,
    central_meridian_deg: f64,
    k0: f64,
    false_easting_m: f64,
    false_northing_m: f64,
    ellipsoid: Ellipsoid,
) -> Coord {
    let a = ellipsoid.semi_major_m;
    let e2 = ellipsoid.e2();
    let ep2 = e2 / (1.0 - e2);

    let x = coord.x - false_easting_m;
    let y = coord.y - false_northing_m;

    // Footpoint latitude from the meridian arc.
    let m = y / k0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let n1 = a / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * k0);

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * ep2
                    - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lambda = central_meridian_deg.to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Coord::new(lambda.to_degrees(), phi.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::{CoordTransform, SpatialRef, CANONICAL_SRID};
    use crate::geo::NormalizeError;
    use crate::model::geometry::Coord;

    fn etrs89_utm30_to_wgs84() -> CoordTransform {
        let source = SpatialRef::from_epsg(25830).unwrap();
        CoordTransform::new(&source, &SpatialRef::wgs84()).unwrap()
    }

    #[test]
    fn resolves_known_epsg_codes() {
        assert_eq!(SpatialRef::from_epsg(4326).unwrap().srid(), CANONICAL_SRID);
        assert!(matches!(
            SpatialRef::from_epsg(25830).unwrap(),
            SpatialRef::TransverseMercator {
                central_meridian_deg,
                ..
            } if central_meridian_deg == -3.0
        ));
    }

    #[test]
    fn unknown_epsg_code_is_rejected() {
        assert_eq!(
            SpatialRef::from_epsg(3857),
            Err(NormalizeError::UnknownSpatialRef(3857))
        );
    }

    #[test]
    fn projected_target_is_rejected() {
        let projected = SpatialRef::from_epsg(25830).unwrap();
        let err = CoordTransform::new(&SpatialRef::wgs84(), &projected).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::UnsupportedTransform {
                source_srid: 4326,
                target_srid: 25830,
            }
        );
    }

    #[test]
    fn geographic_source_passes_through_unchanged() {
        let source = SpatialRef::from_epsg(4258).unwrap();
        let transform = CoordTransform::new(&source, &SpatialRef::wgs84()).unwrap();
        let out = transform.apply(Coord::new(-3.7, 40.4));
        assert_eq!(out.x, -3.7);
        assert_eq!(out.y, 40.4);
    }

    #[test]
    fn utm_central_meridian_on_equator_maps_exactly() {
        let transform = etrs89_utm30_to_wgs84();
        let out = transform.apply(Coord::new(500_000.0, 0.0));
        assert!((out.x - -3.0).abs() < 1e-9, "lon {}", out.x);
        assert!(out.y.abs() < 1e-9, "lat {}", out.y);
    }

    #[test]
    fn utm_longitudes_are_symmetric_about_central_meridian() {
        let transform = etrs89_utm30_to_wgs84();
        let west = transform.apply(Coord::new(400_000.0, 4_400_000.0));
        let east = transform.apply(Coord::new(600_000.0, 4_400_000.0));
        assert!((west.x + east.x - 2.0 * -3.0).abs() < 1e-6);
        assert!((west.y - east.y).abs() < 1e-6);
    }

    #[test]
    fn utm_latitude_grows_with_northing() {
        let transform = etrs89_utm30_to_wgs84();
        let south = transform.apply(Coord::new(440_000.0, 4_300_000.0));
        let north = transform.apply(Coord::new(440_000.0, 4_500_000.0));
        assert!(north.y > south.y);
        // ~200 km of northing is a little under 2 degrees of latitude.
        assert!((north.y - south.y) > 1.6 && (north.y - south.y) < 2.0);
    }

    #[test]
    fn utm_meridian_arc_places_madrid_latitude() {
        // On the central meridian, northing k0 * 4,429,529 m is the GRS80
        // meridian arc to 40 degrees north.
        let transform = etrs89_utm30_to_wgs84();
        let out = transform.apply(Coord::new(500_000.0, 0.9996 * 4_429_529.0));
        assert!((out.x - -3.0).abs() < 1e-9);
        assert!((out.y - 40.0).abs() < 0.05, "lat {}", out.y);
    }
}
