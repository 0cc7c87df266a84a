//! Geometry value types and the stored geometry record.
//!
//! # Responsibility
//! - Define the shape types exchanged with geometry sources.
//! - Define the canonical multi-polygon record persisted by the store.
//!
//! # Invariants
//! - A stored `GeometryRecord` always holds a multi-polygon in the canonical
//!   reference system; single polygons are upgraded before storage.
//! - Geometry records are immutable after creation. Re-importing the same
//!   source duplicates them; dedup is deliberately not attempted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::model::catalog::CatalogId;

/// Stable identifier for a stored geometry.
pub type GeometryId = Uuid;

/// One vertex, in the units of its reference system (degrees or meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single polygon: one exterior ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Rings in source order; `rings[0]` is the exterior boundary.
    pub rings: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(rings: Vec<Vec<Coord>>) -> Self {
        Self { rings }
    }

    /// Convenience constructor for a polygon without holes.
    pub fn from_exterior(ring: Vec<Coord>) -> Self {
        Self { rings: vec![ring] }
    }
}

/// Canonical multi-part polygon tagged with its reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    /// EPSG code of the reference system the coordinates are expressed in.
    pub srid: u32,
    pub polygons: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(srid: u32, polygons: Vec<Polygon>) -> Self {
        Self { srid, polygons }
    }

    /// Number of polygon parts.
    pub fn part_count(&self) -> usize {
        self.polygons.len()
    }
}

/// Shape kinds a geometry source can hand us.
///
/// Only `Polygon` and `MultiPolygon` are accepted by normalization; the other
/// kinds exist so unsupported inputs can be named in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Point => "point",
            Self::LineString => "line_string",
            Self::Polygon => "polygon",
            Self::MultiPolygon => "multi_polygon",
        };
        write!(f, "{name}")
    }
}

/// Raw geometry as read from a source file, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl ShapeGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }
}

/// Scalar value carried in geometry-intrinsic metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl MetadataValue {
    /// Numeric view of the value; `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

/// Geometry-intrinsic metadata: precomputed area, perimeter, source object id.
pub type MetadataMap = BTreeMap<String, MetadataValue>;

/// One normalized shape as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRecord {
    /// Stable global ID used for linking attribute records.
    pub uuid: GeometryId,
    /// Owning catalog.
    pub catalog_uuid: CatalogId,
    /// Canonical multi-polygon geometry.
    pub geom: MultiPolygon,
    /// Metadata describing the geometry itself, not its contents.
    pub metadata: MetadataMap,
}

impl GeometryRecord {
    /// Creates a geometry record with a generated stable ID.
    pub fn new(catalog_uuid: CatalogId, geom: MultiPolygon, metadata: MetadataMap) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            catalog_uuid,
            geom,
            metadata,
        }
    }
}
