//! Spatial reference handling and geometry normalization.
//!
//! # Responsibility
//! - Model the reference systems the pipeline can read shapes in.
//! - Normalize source shapes into canonical multi-polygons in EPSG:4326.
//!
//! # Invariants
//! - Normalization output is always multi-part and always in the target
//!   reference system.
//! - Only polygon and multi-polygon inputs are accepted.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::geometry::GeometryKind;

pub mod normalize;
pub mod spatial_ref;

pub use normalize::normalize;
pub use spatial_ref::{CoordTransform, Ellipsoid, SpatialRef};

/// Errors from reference-system resolution and shape normalization.
///
/// All of these are fatal for the shape being imported, never for the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The source handed us a shape kind the pipeline does not store.
    UnsupportedGeometryKind(GeometryKind),
    /// EPSG code with no registered reference-system definition.
    UnknownSpatialRef(u32),
    /// No transform exists between the two reference systems.
    UnsupportedTransform { source_srid: u32, target_srid: u32 },
}

impl Display for NormalizeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedGeometryKind(kind) => {
                write!(f, "unsupported geometry kind `{kind}`; expected polygon or multi-polygon")
            }
            Self::UnknownSpatialRef(srid) => {
                write!(f, "unknown spatial reference EPSG:{srid}")
            }
            Self::UnsupportedTransform {
                source_srid,
                target_srid,
            } => write!(
                f,
                "no transform from EPSG:{source_srid} to EPSG:{target_srid}"
            ),
        }
    }
}

impl Error for NormalizeError {}
