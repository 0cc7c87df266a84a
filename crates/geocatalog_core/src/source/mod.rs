//! Contracts for the external data-retrieval collaborators.
//!
//! # Responsibility
//! - Define what the core consumes from shapefile and tabular readers.
//! - Provide in-memory implementations for tests and embedding callers.
//!
//! # Invariants
//! - Download, extraction, and file parsing live outside the core; failures
//!   there never enter the pipeline's error domain.
//! - Shapes and rows are consumed in source iteration order.

use std::collections::BTreeMap;

use crate::geo::spatial_ref::SpatialRef;
use crate::model::geometry::{MetadataValue, ShapeGeometry};

/// One attribute value as read from a shapefile's attribute table.
///
/// DBF columns carry text, integers, or reals; that is the full set.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    /// String rendering used when the value lands in an attribute bag.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
        }
    }

    /// Scalar rendering used when the value lands in geometry metadata.
    pub fn to_metadata(&self) -> MetadataValue {
        match self {
            Self::Text(value) => MetadataValue::Text(value.clone()),
            Self::Integer(value) => MetadataValue::Integer(*value),
            Self::Real(value) => MetadataValue::Real(*value),
        }
    }
}

/// One shape read from a geometry source: raw geometry plus named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceShape {
    pub geometry: ShapeGeometry,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SourceShape {
    pub fn new(geometry: ShapeGeometry, fields: BTreeMap<String, FieldValue>) -> Self {
        Self { geometry, fields }
    }
}

/// Contract implemented by external geometry readers (shapefile adapters).
pub trait ShapeSource {
    /// Reference system declared by the source file's projection metadata.
    fn spatial_ref(&self) -> &SpatialRef;

    /// Shapes in file order.
    fn read_shapes(&mut self) -> Box<dyn Iterator<Item = SourceShape> + '_>;
}

/// Contract implemented by external tabular readers (CSV adapters).
pub trait TabularSource {
    /// Header row naming fields positionally.
    fn header(&self) -> &[String];

    /// Raw data rows, lazily, in file order.
    fn rows(&mut self) -> Box<dyn Iterator<Item = Vec<String>> + '_>;
}

/// In-memory shape source for tests and embedding callers.
#[derive(Debug, Clone)]
pub struct MemoryShapeSource {
    spatial_ref: SpatialRef,
    shapes: Vec<SourceShape>,
}

impl MemoryShapeSource {
    pub fn new(spatial_ref: SpatialRef, shapes: Vec<SourceShape>) -> Self {
        Self {
            spatial_ref,
            shapes,
        }
    }
}

impl ShapeSource for MemoryShapeSource {
    fn spatial_ref(&self) -> &SpatialRef {
        &self.spatial_ref
    }

    fn read_shapes(&mut self) -> Box<dyn Iterator<Item = SourceShape> + '_> {
        Box::new(self.shapes.iter().cloned())
    }
}

/// In-memory tabular source for tests and embedding callers.
#[derive(Debug, Clone)]
pub struct MemoryTabularSource {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryTabularSource {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }
}

impl TabularSource for MemoryTabularSource {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn rows(&mut self) -> Box<dyn Iterator<Item = Vec<String>> + '_> {
        Box::new(self.rows.iter().cloned())
    }
}
