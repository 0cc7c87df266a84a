//! Attribute record model and the typed attribute bag.
//!
//! # Responsibility
//! - Define the schemaless per-unit attribute bag with explicit, typed
//!   accessors instead of ad hoc map access.
//! - Define the attribute record linking a bag to its geometry.
//!
//! # Invariants
//! - Every attribute record points to exactly one geometry record.
//! - Bag values are strings; numeric interpretation happens at query time.
//! - Merging is last-writer-wins per field; fields absent from the incoming
//!   map are preserved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::model::catalog::CatalogId;
use crate::model::geometry::GeometryId;

/// Stable identifier for an attribute record.
pub type RecordId = Uuid;

/// Typed access failure for a required bag field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field is not present in the bag at all.
    Missing { field: String },
    /// The field is present but its value does not parse as the wanted type.
    Malformed { field: String, value: String },
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "field `{field}` is missing"),
            Self::Malformed { field, value } => {
                write!(f, "field `{field}` has non-numeric value `{value}`")
            }
        }
    }
}

impl Error for FieldError {}

/// String-keyed attribute bag backing one administrative unit.
///
/// The schema is open-ended on purpose: the geometry import seeds a small
/// administrative field set and the tabular merge adds the census columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag(BTreeMap<String, String>);

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw field value, if present.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Field value that must be present.
    pub fn require(&self, field: &str) -> Result<&str, FieldError> {
        self.get(field).ok_or_else(|| FieldError::Missing {
            field: field.to_string(),
        })
    }

    /// Integer view of a field.
    ///
    /// The empty string reads as 0 (census exports use it for "no data").
    /// Absent fields and non-numeric values surface as typed errors so the
    /// caller decides the policy.
    pub fn integer(&self, field: &str) -> Result<i64, FieldError> {
        let raw = self.require(field)?;
        if raw.is_empty() {
            return Ok(0);
        }
        raw.trim()
            .parse::<i64>()
            .map_err(|_| FieldError::Malformed {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Merges `incoming` into this bag, incoming values winning on collision.
    pub fn merge_from(&mut self, incoming: &BTreeMap<String, String>) {
        for (field, value) in incoming {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// Number of fields currently in the bag.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for AttributeBag {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One unit's attribute bag, linked to its catalog and geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub uuid: RecordId,
    pub catalog_uuid: CatalogId,
    /// Required owning geometry; composition, never shared.
    pub geometry_uuid: GeometryId,
    pub data: AttributeBag,
}

impl AttributeRecord {
    /// Creates an attribute record with a generated stable ID.
    pub fn new(catalog_uuid: CatalogId, geometry_uuid: GeometryId, data: AttributeBag) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            catalog_uuid,
            geometry_uuid,
            data,
        }
    }
}
