//! Catalog and field-name dictionary models.
//!
//! # Responsibility
//! - Define the dataset scope every stored record belongs to.
//! - Define the presentation-only friendly-name side table.
//!
//! # Invariants
//! - `name` is the external identifier of a catalog and is never regenerated.
//! - A friendly-name mapping is written once per catalog and never consulted
//!   by import, merge, or aggregation logic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier for a catalog.
pub type CatalogId = Uuid;

/// One logical dataset. There is one catalog per import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub uuid: CatalogId,
    /// Short unique name, e.g. `Census-ES-2011`.
    pub name: String,
    /// Human-readable description of the dataset.
    pub description: String,
}

impl Catalog {
    /// Creates a catalog with a generated stable ID.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Raw field key to human-readable label mapping for one catalog.
///
/// Built by an external collaborator from the dataset's description workbook;
/// the core only persists and returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendlyNameMapping {
    pub catalog_uuid: CatalogId,
    pub mapping: BTreeMap<String, String>,
}

impl FriendlyNameMapping {
    pub fn new(catalog_uuid: CatalogId, mapping: BTreeMap<String, String>) -> Self {
        Self {
            catalog_uuid,
            mapping,
        }
    }

    /// Label for a raw field key, if the dictionary knows it.
    pub fn label(&self, field: &str) -> Option<&str> {
        self.mapping.get(field).map(String::as_str)
    }
}
