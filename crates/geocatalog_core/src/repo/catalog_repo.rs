//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide catalog lookup/creation and the friendly-name side table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Catalog names are unique; `find_or_create` never regenerates an
//!   existing catalog.
//! - Friendly-name mappings are write-once per catalog.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::model::catalog::{Catalog, CatalogId, FriendlyNameMapping};
use crate::repo::{ensure_schema_ready, parse_uuid_column, RepoError, RepoResult};

/// Repository interface for catalog and friendly-name persistence.
pub trait CatalogRepository {
    /// Returns the catalog with this name, creating it if absent.
    ///
    /// An existing catalog keeps its stored description; the argument is only
    /// used on first creation.
    fn find_or_create_catalog(&self, name: &str, description: &str) -> RepoResult<Catalog>;

    fn find_catalog_by_name(&self, name: &str) -> RepoResult<Option<Catalog>>;

    /// Persists the write-once field-name dictionary for a catalog.
    fn save_friendly_names(&self, mapping: &FriendlyNameMapping) -> RepoResult<()>;

    fn friendly_names(&self, catalog: CatalogId) -> RepoResult<Option<FriendlyNameMapping>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Wraps a migrated connection, rejecting unbootstrapped ones.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["catalogs", "friendly_names"])?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn find_or_create_catalog(&self, name: &str, description: &str) -> RepoResult<Catalog> {
        if let Some(existing) = self.find_catalog_by_name(name)? {
            return Ok(existing);
        }

        let catalog = Catalog::new(name, description);
        self.conn.execute(
            "INSERT INTO catalogs (uuid, name, description) VALUES (?1, ?2, ?3);",
            params![
                catalog.uuid.to_string(),
                catalog.name.as_str(),
                catalog.description.as_str(),
            ],
        )?;

        Ok(catalog)
    }

    fn find_catalog_by_name(&self, name: &str) -> RepoResult<Option<Catalog>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, name, description FROM catalogs WHERE name = ?1;",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((uuid_text, name, description)) => Ok(Some(Catalog {
                uuid: parse_uuid_column(&uuid_text, "catalogs.uuid")?,
                name,
                description,
            })),
            None => Ok(None),
        }
    }

    fn save_friendly_names(&self, mapping: &FriendlyNameMapping) -> RepoResult<()> {
        if self.friendly_names(mapping.catalog_uuid)?.is_some() {
            return Err(RepoError::AlreadyExists {
                what: "friendly name mapping",
                id: mapping.catalog_uuid,
            });
        }

        let encoded = serde_json::to_string(&mapping.mapping)?;
        self.conn.execute(
            "INSERT INTO friendly_names (uuid, catalog_uuid, mapping) VALUES (?1, ?2, ?3);",
            params![
                Uuid::new_v4().to_string(),
                mapping.catalog_uuid.to_string(),
                encoded,
            ],
        )?;

        Ok(())
    }

    fn friendly_names(&self, catalog: CatalogId) -> RepoResult<Option<FriendlyNameMapping>> {
        let encoded = self
            .conn
            .query_row(
                "SELECT mapping FROM friendly_names WHERE catalog_uuid = ?1;",
                [catalog.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match encoded {
            Some(encoded) => Ok(Some(FriendlyNameMapping {
                catalog_uuid: catalog,
                mapping: serde_json::from_str(&encoded)?,
            })),
            None => Ok(None),
        }
    }
}
