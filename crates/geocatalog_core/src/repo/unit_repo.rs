//! Unit repository: geometry records and their attribute records.
//!
//! # Responsibility
//! - Persist geometry/attribute record pairs produced by the store builder.
//! - Answer exact-match bag-field lookups for the merge engine.
//! - Stream joined unit rows to the aggregation engine.
//!
//! # Invariants
//! - Geometry rows are insert-only; attribute bags are the only mutable state.
//! - `list_units` returns rows in insertion order, which downstream stable
//!   sorts rely on for tie-breaking.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::model::catalog::CatalogId;
use crate::model::geometry::{GeometryId, GeometryRecord, MetadataMap};
use crate::model::record::{AttributeBag, AttributeRecord, RecordId};
use crate::repo::{ensure_schema_ready, parse_uuid_column, RepoError, RepoResult};

const RECORD_SELECT_SQL: &str = "SELECT
    uuid,
    catalog_uuid,
    geometry_uuid,
    data
FROM records";

/// One attribute record joined with its geometry's intrinsic metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRow {
    pub record: AttributeRecord,
    pub geometry_metadata: MetadataMap,
}

/// Repository interface for geometry/attribute unit storage.
pub trait UnitRepository {
    fn create_geometry(&self, geometry: &GeometryRecord) -> RepoResult<GeometryId>;
    fn get_geometry(&self, id: GeometryId) -> RepoResult<Option<GeometryRecord>>;
    fn create_record(&self, record: &AttributeRecord) -> RepoResult<RecordId>;

    /// Replaces the attribute bag of an existing record in place.
    fn update_record_data(&self, id: RecordId, data: &AttributeBag) -> RepoResult<()>;

    /// Exact-match lookup on bag fields, scoped to one catalog.
    ///
    /// `fields` pairs are (bag field name, wanted value); all must match.
    fn find_records_by_fields(
        &self,
        catalog: CatalogId,
        fields: &[(String, String)],
    ) -> RepoResult<Vec<AttributeRecord>>;

    /// All unit rows of a catalog, joined with geometry metadata, in
    /// insertion order.
    fn list_units(&self, catalog: CatalogId) -> RepoResult<Vec<UnitRow>>;
}

/// SQLite-backed unit repository.
pub struct SqliteUnitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitRepository<'conn> {
    /// Wraps a migrated connection, rejecting unbootstrapped ones.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["catalogs", "geometries", "records"])?;
        Ok(Self { conn })
    }
}

impl UnitRepository for SqliteUnitRepository<'_> {
    fn create_geometry(&self, geometry: &GeometryRecord) -> RepoResult<GeometryId> {
        self.conn.execute(
            "INSERT INTO geometries (uuid, catalog_uuid, geom, metadata)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                geometry.uuid.to_string(),
                geometry.catalog_uuid.to_string(),
                serde_json::to_string(&geometry.geom)?,
                serde_json::to_string(&geometry.metadata)?,
            ],
        )?;

        Ok(geometry.uuid)
    }

    fn get_geometry(&self, id: GeometryId) -> RepoResult<Option<GeometryRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, catalog_uuid, geom, metadata FROM geometries WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((uuid_text, catalog_text, geom, metadata)) => Ok(Some(GeometryRecord {
                uuid: parse_uuid_column(&uuid_text, "geometries.uuid")?,
                catalog_uuid: parse_uuid_column(&catalog_text, "geometries.catalog_uuid")?,
                geom: serde_json::from_str(&geom)?,
                metadata: serde_json::from_str(&metadata)?,
            })),
            None => Ok(None),
        }
    }

    fn create_record(&self, record: &AttributeRecord) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO records (uuid, catalog_uuid, geometry_uuid, data)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                record.uuid.to_string(),
                record.catalog_uuid.to_string(),
                record.geometry_uuid.to_string(),
                serde_json::to_string(&record.data)?,
            ],
        )?;

        Ok(record.uuid)
    }

    fn update_record_data(&self, id: RecordId, data: &AttributeBag) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                data = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![serde_json::to_string(data)?, id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn find_records_by_fields(
        &self,
        catalog: CatalogId,
        fields: &[(String, String)],
    ) -> RepoResult<Vec<AttributeRecord>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE catalog_uuid = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(catalog.to_string())];

        for (field, wanted) in fields {
            sql.push_str(" AND json_extract(data, ?) = ?");
            bind_values.push(Value::Text(format!("$.{field}")));
            bind_values.push(Value::Text(wanted.clone()));
        }

        sql.push_str(" ORDER BY rowid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn list_units(&self, catalog: CatalogId) -> RepoResult<Vec<UnitRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                records.uuid,
                records.catalog_uuid,
                records.geometry_uuid,
                records.data,
                geometries.metadata
             FROM records
             JOIN geometries ON geometries.uuid = records.geometry_uuid
             WHERE records.catalog_uuid = ?1
             ORDER BY records.rowid ASC;",
        )?;

        let mut rows = stmt.query([catalog.to_string()])?;
        let mut units = Vec::new();

        while let Some(row) = rows.next()? {
            let record = parse_record_row(row)?;
            let metadata_text: String = row.get(4)?;
            units.push(UnitRow {
                record,
                geometry_metadata: serde_json::from_str(&metadata_text)?,
            });
        }

        Ok(units)
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<AttributeRecord> {
    let uuid_text: String = row.get(0)?;
    let catalog_text: String = row.get(1)?;
    let geometry_text: String = row.get(2)?;
    let data_text: String = row.get(3)?;

    Ok(AttributeRecord {
        uuid: parse_uuid_column(&uuid_text, "records.uuid")?,
        catalog_uuid: parse_uuid_column(&catalog_text, "records.catalog_uuid")?,
        geometry_uuid: parse_uuid_column(&geometry_text, "records.geometry_uuid")?,
        data: serde_json::from_str(&data_text)?,
    })
}
