use std::collections::BTreeMap;

use geocatalog_core::db::open_db_in_memory;
use geocatalog_core::{
    Catalog, CatalogRepository, Coord, FieldMapping, FieldValue, GeometryKind, ImportService,
    MemoryShapeSource, MetadataValue, NormalizeError, Polygon, ShapeGeometry, SourceShape,
    SpatialRef, SqliteCatalogRepository, SqliteUnitRepository, UnitRepository,
};
use rusqlite::Connection;

#[test]
fn import_creates_one_geometry_and_one_record_per_shape() {
    let conn = open_db_in_memory().unwrap();
    let catalog = test_catalog(&conn);
    let service = ImportService::new(SqliteUnitRepository::try_new(&conn).unwrap());

    let mut source = MemoryShapeSource::new(
        SpatialRef::from_epsg(4258).unwrap(),
        vec![
            census_shape(1, "01", "Araba/Álava", "Vitoria-Gasteiz", 1_000_000.0),
            census_shape(2, "08", "Barcelona", "Barcelona", 2_500_000.0),
        ],
    );

    let report = service
        .import(&mut source, &test_mapping(), &catalog)
        .unwrap();

    assert_eq!(report.imported, 2);
    assert!(report.failures.is_empty());
    assert!(report.unmapped_fields.is_empty());

    let repo = SqliteUnitRepository::try_new(&conn).unwrap();
    let units = repo.list_units(catalog.uuid).unwrap();
    assert_eq!(units.len(), 2);

    // Unit attributes are renamed into canonical bag keys.
    let first = &units[0].record;
    assert_eq!(first.data.get("cpro"), Some("01"));
    assert_eq!(first.data.get("npro"), Some("Araba/Álava"));
    assert_eq!(first.data.get("nmun"), Some("Vitoria-Gasteiz"));
    assert!(first.data.get("OBJECTID").is_none());

    // Intrinsic values land in geometry metadata, renamed too.
    assert_eq!(
        units[0].geometry_metadata.get("obj_id"),
        Some(&MetadataValue::Integer(1))
    );
    assert_eq!(
        units[0].geometry_metadata.get("area"),
        Some(&MetadataValue::Real(1_000_000.0))
    );

    // The stored geometry is canonical: multi-part, EPSG:4326.
    let geometry = repo.get_geometry(first.geometry_uuid).unwrap().unwrap();
    assert_eq!(geometry.geom.srid, 4326);
    assert_eq!(geometry.geom.part_count(), 1);
}

#[test]
fn unmapped_fields_are_flagged_and_left_out() {
    let conn = open_db_in_memory().unwrap();
    let catalog = test_catalog(&conn);
    let service = ImportService::new(SqliteUnitRepository::try_new(&conn).unwrap());

    let mut shape = census_shape(1, "01", "Araba/Álava", "Vitoria-Gasteiz", 100.0);
    shape
        .fields
        .insert("EXTRA".to_string(), FieldValue::Text("noise".to_string()));
    let mut source = MemoryShapeSource::new(SpatialRef::from_epsg(4258).unwrap(), vec![shape]);

    let report = service
        .import(&mut source, &test_mapping(), &catalog)
        .unwrap();

    assert_eq!(report.imported, 1);
    assert!(report.unmapped_fields.contains("EXTRA"));

    let repo = SqliteUnitRepository::try_new(&conn).unwrap();
    let units = repo.list_units(catalog.uuid).unwrap();
    assert!(units[0].record.data.get("EXTRA").is_none());
    assert!(units[0].geometry_metadata.get("EXTRA").is_none());
}

#[test]
fn skip_fields_are_dropped_without_flagging() {
    let conn = open_db_in_memory().unwrap();
    let catalog = test_catalog(&conn);
    let service = ImportService::new(SqliteUnitRepository::try_new(&conn).unwrap());

    let mut shape = census_shape(1, "01", "Araba/Álava", "Vitoria-Gasteiz", 100.0);
    shape
        .fields
        .insert("Shape_Leng".to_string(), FieldValue::Real(123.4));
    let mut source = MemoryShapeSource::new(SpatialRef::from_epsg(4258).unwrap(), vec![shape]);

    let report = service
        .import(&mut source, &test_mapping(), &catalog)
        .unwrap();

    assert!(report.unmapped_fields.is_empty());

    let repo = SqliteUnitRepository::try_new(&conn).unwrap();
    let units = repo.list_units(catalog.uuid).unwrap();
    assert!(units[0].record.data.get("Shape_Leng").is_none());
    assert!(units[0].geometry_metadata.get("Shape_Leng").is_none());
}

#[test]
fn unsupported_shapes_are_reported_and_the_batch_continues() {
    let conn = open_db_in_memory().unwrap();
    let catalog = test_catalog(&conn);
    let service = ImportService::new(SqliteUnitRepository::try_new(&conn).unwrap());

    let mut point = census_shape(1, "01", "Araba/Álava", "Vitoria-Gasteiz", 100.0);
    point.geometry = ShapeGeometry::Point(Coord::new(-2.67, 42.85));
    let polygon = census_shape(2, "08", "Barcelona", "Barcelona", 200.0);

    let mut source =
        MemoryShapeSource::new(SpatialRef::from_epsg(4258).unwrap(), vec![point, polygon]);

    let report = service
        .import(&mut source, &test_mapping(), &catalog)
        .unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].shape_index, 0);
    assert_eq!(
        report.failures[0].error,
        NormalizeError::UnsupportedGeometryKind(GeometryKind::Point)
    );

    let repo = SqliteUnitRepository::try_new(&conn).unwrap();
    assert_eq!(repo.list_units(catalog.uuid).unwrap().len(), 1);
}

#[test]
fn importing_the_same_source_twice_duplicates_the_store() {
    let conn = open_db_in_memory().unwrap();
    let catalog = test_catalog(&conn);
    let service = ImportService::new(SqliteUnitRepository::try_new(&conn).unwrap());

    let source = MemoryShapeSource::new(
        SpatialRef::from_epsg(4258).unwrap(),
        vec![census_shape(1, "01", "Araba/Álava", "Vitoria-Gasteiz", 100.0)],
    );

    service
        .import(&mut source.clone(), &test_mapping(), &catalog)
        .unwrap();
    service
        .import(&mut source.clone(), &test_mapping(), &catalog)
        .unwrap();

    // Import is deliberately not idempotent; the caller runs it once.
    let repo = SqliteUnitRepository::try_new(&conn).unwrap();
    assert_eq!(repo.list_units(catalog.uuid).unwrap().len(), 2);
}

#[test]
fn projected_sources_are_stored_in_geographic_coordinates() {
    let conn = open_db_in_memory().unwrap();
    let catalog = test_catalog(&conn);
    let service = ImportService::new(SqliteUnitRepository::try_new(&conn).unwrap());

    let mut shape = census_shape(1, "28", "Madrid", "Madrid", 100.0);
    shape.geometry = ShapeGeometry::Polygon(Polygon::from_exterior(vec![
        Coord::new(440_000.0, 4_470_000.0),
        Coord::new(441_000.0, 4_470_000.0),
        Coord::new(441_000.0, 4_471_000.0),
        Coord::new(440_000.0, 4_470_000.0),
    ]));
    let mut source = MemoryShapeSource::new(SpatialRef::from_epsg(25830).unwrap(), vec![shape]);

    service
        .import(&mut source, &test_mapping(), &catalog)
        .unwrap();

    let repo = SqliteUnitRepository::try_new(&conn).unwrap();
    let units = repo.list_units(catalog.uuid).unwrap();
    let geometry = repo
        .get_geometry(units[0].record.geometry_uuid)
        .unwrap()
        .unwrap();

    assert_eq!(geometry.geom.srid, 4326);
    for coord in &geometry.geom.polygons[0].rings[0] {
        assert!(coord.x > -4.5 && coord.x < -3.0, "lon {}", coord.x);
        assert!(coord.y > 40.0 && coord.y < 41.0, "lat {}", coord.y);
    }
}

fn test_catalog(conn: &Connection) -> Catalog {
    SqliteCatalogRepository::try_new(conn)
        .unwrap()
        .find_or_create_catalog("Census-ES-2011", "Data for the 2011 Spanish Census.")
        .unwrap()
}

/// Compact layout used by these tests: the census mapping shape with fewer
/// attribute columns.
fn test_mapping() -> FieldMapping {
    let rename = |pairs: &[(&str, &str)]| {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    };
    FieldMapping {
        intrinsic: rename(&[("OBJECTID", "obj_id"), ("Shape_area", "area")]),
        attributes: rename(&[
            ("CCA", "ccaa"),
            ("CPRO", "cpro"),
            ("CMUN", "cmun"),
            ("CDIS", "dist"),
            ("CSEC", "secc"),
            ("NPRO", "npro"),
            ("NMUN", "nmun"),
        ]),
        skip: vec!["Shape_Leng".to_string()],
    }
}

fn census_shape(
    obj_id: i64,
    province_code: &str,
    province: &str,
    municipality: &str,
    area_m2: f64,
) -> SourceShape {
    let mut fields = BTreeMap::new();
    fields.insert("OBJECTID".to_string(), FieldValue::Integer(obj_id));
    fields.insert("Shape_area".to_string(), FieldValue::Real(area_m2));
    fields.insert("CCA".to_string(), FieldValue::Text("01".to_string()));
    fields.insert(
        "CPRO".to_string(),
        FieldValue::Text(province_code.to_string()),
    );
    fields.insert("CMUN".to_string(), FieldValue::Text("001".to_string()));
    fields.insert("CDIS".to_string(), FieldValue::Text("01".to_string()));
    fields.insert(
        "CSEC".to_string(),
        FieldValue::Text(format!("{obj_id:03}")),
    );
    fields.insert("NPRO".to_string(), FieldValue::Text(province.to_string()));
    fields.insert(
        "NMUN".to_string(),
        FieldValue::Text(municipality.to_string()),
    );

    SourceShape::new(
        ShapeGeometry::Polygon(Polygon::from_exterior(vec![
            Coord::new(-2.7, 42.8),
            Coord::new(-2.6, 42.8),
            Coord::new(-2.6, 42.9),
            Coord::new(-2.7, 42.8),
        ])),
        fields,
    )
}
