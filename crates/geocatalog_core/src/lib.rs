//! Core domain logic for GeoCatalog.
//! This crate is the single source of truth for the import/merge/query
//! pipeline invariants.

pub mod db;
pub mod geo;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod source;

pub use geo::{normalize, CoordTransform, Ellipsoid, NormalizeError, SpatialRef};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{Catalog, CatalogId, FriendlyNameMapping};
pub use model::geometry::{
    Coord, GeometryId, GeometryKind, GeometryRecord, MetadataMap, MetadataValue, MultiPolygon,
    Polygon, ShapeGeometry,
};
pub use model::record::{AttributeBag, AttributeRecord, FieldError, RecordId};
pub use repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use repo::unit_repo::{SqliteUnitRepository, UnitRepository, UnitRow};
pub use repo::{RepoError, RepoResult};
pub use service::import_service::{
    FieldMapping, ImportError, ImportFailure, ImportReport, ImportService,
};
pub use service::merge_service::{
    CompositeKey, JoinKeyConfig, JoinKeyField, MergeError, MergeFailure, MergeFailureKind,
    MergeReport, MergeService,
};
pub use service::query_service::{
    CensusFields, GroupValue, QueryError, QueryService, UnmergedUnit,
};
pub use source::{
    FieldValue, MemoryShapeSource, MemoryTabularSource, ShapeSource, SourceShape, TabularSource,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
