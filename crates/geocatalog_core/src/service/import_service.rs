//! Geometry store builder.
//!
//! # Responsibility
//! - Read shapes from a geometry source and populate the store.
//! - Partition shape fields into geometry-intrinsic metadata and unit
//!   attributes via an explicit mapping configuration.
//!
//! # Invariants
//! - One geometry record and one linked attribute record per source shape,
//!   created in source iteration order.
//! - A shape that fails normalization is reported and skipped; the batch
//!   continues.
//! - Not idempotent: importing the same source twice duplicates the store.
//!   The caller imports exactly once per catalog.

use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::geo::normalize::normalize;
use crate::geo::spatial_ref::SpatialRef;
use crate::geo::NormalizeError;
use crate::model::catalog::Catalog;
use crate::model::geometry::{GeometryRecord, MetadataMap};
use crate::model::record::{AttributeBag, AttributeRecord};
use crate::repo::unit_repo::UnitRepository;
use crate::repo::RepoError;
use crate::source::ShapeSource;

/// Field partition configuration for one geometry source layout.
///
/// Every source field should land in exactly one group; on overlap the
/// precedence is skip, then intrinsic, then attribute. Fields in no group are
/// ignored and surfaced as unmapped in the import report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Source field name to metadata key (geometry-intrinsic values).
    pub intrinsic: Vec<(String, String)>,
    /// Source field name to attribute bag key (unit attributes).
    pub attributes: Vec<(String, String)>,
    /// Source fields to drop without comment.
    pub skip: Vec<String>,
}

impl FieldMapping {
    /// Layout of the INE 2011 census section shapefile.
    pub fn spanish_census_2011() -> Self {
        let rename = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect()
        };

        Self {
            intrinsic: rename(&[
                ("OBJECTID", "obj_id"),
                ("Shape_len", "perimeter"),
                ("Shape_area", "area"),
            ]),
            attributes: rename(&[
                ("CUSEC", "cusec"),
                ("CUMUN", "cumun"),
                ("CSEC", "secc"),
                ("CDIS", "dist"),
                ("CMUN", "cmun"),
                ("CPRO", "cpro"),
                ("CCA", "ccaa"),
                ("CUDIS", "cudis"),
                ("OBS", "obs"),
                ("CNUT0", "cnut0"),
                ("CNUT1", "cnut1"),
                ("CNUT2", "cnut2"),
                ("CNUT3", "cnut3"),
                ("CLAU2", "clau2"),
                ("NPRO", "npro"),
                ("NCA", "nca"),
                ("NMUN", "nmun"),
            ]),
            skip: vec!["Shape_Leng".to_string()],
        }
    }

    /// Number of bag fields a geometry-only record carries.
    ///
    /// The anomaly detector uses this as the structural signal for records
    /// the merge never reached.
    pub fn unit_attribute_len(&self) -> usize {
        self.attributes.len()
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::spanish_census_2011()
    }
}

/// One shape the import could not normalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// Zero-based position of the shape in source order.
    pub shape_index: usize,
    pub error: NormalizeError,
}

/// Outcome of one geometry import batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Count of geometry/attribute record pairs created.
    pub imported: usize,
    /// Shapes skipped because normalization rejected them.
    pub failures: Vec<ImportFailure>,
    /// Source fields found in no mapping group.
    pub unmapped_fields: BTreeSet<String>,
}

/// Store-level import failure; per-shape problems live in the report instead.
#[derive(Debug)]
pub enum ImportError {
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Geometry store builder service.
pub struct ImportService<R: UnitRepository> {
    repo: R,
}

impl<R: UnitRepository> ImportService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Imports every shape of `source` into `catalog`.
    ///
    /// # Side effects
    /// - Creates one geometry record plus one attribute record per shape.
    /// - Emits `geometry_import` logging events and per-field `unmapped_field`
    ///   warnings.
    pub fn import(
        &self,
        source: &mut dyn ShapeSource,
        mapping: &FieldMapping,
        catalog: &Catalog,
    ) -> Result<ImportReport, ImportError> {
        let source_ref = source.spatial_ref().clone();
        let target_ref = SpatialRef::wgs84();
        info!(
            "event=geometry_import module=import status=start catalog={} source_srid={}",
            catalog.name,
            source_ref.srid()
        );

        let intrinsic: BTreeMap<&str, &str> = mapping
            .intrinsic
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        let attributes: BTreeMap<&str, &str> = mapping
            .attributes
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        let skip: BTreeSet<&str> = mapping.skip.iter().map(String::as_str).collect();

        let mut report = ImportReport::default();

        for (shape_index, shape) in source.read_shapes().enumerate() {
            let mut metadata = MetadataMap::new();
            let mut bag = AttributeBag::new();

            for (name, value) in &shape.fields {
                if skip.contains(name.as_str()) {
                    continue;
                }
                if let Some(key) = intrinsic.get(name.as_str()) {
                    metadata.insert((*key).to_string(), value.to_metadata());
                } else if let Some(key) = attributes.get(name.as_str()) {
                    bag.insert(*key, value.to_text());
                } else if report.unmapped_fields.insert(name.clone()) {
                    warn!(
                        "event=unmapped_field module=import catalog={} field={name}",
                        catalog.name
                    );
                }
            }

            let geom = match normalize(&shape.geometry, &source_ref, &target_ref) {
                Ok(geom) => geom,
                Err(error) => {
                    warn!(
                        "event=shape_rejected module=import catalog={} shape_index={shape_index} error={error}",
                        catalog.name
                    );
                    report.failures.push(ImportFailure { shape_index, error });
                    continue;
                }
            };

            let geometry = GeometryRecord::new(catalog.uuid, geom, metadata);
            self.repo.create_geometry(&geometry)?;

            let record = AttributeRecord::new(catalog.uuid, geometry.uuid, bag);
            self.repo.create_record(&record)?;

            report.imported += 1;
        }

        info!(
            "event=geometry_import module=import status=ok catalog={} imported={} failed={} unmapped={}",
            catalog.name,
            report.imported,
            report.failures.len(),
            report.unmapped_fields.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::FieldMapping;

    #[test]
    fn census_mapping_counts_unit_attributes() {
        let mapping = FieldMapping::spanish_census_2011();
        assert_eq!(mapping.unit_attribute_len(), 17);
        assert_eq!(mapping.intrinsic.len(), 3);
    }
}
