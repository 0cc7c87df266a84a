//! Aggregation engine: read-only analytical queries over a merged catalog.
//!
//! # Responsibility
//! - Population density per municipality within a province.
//! - Top-N provinces ranked by third-level-studies share.
//! - Detection of geometry-only records the merge never reached.
//!
//! # Invariants
//! - Queries never mutate the store.
//! - Malformed numeric fields read as 0 with a warning, never an error.
//! - Group ordering is plain code-point order, deliberately not locale-aware
//!   collation, so accented names sort after unaccented ones.

use log::warn;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::catalog::Catalog;
use crate::model::geometry::{GeometryId, MetadataMap};
use crate::model::record::{AttributeBag, FieldError, RecordId};
use crate::repo::unit_repo::{UnitRepository, UnitRow};
use crate::repo::RepoError;

const SQUARE_METERS_PER_SQUARE_KM: f64 = 1_000_000.0;

/// Census field names the aggregations read.
///
/// Externalized so the engine carries no hidden schema knowledge; defaults
/// match the 2011 INE layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusFields {
    /// Province display name (shapefile side).
    pub province_name: String,
    /// Municipality display name (shapefile side).
    pub municipality_name: String,
    /// Total resident population (tabular side).
    pub population: String,
    /// Residents with completed third-level studies (tabular side).
    pub third_level_studies: String,
    /// Geometry metadata key holding the precomputed area in square meters.
    pub area_metadata: String,
}

impl Default for CensusFields {
    fn default() -> Self {
        Self {
            province_name: "npro".to_string(),
            municipality_name: "nmun".to_string(),
            population: "t1_1".to_string(),
            third_level_studies: "t12_5".to_string(),
            area_metadata: "area".to_string(),
        }
    }
}

/// One `(group name, value)` result row, already ordered by the query.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupValue {
    pub group: String,
    pub value: f64,
}

/// Descriptor of a record the merge never reached.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmergedUnit {
    pub record_uuid: RecordId,
    pub geometry_uuid: GeometryId,
    /// Full bag; geometry-only bags are small by definition.
    pub fields: AttributeBag,
    pub geometry_metadata: MetadataMap,
}

/// Errors from aggregation queries.
#[derive(Debug)]
pub enum QueryError {
    /// The province filter matched nothing.
    RegionNotFound(String),
    Repo(RepoError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegionNotFound(name) => write!(f, "region not found: {name}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RegionNotFound(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for QueryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Aggregation engine service.
pub struct QueryService<R: UnitRepository> {
    repo: R,
    fields: CensusFields,
}

impl<R: UnitRepository> QueryService<R> {
    /// Creates an engine reading the default census field layout.
    pub fn new(repo: R) -> Self {
        Self::with_fields(repo, CensusFields::default())
    }

    pub fn with_fields(repo: R, fields: CensusFields) -> Self {
        Self { repo, fields }
    }

    /// Population density (people per km²) per municipality of one province.
    ///
    /// Results are sorted by municipality name in code-point order and
    /// rounded to 3 decimals. An unknown province is a typed not-found
    /// failure, not an empty result.
    pub fn municipality_density(
        &self,
        catalog: &Catalog,
        province: &str,
    ) -> Result<Vec<GroupValue>, QueryError> {
        let units = self.repo.list_units(catalog.uuid)?;

        // BTreeMap keys give the code-point output order for free.
        let mut groups: BTreeMap<String, (i64, f64)> = BTreeMap::new();
        let mut matched = false;

        for unit in &units {
            if unit.record.data.get(&self.fields.province_name) != Some(province) {
                continue;
            }
            matched = true;

            let Some(municipality) = unit.record.data.get(&self.fields.municipality_name) else {
                warn!(
                    "event=unit_skipped module=query query=density record={} reason=no_municipality_name",
                    unit.record.uuid
                );
                continue;
            };

            let population = self.integer_or_zero(&unit.record.data, &self.fields.population);
            let area_m2 = self.area_of(unit);

            let entry = groups.entry(municipality.to_string()).or_insert((0, 0.0));
            entry.0 += population;
            entry.1 += area_m2;
        }

        if !matched {
            return Err(QueryError::RegionNotFound(province.to_string()));
        }

        Ok(groups
            .into_iter()
            .map(|(group, (population, area_m2))| {
                let area_km2 = area_m2 / SQUARE_METERS_PER_SQUARE_KM;
                let density = if area_km2 > 0.0 {
                    population as f64 / area_km2
                } else {
                    warn!(
                        "event=zero_area_group module=query query=density group={group}"
                    );
                    0.0
                };
                GroupValue {
                    group,
                    value: round_half_away(density, 3),
                }
            })
            .collect())
    }

    /// Top `count` provinces by share of population with third-level studies.
    ///
    /// Share is percent, rounded to 2 decimals, sorted descending; ties keep
    /// first-seen province order. `count <= 0` yields an empty list and a
    /// `count` beyond the available provinces yields all of them.
    pub fn top_provinces_by_university_share(
        &self,
        catalog: &Catalog,
        count: i64,
    ) -> Result<Vec<GroupValue>, QueryError> {
        let units = self.repo.list_units(catalog.uuid)?;

        // Insertion-ordered groups so the stable sort can break ties by
        // first appearance.
        let mut order: Vec<String> = Vec::new();
        let mut sums: BTreeMap<String, (i64, i64)> = BTreeMap::new();

        for unit in &units {
            let Some(province) = unit.record.data.get(&self.fields.province_name) else {
                warn!(
                    "event=unit_skipped module=query query=university record={} reason=no_province_name",
                    unit.record.uuid
                );
                continue;
            };

            // A record without the population field at all never saw the
            // tabular merge and is excluded entirely. An absent studies field
            // still counts as zero. The two rules differ on purpose here;
            // unify in this block if the census layout ever changes.
            let population = match unit.record.data.get(&self.fields.population) {
                None => continue,
                Some(_) => self.integer_or_zero(&unit.record.data, &self.fields.population),
            };
            let studies =
                self.integer_or_zero(&unit.record.data, &self.fields.third_level_studies);

            if !sums.contains_key(province) {
                order.push(province.to_string());
            }
            let entry = sums.entry(province.to_string()).or_insert((0, 0));
            entry.0 += population;
            entry.1 += studies;
        }

        let mut ranked: Vec<GroupValue> = order
            .into_iter()
            .map(|province| {
                let (population, studies) = sums[&province];
                let share = if population > 0 {
                    studies as f64 / population as f64 * 100.0
                } else {
                    warn!(
                        "event=zero_population_group module=query query=university group={province}"
                    );
                    0.0
                };
                GroupValue {
                    group: province,
                    value: round_half_away(share, 2),
                }
            })
            .collect();

        // Stable sort: equal shares keep first-seen order.
        ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));

        let take = usize::try_from(count).unwrap_or(0);
        ranked.truncate(take);
        Ok(ranked)
    }

    /// Records whose bag still has exactly the geometry-only field count.
    ///
    /// `geometry_only_field_count` comes from the import configuration
    /// (`FieldMapping::unit_attribute_len`). Structural check only; field
    /// contents are not inspected.
    pub fn unmerged_units(
        &self,
        catalog: &Catalog,
        geometry_only_field_count: usize,
    ) -> Result<Vec<UnmergedUnit>, QueryError> {
        let units = self.repo.list_units(catalog.uuid)?;

        Ok(units
            .into_iter()
            .filter(|unit| unit.record.data.len() == geometry_only_field_count)
            .map(|unit| UnmergedUnit {
                record_uuid: unit.record.uuid,
                geometry_uuid: unit.record.geometry_uuid,
                fields: unit.record.data,
                geometry_metadata: unit.geometry_metadata,
            })
            .collect())
    }

    /// Integer field read with the aggregation policy: absent or empty is 0,
    /// malformed is 0 with a warning.
    fn integer_or_zero(&self, bag: &AttributeBag, field: &str) -> i64 {
        match bag.integer(field) {
            Ok(value) => value,
            Err(FieldError::Missing { .. }) => 0,
            Err(error @ FieldError::Malformed { .. }) => {
                warn!("event=malformed_numeric_field module=query error={error}");
                0
            }
        }
    }

    /// Area in square meters from the geometry's intrinsic metadata.
    fn area_of(&self, unit: &UnitRow) -> f64 {
        match unit
            .geometry_metadata
            .get(&self.fields.area_metadata)
            .and_then(|value| value.as_f64())
        {
            Some(area) => area,
            None => {
                warn!(
                    "event=missing_area_metadata module=query geometry={}",
                    unit.record.geometry_uuid
                );
                0.0
            }
        }
    }
}

/// Rounds to `places` decimals, halves away from zero (`f64::round`).
fn round_half_away(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::round_half_away;

    #[test]
    fn rounding_is_half_away_from_zero() {
        // 0.0625 and 0.125 are exact in binary, so the halves are real halves.
        assert_eq!(round_half_away(0.0625, 3), 0.063);
        assert_eq!(round_half_away(-0.0625, 3), -0.063);
        assert_eq!(round_half_away(0.125, 2), 0.13);
        assert_eq!(round_half_away(100.0 / 3.0, 3), 33.333);
        assert_eq!(round_half_away(100.0, 3), 100.0);
    }
}
