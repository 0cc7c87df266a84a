//! Attribute merge engine.
//!
//! # Responsibility
//! - Match tabular rows to stored attribute records by composite key.
//! - Merge row fields into the matched bag, in place, last writer wins.
//!
//! # Invariants
//! - One-directional: enriches geometry-derived records, never creates any.
//! - Exactly one stored record must match a row's key; zero or several is a
//!   per-row failure that never aborts the batch.
//! - Row values stay strings; no type conversion happens here.

use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::catalog::Catalog;
use crate::repo::unit_repo::UnitRepository;
use crate::repo::RepoError;
use crate::source::TabularSource;

/// One component of the composite lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeyField {
    /// Field name, identical on the row side and the bag side.
    pub field: String,
    /// Canonical left-zero-padded width.
    pub width: usize,
}

/// Composite-key configuration: which fields join the two datasets and how
/// wide their canonical representations are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeyConfig {
    pub fields: Vec<JoinKeyField>,
}

impl JoinKeyConfig {
    /// The INE census section key: area/province/municipality/district/section.
    pub fn spanish_census_2011() -> Self {
        let fields = [
            ("ccaa", 2),
            ("cpro", 2),
            ("cmun", 3),
            ("dist", 2),
            ("secc", 3),
        ];
        Self {
            fields: fields
                .iter()
                .map(|(field, width)| JoinKeyField {
                    field: field.to_string(),
                    width: *width,
                })
                .collect(),
        }
    }
}

impl Default for JoinKeyConfig {
    fn default() -> Self {
        Self::spanish_census_2011()
    }
}

/// A fully padded composite key, kept for operator diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    pub pairs: Vec<(String, String)>,
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, (field, value)) in self.pairs.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

/// Why one row could not be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeFailureKind {
    /// The row lacks one of the configured key fields entirely.
    MissingKeyField { field: String },
    /// The key matched zero or more than one stored record.
    AmbiguousOrMissingJoinKey { key: CompositeKey, matches: usize },
}

impl Display for MergeFailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKeyField { field } => {
                write!(f, "row has no `{field}` key field")
            }
            Self::AmbiguousOrMissingJoinKey { key, matches } => {
                write!(f, "key [{key}] matched {matches} records, expected 1")
            }
        }
    }
}

/// One row the merge could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFailure {
    /// Zero-based position of the row in source order.
    pub row_index: usize,
    pub kind: MergeFailureKind,
}

/// Outcome of one merge batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Count of records whose bag was enriched.
    pub merged: usize,
    /// Rows that could not be matched or applied.
    pub failures: Vec<MergeFailure>,
}

/// Store-level merge failure; per-row problems live in the report instead.
#[derive(Debug)]
pub enum MergeError {
    Repo(RepoError),
}

impl Display for MergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MergeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for MergeError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Attribute merge engine service.
pub struct MergeService<R: UnitRepository> {
    repo: R,
    keys: JoinKeyConfig,
}

impl<R: UnitRepository> MergeService<R> {
    /// Creates a merge engine with the default census join key.
    pub fn new(repo: R) -> Self {
        Self::with_join_keys(repo, JoinKeyConfig::default())
    }

    pub fn with_join_keys(repo: R, keys: JoinKeyConfig) -> Self {
        Self { repo, keys }
    }

    /// Merges every row of a tabular source into `catalog`.
    pub fn merge_source(
        &self,
        source: &mut dyn TabularSource,
        catalog: &Catalog,
    ) -> Result<MergeReport, MergeError> {
        let header = source.header().to_vec();
        self.merge(&header, source.rows(), catalog)
    }

    /// Merges raw rows, with `header` naming fields positionally.
    ///
    /// # Side effects
    /// - Updates matched attribute bags in place.
    /// - Emits `census_merge` logging events and per-row warnings for rows
    ///   recorded as failures.
    pub fn merge(
        &self,
        header: &[String],
        rows: impl Iterator<Item = Vec<String>>,
        catalog: &Catalog,
    ) -> Result<MergeReport, MergeError> {
        info!(
            "event=census_merge module=merge status=start catalog={}",
            catalog.name
        );

        let mut report = MergeReport::default();

        for (row_index, row) in rows.enumerate() {
            let parsed: BTreeMap<String, String> = header
                .iter()
                .zip(row)
                .map(|(field, value)| (field.clone(), value))
                .collect();

            let key = match self.composite_key(&parsed) {
                Ok(key) => key,
                Err(kind) => {
                    warn!(
                        "event=row_rejected module=merge catalog={} row_index={row_index} error={kind}",
                        catalog.name
                    );
                    report.failures.push(MergeFailure { row_index, kind });
                    continue;
                }
            };

            let mut matches = self
                .repo
                .find_records_by_fields(catalog.uuid, &key.pairs)?;
            let match_count = matches.len();
            let unique = if match_count == 1 { matches.pop() } else { None };
            let Some(mut record) = unique else {
                let kind = MergeFailureKind::AmbiguousOrMissingJoinKey {
                    key,
                    matches: match_count,
                };
                warn!(
                    "event=row_rejected module=merge catalog={} row_index={row_index} error={kind}",
                    catalog.name
                );
                report.failures.push(MergeFailure { row_index, kind });
                continue;
            };

            record.data.merge_from(&parsed);
            self.repo.update_record_data(record.uuid, &record.data)?;
            report.merged += 1;
        }

        info!(
            "event=census_merge module=merge status=ok catalog={} merged={} failed={}",
            catalog.name,
            report.merged,
            report.failures.len()
        );

        Ok(report)
    }

    /// Builds the padded composite key for one parsed row.
    fn composite_key(
        &self,
        parsed: &BTreeMap<String, String>,
    ) -> Result<CompositeKey, MergeFailureKind> {
        let mut pairs = Vec::with_capacity(self.keys.fields.len());
        for key_field in &self.keys.fields {
            let raw = parsed
                .get(&key_field.field)
                .ok_or_else(|| MergeFailureKind::MissingKeyField {
                    field: key_field.field.clone(),
                })?;
            pairs.push((key_field.field.clone(), pad_left(raw, key_field.width)));
        }
        Ok(CompositeKey { pairs })
    }
}

/// Left-zero-pads `value` to `width`; longer values pass through unchanged.
fn pad_left(value: &str, width: usize) -> String {
    format!("{value:0>width$}")
}
