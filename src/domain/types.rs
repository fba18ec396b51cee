//! Shared domain types.
//!
//! Tables here are plain values: readers build them, the harmonizer consumes
//! them and returns a new table. Nothing is mutated after it is handed on.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The six health/welfare rates the model predicts.
pub const LABELS: [&str; 6] = [
    "neonatal_mortality_rate",
    "u5_mortality_rate",
    "maternal_mortality_rate",
    "modern_contraceptive_rate",
    "adolescent_fertility_rate",
    "safely_managed_water_use_rate",
];

/// First year that belongs to the test partition.
pub const DEFAULT_CUTOFF_YEAR: i32 = 2017;

/// Join key shared by every table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CountryYear {
    pub country: String,
    pub year: i32,
}

impl CountryYear {
    pub fn new(country: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            year,
        }
    }
}

impl fmt::Display for CountryYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.country, self.year)
    }
}

/// Which statistical source a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    OecdBudgets,
    ChildMortality,
    MaternalMortality,
    ContraceptiveUse,
    AdolescentFertility,
    DrinkingWater,
}

impl SourceKind {
    pub fn display_name(self) -> &'static str {
        match self {
            SourceKind::OecdBudgets => "OECD budgets",
            SourceKind::ChildMortality => "UNICEF child mortality",
            SourceKind::MaternalMortality => "maternal mortality",
            SourceKind::ContraceptiveUse => "contraceptive use",
            SourceKind::AdolescentFertility => "adolescent fertility",
            SourceKind::DrinkingWater => "safe drinking water",
        }
    }
}

/// One keyed row of a source table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub code: Option<String>,
    /// One entry per table column; `None` is missing, never zero.
    pub values: Vec<Option<f64>>,
}

/// Normalized output of a single source reader.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub source: SourceKind,
    pub columns: Vec<String>,
    pub rows: BTreeMap<CountryYear, SourceRow>,
}

impl SourceTable {
    pub fn new(source: SourceKind, columns: Vec<String>) -> Self {
        Self {
            source,
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Insert a row unless the key is already present.
    ///
    /// Returns `false` (and keeps the existing row) on a duplicate key.
    pub fn insert_first(&mut self, key: CountryYear, row: SourceRow) -> bool {
        debug_assert_eq!(row.values.len(), self.columns.len());
        if self.rows.contains_key(&key) {
            return false;
        }
        self.rows.insert(key, row);
        true
    }

    pub fn get(&self, key: &CountryYear) -> Option<&SourceRow> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why a source row could not be mapped into the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingKey { column: String },
    UnparseableValue { column: String, raw: String },
    DuplicateKey,
    IncompleteAfterFill,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingKey { column } => write!(f, "missing key `{column}`"),
            DropReason::UnparseableValue { column, raw } => {
                write!(f, "unparseable `{column}` value '{raw}'")
            }
            DropReason::DuplicateKey => write!(f, "duplicate country/year (kept first)"),
            DropReason::IncompleteAfterFill => write!(f, "indicators still missing after forward fill"),
        }
    }
}

/// A dropped row.
///
/// `row` is the 1-based line in the source file where one exists. Rows
/// dropped after pivoting carry the key instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDrop {
    pub row: usize,
    pub key: Option<CountryYear>,
    pub reason: DropReason,
}

/// Audit trail of a single reader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropReport {
    pub source: SourceKind,
    pub rows_read: usize,
    pub rows_used: usize,
    pub drops: Vec<RowDrop>,
}

impl DropReport {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            rows_read: 0,
            rows_used: 0,
            drops: Vec::new(),
        }
    }

    pub fn drop_row(&mut self, row: usize, reason: DropReason) {
        self.drops.push(RowDrop {
            row,
            key: None,
            reason,
        });
    }

    pub fn drop_key(&mut self, key: CountryYear, reason: DropReason) {
        self.drops.push(RowDrop {
            row: 0,
            key: Some(key),
            reason,
        });
    }

    /// Drop counts grouped by reason kind, for summaries.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for drop in &self.drops {
            let kind = match drop.reason {
                DropReason::MissingKey { .. } => "missing key",
                DropReason::UnparseableValue { .. } => "unparseable value",
                DropReason::DuplicateKey => "duplicate key",
                DropReason::IncompleteAfterFill => "incomplete after fill",
            };
            *out.entry(kind).or_insert(0) += 1;
        }
        out
    }
}

/// One row of the harmonized table.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedRow {
    pub country: String,
    pub code: Option<String>,
    pub year: i32,
    pub values: Vec<Option<f64>>,
}

/// Every source joined onto the OECD base, sorted by `(country, year)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<HarmonizedRow>,
}

impl HarmonizedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, country: &str, year: i32) -> Option<&HarmonizedRow> {
        self.rows
            .iter()
            .find(|r| r.year == year && r.country.eq_ignore_ascii_case(country))
    }

    /// Distinct countries, sorted.
    pub fn countries(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.rows.iter().map(|r| r.country.as_str()).collect();
        out.dedup();
        out
    }

    /// Number of `None` cells per column.
    pub fn missing_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.columns.len()];
        for row in &self.rows {
            for (idx, v) in row.values.iter().enumerate() {
                if v.is_none() {
                    counts[idx] += 1;
                }
            }
        }
        counts
    }
}

/// One inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub country: String,
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

impl FeatureRow {
    pub fn new(country: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            year,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

/// Predicted labels, in `LABELS` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub values: Vec<(String, f64)>,
}

impl LabelRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Resolved run configuration.
///
/// Derived from CLI flags, falling back to the environment and then defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory holding the `country_stats/` source tree.
    pub data_dir: PathBuf,
    /// Where the trained model blob is written and read.
    pub model_path: PathBuf,
    /// First test-partition year.
    pub cutoff_year: i32,
}
