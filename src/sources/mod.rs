//! Source readers.
//!
//! Each reader owns exactly one external file layout (path, sheet name, header
//! offsets) and turns it into a `SourceTable` keyed by `(country, year)`.
//!
//! Row handling follows one rule everywhere:
//! - `Ok(Some(..))` a row that maps into the canonical schema
//! - `Ok(None)` a row the source filters out (wrong uncertainty band, age group, ...)
//! - `Err(DropReason)` a row that could not be mapped, recorded in the `DropReport`

use std::path::Path;

use tracing::{debug, info};

use crate::domain::{CountryYear, DropReason, DropReport, SourceKind, SourceRow, SourceTable};
use crate::error::AppError;
use crate::io::sheet::{HeaderedSheet, SheetRecord};

pub mod contraceptive;
pub mod fertility;
pub mod maternal;
pub mod oecd;
pub mod unicef;
pub mod water;

/// A reader's output: the table plus its audit trail.
#[derive(Debug, Clone)]
pub struct SourceLoad {
    pub table: SourceTable,
    pub report: DropReport,
}

/// Every source, loaded. `budgets` is the join base.
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub budgets: SourceLoad,
    pub health: Vec<SourceLoad>,
}

impl LoadedSources {
    pub fn reports(&self) -> Vec<&DropReport> {
        std::iter::once(&self.budgets.report)
            .chain(self.health.iter().map(|s| &s.report))
            .collect()
    }
}

/// Load every source from `data_dir`.
///
/// Any missing file or schema mismatch aborts the whole load.
pub fn load_all(data_dir: &Path) -> Result<LoadedSources, AppError> {
    let budgets = oecd::read(data_dir)?;
    log_load(&budgets);

    let mut health = Vec::new();
    health.extend(unicef::read(data_dir)?);
    health.push(maternal::read(data_dir)?);
    health.push(contraceptive::read(data_dir)?);
    health.push(fertility::read(data_dir)?);
    health.push(water::read(data_dir)?);

    for load in &health {
        log_load(load);
    }

    Ok(LoadedSources { budgets, health })
}

fn log_load(load: &SourceLoad) {
    info!(
        source = load.report.source.display_name(),
        columns = ?load.table.columns,
        rows_read = load.report.rows_read,
        rows_used = load.report.rows_used,
        dropped = load.report.drops.len(),
        keys = load.table.len(),
        "source loaded"
    );
    for drop in &load.report.drops {
        debug!(
            source = load.report.source.display_name(),
            row = drop.row,
            key = ?drop.key,
            reason = %drop.reason,
            "row dropped"
        );
    }
}

/// Builds a single-indicator table, tracking drops and duplicates.
///
/// Most readers emit exactly one value column; this collects their per-row
/// outcomes the same way.
pub(crate) struct SingleColumnBuilder {
    table: SourceTable,
    report: DropReport,
}

/// One successfully parsed row.
pub(crate) struct Observation {
    pub key: CountryYear,
    pub code: Option<String>,
    pub value: Option<f64>,
}

impl SingleColumnBuilder {
    pub fn new(source: SourceKind, column: &str) -> Self {
        Self {
            table: SourceTable::new(source, vec![column.to_string()]),
            report: DropReport::new(source),
        }
    }

    pub fn push(&mut self, line: usize, outcome: Result<Option<Observation>, DropReason>) {
        self.report.rows_read += 1;
        match outcome {
            Ok(Some(obs)) => {
                let row = SourceRow {
                    code: obs.code,
                    values: vec![obs.value],
                };
                if self.table.insert_first(obs.key, row) {
                    self.report.rows_used += 1;
                } else {
                    self.report.drop_row(line, DropReason::DuplicateKey);
                }
            }
            Ok(None) => {}
            Err(reason) => self.report.drop_row(line, reason),
        }
    }

    pub fn finish(self) -> SourceLoad {
        SourceLoad {
            table: self.table,
            report: self.report,
        }
    }
}

/// Required, trimmed text cell.
pub(crate) fn required<'a>(
    sheet: &HeaderedSheet,
    record: &'a SheetRecord,
    column: &str,
) -> Result<&'a str, DropReason> {
    sheet.get(record, column).ok_or_else(|| DropReason::MissingKey {
        column: column.to_string(),
    })
}

pub(crate) fn optional<'a>(sheet: &HeaderedSheet, record: &'a SheetRecord, column: &str) -> Option<&'a str> {
    sheet.get(record, column)
}

/// Parse a year cell. Accepts `2015`, `2015.0` and mid-year forms like `1990.5`
/// (truncated to `1990`).
pub(crate) fn parse_year(raw: &str, column: &str) -> Result<i32, DropReason> {
    let raw = raw.trim();
    if let Ok(year) = raw.parse::<i32>() {
        return check_year(year, raw, column);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => check_year(v.floor() as i32, raw, column),
        _ => Err(unparseable(column, raw)),
    }
}

fn check_year(year: i32, raw: &str, column: &str) -> Result<i32, DropReason> {
    if (1800..=2200).contains(&year) {
        Ok(year)
    } else {
        Err(unparseable(column, raw))
    }
}

/// Parse a numeric cell strictly.
pub(crate) fn parse_value(raw: &str, column: &str) -> Result<f64, DropReason> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(unparseable(column, raw)),
    }
}

pub(crate) fn unparseable(column: &str, raw: &str) -> DropReason {
    DropReason::UnparseableValue {
        column: column.to_string(),
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_parsing_accepts_mid_year_labels() {
        assert_eq!(parse_year("2015", "Year"), Ok(2015));
        assert_eq!(parse_year("1990.5", "Year"), Ok(1990));
        assert_eq!(parse_year(" 2018.0 ", "Year"), Ok(2018));
    }

    #[test]
    fn year_parsing_rejects_garbage() {
        assert!(matches!(
            parse_year("n/a", "Year"),
            Err(DropReason::UnparseableValue { .. })
        ));
        assert!(parse_year("15", "Year").is_err());
    }

    #[test]
    fn builder_keeps_first_duplicate_and_counts_the_rest() {
        let mut builder = SingleColumnBuilder::new(SourceKind::ContraceptiveUse, "rate");
        let obs = |v: f64| -> Result<Option<Observation>, DropReason> {
            Ok(Some(Observation {
                key: CountryYear::new("Kenya", 2014),
                code: None,
                value: Some(v),
            }))
        };
        builder.push(2, obs(10.0));
        builder.push(3, obs(20.0));
        builder.push(4, Ok(None));
        let load = builder.finish();

        let row = load.table.get(&CountryYear::new("Kenya", 2014)).unwrap();
        assert_eq!(row.values, vec![Some(10.0)]);
        assert_eq!(load.report.rows_read, 3);
        assert_eq!(load.report.rows_used, 1);
        assert_eq!(load.report.drops.len(), 1);
        assert_eq!(load.report.drops[0].row, 3);
        assert_eq!(load.report.drops[0].reason, DropReason::DuplicateKey);
    }
}
