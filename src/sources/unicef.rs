//! UNICEF / UN IGME child mortality estimates.
//!
//! One workbook, one sheet per indicator. Each country appears three times
//! (`Lower`, `Median`, `Upper` uncertainty bounds) with one column per
//! mid-year (`1990.5`, `1991.5`, ...). We keep the `Median` row only, which
//! collapses the uncertainty interval to a point estimate, and melt the year
//! columns into long format.

use std::path::Path;

use crate::domain::{CountryYear, DropReason, DropReport, SourceKind, SourceRow, SourceTable};
use crate::error::AppError;
use crate::io::sheet::{HeaderLayout, RawSheet, cell_at};
use crate::sources::{SourceLoad, optional, parse_value, parse_year, required};

pub const PATH: &str = "country_stats/unicef/child_mortality.xlsx";

/// `(sheet, output column)` pairs read from the workbook.
pub const SHEETS: [(&str, &str); 2] = [
    ("NMR", "neonatal_mortality_rate"),
    ("U5MR", "u5_mortality_rate"),
];

const HEADER_ROW: usize = 11;

const COL_CODE: &str = "ISO Code";
const COL_COUNTRY: &str = "Country Name";
const COL_BOUNDS: &str = "Uncertainty bounds*";
const MEDIAN: &str = "Median";

pub fn read(data_dir: &Path) -> Result<Vec<SourceLoad>, AppError> {
    let path = data_dir.join(PATH);
    SHEETS
        .iter()
        .map(|(sheet, column)| {
            let raw = RawSheet::from_workbook(&path, sheet)?;
            parse(&raw, column)
        })
        .collect()
}

pub fn parse(raw: &RawSheet, column: &str) -> Result<SourceLoad, AppError> {
    let sheet = raw.with_header(HeaderLayout::Single(HEADER_ROW))?;
    sheet.require_columns(&[COL_CODE, COL_COUNTRY, COL_BOUNDS])?;

    let year_columns: Vec<(usize, i32)> = sheet
        .headers
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| parse_year(name, name).ok().map(|year| (idx, year)))
        .collect();
    if year_columns.is_empty() {
        return Err(AppError::input(format!(
            "'{}' has no year columns after `{COL_BOUNDS}`",
            sheet.origin
        )));
    }

    let mut table = SourceTable::new(SourceKind::ChildMortality, vec![column.to_string()]);
    let mut report = DropReport::new(SourceKind::ChildMortality);

    for record in &sheet.records {
        report.rows_read += 1;

        let bounds = sheet.get(record, COL_BOUNDS).unwrap_or("");
        if !bounds.eq_ignore_ascii_case(MEDIAN) {
            continue;
        }

        let country = match required(&sheet, record, COL_COUNTRY) {
            Ok(country) => country,
            Err(reason) => {
                report.drop_row(record.line, reason);
                continue;
            }
        };
        let code = optional(&sheet, record, COL_CODE).map(str::to_string);
        report.rows_used += 1;

        for &(idx, year) in &year_columns {
            // Blank cells are years without an estimate, not errors.
            let Some(raw_value) = cell_at(record, idx) else {
                continue;
            };
            let value = match parse_value(raw_value, &sheet.headers[idx]) {
                Ok(v) => v,
                Err(reason) => {
                    report.drop_row(record.line, reason);
                    continue;
                }
            };
            let row = SourceRow {
                code: code.clone(),
                values: vec![Some(value)],
            };
            if !table.insert_first(CountryYear::new(country, year), row) {
                report.drop_row(record.line, DropReason::DuplicateKey);
            }
        }
    }

    Ok(SourceLoad { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook_rows(data: &[&[&str]]) -> RawSheet {
        // Eleven rows of preamble, as in the published workbook.
        let mut rows: Vec<Vec<String>> = (0..HEADER_ROW)
            .map(|i| vec![format!("note {i}")])
            .collect();
        rows.push(
            ["ISO Code", "Country Name", "Uncertainty bounds*", "2015.5", "2016.5"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        rows.extend(data.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        RawSheet::new("unicef-test", rows)
    }

    #[test]
    fn only_median_rows_are_melted() {
        let raw = workbook_rows(&[
            &["AFG", "Afghanistan", "Lower", "60", "58"],
            &["AFG", "Afghanistan", "Median", "70", "68"],
            &["AFG", "Afghanistan", "Upper", "80", "78"],
        ]);
        let load = parse(&raw, "u5_mortality_rate").unwrap();

        assert_eq!(load.table.len(), 2);
        let row = load.table.get(&CountryYear::new("Afghanistan", 2015)).unwrap();
        assert_eq!(row.values, vec![Some(70.0)]);
        assert_eq!(row.code.as_deref(), Some("AFG"));
        assert_eq!(
            load.table.get(&CountryYear::new("Afghanistan", 2016)).unwrap().values,
            vec![Some(68.0)]
        );
        assert_eq!(load.report.rows_read, 3);
        assert_eq!(load.report.rows_used, 1);
        assert!(load.report.drops.is_empty());
    }

    #[test]
    fn blank_years_are_skipped_and_garbage_is_reported() {
        let raw = workbook_rows(&[&["BEN", "Benin", "Median", "", "x"]]);
        let load = parse(&raw, "neonatal_mortality_rate").unwrap();

        assert!(load.table.is_empty());
        assert_eq!(load.report.drops.len(), 1);
        assert_eq!(load.report.drops[0].row, HEADER_ROW + 2);
    }

    #[test]
    fn shifted_header_is_detected() {
        let raw = RawSheet::new(
            "unicef-test",
            vec![vec!["ISO Code".to_string(), "Country Name".to_string()]],
        );
        let err = parse(&raw, "u5_mortality_rate").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
