//! WHO/UN MMEIG maternal mortality estimates (CSV).
//!
//! The file stacks several indicators (`mmr`, `pm`, `mat_deaths`, ...) with
//! point estimates, interval bounds, and pre-rounded duplicates. Only the
//! unrounded `mmr` point estimate is used.

use std::path::Path;

use crate::domain::{CountryYear, DropReason, SourceKind};
use crate::error::AppError;
use crate::io::sheet::{HeaderLayout, HeaderedSheet, RawSheet, SheetRecord};
use crate::sources::{
    Observation, SingleColumnBuilder, SourceLoad, optional, parse_value, parse_year, required, unparseable,
};

pub const PATH: &str = "country_stats/who/maternal_mortality.csv";
pub const COLUMN: &str = "maternal_mortality_rate";

const COL_CODE: &str = "ISOalpha3";
const COL_COUNTRY: &str = "Country";
const COL_YEAR: &str = "Year";
const COL_INDICATOR: &str = "Indicator";
const COL_ESTIMATE: &str = "Estimate";
const COL_ROUNDED: &str = "Rounded";
const COL_VALUE: &str = "Value";

pub fn read(data_dir: &Path) -> Result<SourceLoad, AppError> {
    let raw = RawSheet::from_csv_path(&data_dir.join(PATH))?;
    parse(&raw)
}

pub fn parse(raw: &RawSheet) -> Result<SourceLoad, AppError> {
    let sheet = raw.with_header(HeaderLayout::Single(0))?;
    sheet.require_columns(&[
        COL_COUNTRY,
        COL_YEAR,
        COL_INDICATOR,
        COL_ESTIMATE,
        COL_ROUNDED,
        COL_VALUE,
    ])?;

    let mut builder = SingleColumnBuilder::new(SourceKind::MaternalMortality, COLUMN);
    for record in &sheet.records {
        builder.push(record.line, parse_record(&sheet, record));
    }
    Ok(builder.finish())
}

fn parse_record(sheet: &HeaderedSheet, record: &SheetRecord) -> Result<Option<Observation>, DropReason> {
    let indicator = sheet.get(record, COL_INDICATOR).unwrap_or("");
    let estimate = sheet.get(record, COL_ESTIMATE).unwrap_or("");
    if !indicator.eq_ignore_ascii_case("mmr") || !estimate.eq_ignore_ascii_case("point estimate") {
        return Ok(None);
    }
    let rounded = sheet.get(record, COL_ROUNDED).unwrap_or("");
    if parse_flag(rounded).ok_or_else(|| unparseable(COL_ROUNDED, rounded))? {
        return Ok(None);
    }

    let country = required(sheet, record, COL_COUNTRY)?;
    let year = parse_year(required(sheet, record, COL_YEAR)?, COL_YEAR)?;
    let value = parse_value(sheet.get(record, COL_VALUE).unwrap_or(""), COL_VALUE)?;

    Ok(Some(Observation {
        key: CountryYear::new(country, year),
        code: optional(sheet, record, COL_CODE).map(str::to_string),
        value: Some(value),
    }))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[[&str; 7]]) -> RawSheet {
        let mut grid = vec![
            ["ISOalpha3", "Country", "Year", "Indicator", "Estimate", "Rounded", "Value"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        ];
        grid.extend(rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        RawSheet::new("mmr-test", grid)
    }

    #[test]
    fn keeps_unrounded_mmr_point_estimates() {
        let load = parse(&sheet(&[
            ["KEN", "Kenya", "2015", "mmr", "point estimate", "FALSE", "353.4"],
            ["KEN", "Kenya", "2015", "mmr", "point estimate", "TRUE", "353"],
            ["KEN", "Kenya", "2015", "mmr", "lower bound", "FALSE", "300"],
            ["KEN", "Kenya", "2015", "pm", "point estimate", "FALSE", "5.1"],
        ]))
        .unwrap();

        assert_eq!(load.table.len(), 1);
        let row = load.table.get(&CountryYear::new("Kenya", 2015)).unwrap();
        assert_eq!(row.values, vec![Some(353.4)]);
        assert_eq!(row.code.as_deref(), Some("KEN"));
        assert!(load.report.drops.is_empty());
    }

    #[test]
    fn malformed_rows_become_drops() {
        let load = parse(&sheet(&[
            ["KEN", "Kenya", "2016", "mmr", "point estimate", "maybe", "1"],
            ["KEN", "Kenya", "", "mmr", "point estimate", "FALSE", "1"],
            ["KEN", "Kenya", "2017", "mmr", "point estimate", "FALSE", "-"],
        ]))
        .unwrap();

        assert!(load.table.is_empty());
        let counts = load.report.counts();
        assert_eq!(counts.get("unparseable value"), Some(&2));
        assert_eq!(counts.get("missing key"), Some(&1));
    }
}
