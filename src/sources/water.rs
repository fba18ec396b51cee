//! WHO/UNICEF JMP drinking-water estimates.
//!
//! Coverage figures near the ends of the scale are published as bounds
//! (`<5`, `>95`). The bound itself is used as the value. Anything else that
//! does not parse (`-`, blank, footnote marks) becomes a missing cell rather
//! than a failure, so the country-year row is still present for the join.

use std::path::Path;

use crate::domain::{CountryYear, DropReason, SourceKind};
use crate::error::AppError;
use crate::io::sheet::{HeaderLayout, HeaderedSheet, RawSheet, SheetRecord};
use crate::sources::{Observation, SingleColumnBuilder, SourceLoad, optional, parse_year, required};

pub const PATH: &str = "country_stats/jmp/water.xlsx";
pub const SHEET: &str = "Water";
pub const COLUMN: &str = "safely_managed_water_use_rate";

/// Area (row 0), service level (row 1), units (row 2).
const HEADER: HeaderLayout = HeaderLayout::Combined { first: 0, last: 2 };

const COL_COUNTRY: &str = "COUNTRY, AREA OR TERRITORY";
const COL_CODE: &str = "ISO3";
const COL_YEAR: &str = "Year";
const COL_SAFELY_MANAGED: &str = "NATIONAL Safely managed %";

pub fn read(data_dir: &Path) -> Result<SourceLoad, AppError> {
    let raw = RawSheet::from_workbook(&data_dir.join(PATH), SHEET)?;
    parse(&raw)
}

pub fn parse(raw: &RawSheet) -> Result<SourceLoad, AppError> {
    let sheet = raw.with_header(HEADER)?;
    sheet.require_columns(&[COL_COUNTRY, COL_YEAR, COL_SAFELY_MANAGED])?;

    let mut builder = SingleColumnBuilder::new(SourceKind::DrinkingWater, COLUMN);
    for record in &sheet.records {
        builder.push(record.line, parse_record(&sheet, record));
    }
    Ok(builder.finish())
}

fn parse_record(sheet: &HeaderedSheet, record: &SheetRecord) -> Result<Option<Observation>, DropReason> {
    let country = required(sheet, record, COL_COUNTRY)?;
    let year = parse_year(required(sheet, record, COL_YEAR)?, COL_YEAR)?;
    let value = sheet.get(record, COL_SAFELY_MANAGED).and_then(parse_bounded);

    Ok(Some(Observation {
        key: CountryYear::new(country, year),
        code: optional(sheet, record, COL_CODE).map(str::to_string),
        value,
    }))
}

/// Parse a coverage figure that may carry an inequality marker.
pub fn parse_bounded(raw: &str) -> Option<f64> {
    let trimmed = raw
        .trim()
        .trim_start_matches(['<', '>', '≤', '≥', '='])
        .trim();
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook(data: &[[&str; 5]]) -> RawSheet {
        let text = |r: &[&str]| r.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut rows = vec![
            text(&["COUNTRY, AREA OR TERRITORY", "ISO3", "Year", "NATIONAL", ""]),
            text(&["", "", "", "Safely managed", "Basic"]),
            text(&["", "", "", "%", "%"]),
        ];
        rows.extend(data.iter().map(|r| text(r)));
        RawSheet::new("water-test", rows)
    }

    #[test]
    fn inequality_markers_are_stripped() {
        assert_eq!(parse_bounded("<5"), Some(5.0));
        assert_eq!(parse_bounded(">95"), Some(95.0));
        assert_eq!(parse_bounded(" 42.5 "), Some(42.5));
        assert_eq!(parse_bounded("-"), None);
        assert_eq!(parse_bounded(""), None);
    }

    #[test]
    fn units_row_is_part_of_the_header() {
        let headers = workbook(&[]).with_header(HEADER).unwrap().headers;
        assert_eq!(headers[3], "NATIONAL Safely managed %");
    }

    #[test]
    fn unparseable_values_become_missing_cells() {
        let raw = workbook(&[
            ["Mali", "MLI", "2017", "-", "78"],
            ["Mali", "MLI", "2016", ">99", "78"],
        ]);
        let load = parse(&raw).unwrap();

        assert_eq!(
            load.table.get(&CountryYear::new("Mali", 2017)).unwrap().values,
            vec![None]
        );
        assert_eq!(
            load.table.get(&CountryYear::new("Mali", 2016)).unwrap().values,
            vec![Some(99.0)]
        );
        assert!(load.report.drops.is_empty());
    }
}
