//! UN World Fertility Data: age-specific fertility rates.
//!
//! Only the `[15-19]` age bracket is used (adolescent fertility). Some surveys
//! carry no nominal year; those are placed at their survey mid-point.

use std::path::Path;

use crate::domain::{CountryYear, DropReason, SourceKind};
use crate::error::AppError;
use crate::io::sheet::{HeaderLayout, HeaderedSheet, RawSheet, SheetRecord};
use crate::sources::{
    Observation, SingleColumnBuilder, SourceLoad, optional, parse_value, parse_year, required, unparseable,
};

pub const PATH: &str = "country_stats/un/fertility_indicators.xlsx";
pub const SHEET: &str = "FERTILITY_INDICATORS";
pub const COLUMN: &str = "adolescent_fertility_rate";
pub const AGE_GROUP: &str = "[15-19]";

const HEADER_ROW: usize = 2;

const COL_COUNTRY: &str = "Country or Area";
const COL_CODE: &str = "ISO code";
const COL_AGE: &str = "Age Group";
const COL_YEAR: &str = "Year";
const COL_MID_POINT: &str = "Survey mid-point";
const COL_VALUE: &str = "Value";

pub fn read(data_dir: &Path) -> Result<SourceLoad, AppError> {
    let raw = RawSheet::from_workbook(&data_dir.join(PATH), SHEET)?;
    parse(&raw)
}

pub fn parse(raw: &RawSheet) -> Result<SourceLoad, AppError> {
    let sheet = raw.with_header(HeaderLayout::Single(HEADER_ROW))?;
    sheet.require_columns(&[COL_COUNTRY, COL_AGE, COL_YEAR, COL_MID_POINT, COL_VALUE])?;

    let mut builder = SingleColumnBuilder::new(SourceKind::AdolescentFertility, COLUMN);
    for record in &sheet.records {
        builder.push(record.line, parse_record(&sheet, record));
    }
    Ok(builder.finish())
}

fn parse_record(sheet: &HeaderedSheet, record: &SheetRecord) -> Result<Option<Observation>, DropReason> {
    if sheet.get(record, COL_AGE) != Some(AGE_GROUP) {
        return Ok(None);
    }

    let country = required(sheet, record, COL_COUNTRY)?;
    let year = match sheet.get(record, COL_YEAR) {
        Some(raw) => parse_year(raw, COL_YEAR)?,
        None => mid_point_year(required(sheet, record, COL_MID_POINT)?)?,
    };
    let value = parse_value(sheet.get(record, COL_VALUE).unwrap_or(""), COL_VALUE)?;

    Ok(Some(Observation {
        key: CountryYear::new(country, year),
        code: optional(sheet, record, COL_CODE).map(str::to_string),
        value: Some(value),
    }))
}

/// Round a fractional survey mid-point (`2014.6`) to a calendar year.
///
/// Ties go to the even year, matching how the published tables round.
fn mid_point_year(raw: &str) -> Result<i32, DropReason> {
    let mid = parse_value(raw, COL_MID_POINT)?;
    let year = mid.round_ties_even() as i32;
    parse_year(&year.to_string(), COL_MID_POINT).map_err(|_| unparseable(COL_MID_POINT, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook(data: &[[&str; 6]]) -> RawSheet {
        let text = |r: &[&str]| r.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut rows = vec![
            text(&["World Fertility Data 2019"]),
            vec![],
            text(&["Country or Area", "ISO code", "Age Group", "Year", "Survey mid-point", "Value"]),
        ];
        rows.extend(data.iter().map(|r| text(r)));
        RawSheet::new("fertility-test", rows)
    }

    #[test]
    fn keeps_adolescent_bracket_only() {
        let load = parse(&workbook(&[
            ["Niger", "562", "[15-19]", "2012", "2012.1", "206.0"],
            ["Niger", "562", "[20-24]", "2012", "2012.1", "330.0"],
        ]))
        .unwrap();

        assert_eq!(load.table.len(), 1);
        assert_eq!(
            load.table.get(&CountryYear::new("Niger", 2012)).unwrap().values,
            vec![Some(206.0)]
        );
    }

    #[test]
    fn missing_year_falls_back_to_rounded_mid_point() {
        let load = parse(&workbook(&[
            ["Peru", "604", "[15-19]", "", "2014.6", "65.0"],
            ["Chad", "148", "[15-19]", "", "2014.5", "179.0"],
        ]))
        .unwrap();

        assert!(load.table.get(&CountryYear::new("Peru", 2015)).is_some());
        assert!(load.table.get(&CountryYear::new("Chad", 2014)).is_some());
    }

    #[test]
    fn missing_year_and_mid_point_is_a_drop() {
        let load = parse(&workbook(&[["Peru", "604", "[15-19]", "", "", "65.0"]])).unwrap();
        assert!(load.table.is_empty());
        assert_eq!(load.report.counts().get("missing key"), Some(&1));
    }
}
