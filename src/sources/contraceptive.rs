//! UN World Contraceptive Use survey workbook.
//!
//! Survey-level data: a country can have several surveys ending in the same
//! year (DHS, MICS, national surveys). We keep the first survey listed for
//! each country-year. This is lossy, and every discarded survey shows up in
//! the drop report as a duplicate.

use std::path::Path;

use crate::domain::{CountryYear, DropReason, SourceKind};
use crate::error::AppError;
use crate::io::sheet::{HeaderLayout, HeaderedSheet, RawSheet, SheetRecord};
use crate::sources::{Observation, SingleColumnBuilder, SourceLoad, optional, parse_value, parse_year, required};

pub const PATH: &str = "country_stats/un/contraceptive_use.xlsx";
pub const SHEET: &str = "By country";
pub const COLUMN: &str = "modern_contraceptive_rate";

/// Group labels on row 3, method labels on row 4.
const HEADER: HeaderLayout = HeaderLayout::Combined { first: 3, last: 4 };

const COL_COUNTRY: &str = "Country or area";
const COL_CODE: &str = "ISO code";
const COL_YEAR: &str = "Survey end year";
const COL_MODERN: &str = "Contraceptive prevalence (%) Any modern method";

pub fn read(data_dir: &Path) -> Result<SourceLoad, AppError> {
    let raw = RawSheet::from_workbook(&data_dir.join(PATH), SHEET)?;
    parse(&raw)
}

pub fn parse(raw: &RawSheet) -> Result<SourceLoad, AppError> {
    let sheet = raw.with_header(HEADER)?;
    sheet.require_columns(&[COL_COUNTRY, COL_YEAR, COL_MODERN])?;

    let mut builder = SingleColumnBuilder::new(SourceKind::ContraceptiveUse, COLUMN);
    for record in &sheet.records {
        builder.push(record.line, parse_record(&sheet, record));
    }
    Ok(builder.finish())
}

fn parse_record(sheet: &HeaderedSheet, record: &SheetRecord) -> Result<Option<Observation>, DropReason> {
    let country = required(sheet, record, COL_COUNTRY)?;
    let year = parse_year(required(sheet, record, COL_YEAR)?, COL_YEAR)?;
    let value = parse_value(sheet.get(record, COL_MODERN).unwrap_or(""), COL_MODERN)?;

    Ok(Some(Observation {
        key: CountryYear::new(country, year),
        code: optional(sheet, record, COL_CODE).map(str::to_string),
        value: Some(value),
    }))
}
