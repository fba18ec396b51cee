//! OECD general-government expenditure table (national accounts at a glance).
//!
//! The CSV is long-format: one row per `(country, year, indicator)`. We pivot to
//! one column per indicator, fill year gaps forward within each country, and
//! convert percent-of-GDP shares into absolute figures (billions of US dollars,
//! PPP) by multiplying with the GDP indicator.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::domain::{
    CountryYear, DropReason, DropReport, HarmonizedRow, SourceKind, SourceRow, SourceTable,
};
use crate::error::AppError;
use crate::harmonize::fill::{FillPass, fill_by_country};
use crate::io::sheet::{HeaderLayout, HeaderedSheet, RawSheet, SheetRecord};
use crate::sources::{SourceLoad, parse_value, parse_year, required};

pub const PATH: &str = "country_stats/oecd/NAAG_13102019054548637.csv";

pub const GDP_INDICATOR: &str = "Gross domestic product (GDP), current PPPs, billions US dollars";

/// Empirically double-counts the other categories: dropping it brings the sum
/// of categories close to total expenditure.
pub const SOCIAL_BENEFITS_INDICATOR: &str = "Social benefits and social transfers in kind, percentage of GDP";

const COL_CODE: &str = "LOCATION";
const COL_COUNTRY: &str = "Country";
const COL_TIME: &str = "Time";
const COL_INDICATOR: &str = "Indicator";
const COL_VALUE: &str = "Value";

pub fn read(data_dir: &Path) -> Result<SourceLoad, AppError> {
    let raw = RawSheet::from_csv_path(&data_dir.join(PATH))?;
    parse(&raw)
}

struct LongRow {
    key: CountryYear,
    code: String,
    indicator: String,
    value: f64,
}

/// Per-key pivot cell accumulator: `(sum, count)` per indicator.
struct PivotRow {
    code: String,
    cells: BTreeMap<String, (f64, usize)>,
}

pub fn parse(raw: &RawSheet) -> Result<SourceLoad, AppError> {
    let sheet = raw.with_header(HeaderLayout::Single(0))?;
    sheet.require_columns(&[COL_CODE, COL_COUNTRY, COL_TIME, COL_INDICATOR, COL_VALUE])?;

    let mut report = DropReport::new(SourceKind::OecdBudgets);
    let mut pivot: BTreeMap<CountryYear, PivotRow> = BTreeMap::new();
    let mut indicators: BTreeSet<String> = BTreeSet::new();

    for record in &sheet.records {
        report.rows_read += 1;
        let long = match parse_record(&sheet, record) {
            Ok(long) => long,
            Err(reason) => {
                report.drop_row(record.line, reason);
                continue;
            }
        };
        report.rows_used += 1;
        indicators.insert(long.indicator.clone());

        let entry = pivot.entry(long.key).or_insert_with(|| PivotRow {
            code: long.code,
            cells: BTreeMap::new(),
        });
        // Repeated cells are averaged, like a pivot table with a mean aggregate.
        let cell = entry.cells.entry(long.indicator).or_insert((0.0, 0));
        cell.0 += long.value;
        cell.1 += 1;
    }

    if !indicators.contains(GDP_INDICATOR) {
        return Err(AppError::input(format!(
            "'{}' has no `{GDP_INDICATOR}` rows; cannot convert shares of GDP",
            sheet.origin
        )));
    }
    indicators.remove(SOCIAL_BENEFITS_INDICATOR);
    let indicators: Vec<String> = indicators.into_iter().collect();

    let wide: Vec<HarmonizedRow> = pivot
        .into_iter()
        .map(|(key, row)| HarmonizedRow {
            values: indicators
                .iter()
                .map(|name| row.cells.get(name).map(|(sum, n)| sum / *n as f64))
                .collect(),
            country: key.country,
            code: Some(row.code),
            year: key.year,
        })
        .collect();

    // Recent years are often unpublished; carry the last known figures forward.
    let filled = fill_by_country(wide, &[FillPass::Forward]);

    let gdp_idx = indicators
        .iter()
        .position(|name| name == GDP_INDICATOR)
        .ok_or_else(|| AppError::input("GDP indicator vanished during pivot"))?;

    let columns: Vec<String> = indicators
        .iter()
        .filter(|name| name.as_str() != GDP_INDICATOR)
        .map(|name| clean_indicator_name(name))
        .collect();
    let mut table = SourceTable::new(SourceKind::OecdBudgets, columns);

    for row in filled {
        let key = CountryYear::new(row.country, row.year);
        // Leading years before a country's first observation, or countries
        // with no budget data at all.
        if row.values.iter().any(Option::is_none) {
            report.drop_key(key, DropReason::IncompleteAfterFill);
            continue;
        }

        let gdp = row.values[gdp_idx].unwrap_or_default();
        let values = row
            .values
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != gdp_idx)
            .map(|(_, share)| share.map(|s| share_to_absolute(s, gdp)))
            .collect();

        table.insert_first(key, SourceRow { code: row.code, values });
    }

    Ok(SourceLoad { table, report })
}

fn parse_record(sheet: &HeaderedSheet, record: &SheetRecord) -> Result<LongRow, DropReason> {
    let code = required(sheet, record, COL_CODE)?;
    let country = required(sheet, record, COL_COUNTRY)?;
    let year = parse_year(required(sheet, record, COL_TIME)?, COL_TIME)?;
    let indicator = required(sheet, record, COL_INDICATOR)?;
    let raw_value = sheet.get(record, COL_VALUE).unwrap_or("");
    let value = parse_value(raw_value, COL_VALUE)?;

    Ok(LongRow {
        key: CountryYear::new(country, year),
        code: code.to_string(),
        indicator: indicator.to_string(),
        value,
    })
}

/// Convert a percent-of-GDP figure to an absolute amount, rounded to cents of
/// the GDP unit.
pub fn share_to_absolute(share: f64, gdp: f64) -> f64 {
    (share * gdp * 100.0).round() / 100.0
}

/// Shorten an OECD indicator label into a snake_case column name.
///
/// Expenditure categories get a `_budget` suffix; aggregate figures (`total_*`,
/// `gross_*`) keep their name.
pub fn clean_indicator_name(name: &str) -> String {
    let cleaned = name
        .replace("General government expenditure by function, ", "")
        .replace(", percentage of GDP", "")
        .replace(" of general government", "")
        .replace(',', "")
        .replace(" general government (GG)", "")
        .replace(' ', "_")
        .to_lowercase();

    if cleaned.contains("gross") || cleaned.contains("total") {
        cleaned
    } else {
        format!("{cleaned}_budget")
    }
}
