//! Export the harmonized table to CSV.
//!
//! One row per country-year: `country, code, year`, then every indicator
//! column. Missing cells are written empty, never as `0`.

use std::path::Path;

use crate::domain::{HarmonizedRow, HarmonizedTable};
use crate::error::{AppError, EXIT_INPUT};

/// Write `table` to `path`, optionally keeping only rows for `year`.
///
/// Returns the number of data rows written.
pub fn write_table_csv(path: &Path, table: &HarmonizedTable, year: Option<i32>) -> Result<usize, AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let mut header = vec!["country".to_string(), "code".to_string(), "year".to_string()];
    header.extend(table.columns.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write export CSV header: {e}")))?;

    let mut written = 0;
    for row in table.rows.iter().filter(|r| year.is_none_or(|y| r.year == y)) {
        writer
            .write_record(record(row))
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write export CSV row: {e}")))?;
        written += 1;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush export CSV: {e}")))?;
    Ok(written)
}

fn record(row: &HarmonizedRow) -> Vec<String> {
    let mut out = vec![
        row.country.clone(),
        row.code.clone().unwrap_or_default(),
        row.year.to_string(),
    ];
    out.extend(row.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
    out
}
