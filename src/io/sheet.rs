//! Grid loading for CSV files and workbook sheets.
//!
//! Every source ends up as a `RawSheet`: a rectangular-ish grid of trimmed
//! cell strings where row `i` is row `i` of the original file/sheet. A
//! `HeaderLayout` then turns the grid into a `HeaderedSheet` with named
//! columns and the remaining data rows.
//!
//! Header positions are part of each source's data contract, so a shifted or
//! renamed header surfaces as a schema error (exit code 2) rather than as
//! silently misaligned values.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use crate::error::AppError;

/// Raw cell grid plus a label for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub origin: String,
    pub rows: Vec<Vec<String>>,
}

/// Where the header lives in a sheet (0-based row indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    Single(usize),
    /// Header rows `first..=last` are joined into one label per column.
    Combined { first: usize, last: usize },
}

impl HeaderLayout {
    fn last_row(self) -> usize {
        match self {
            HeaderLayout::Single(row) => row,
            HeaderLayout::Combined { last, .. } => last,
        }
    }
}

impl RawSheet {
    pub fn new(origin: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            origin: origin.into(),
            rows,
        }
    }

    /// Load a CSV file, detecting `;` vs `,` from the first line.
    pub fn from_csv_path(path: &Path) -> Result<Self, AppError> {
        let origin = path.display().to_string();
        let delimiter = sniff_delimiter(path)?;

        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open CSV '{origin}': {e}")))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record =
                result.map_err(|e| AppError::input(format!("Failed to read CSV '{origin}' line {}: {e}", idx + 1)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if let Some(first) = rows.first_mut().and_then(|r: &mut Vec<String>| r.first_mut()) {
            // Excel exports sometimes prefix the first header with a BOM.
            *first = first.trim_start_matches('\u{feff}').to_string();
        }

        Ok(Self { origin, rows })
    }

    /// Load one sheet of a workbook (`.xlsx`, `.xls`, `.ods`).
    pub fn from_workbook(path: &Path, sheet: &str) -> Result<Self, AppError> {
        let origin = format!("{} [{sheet}]", path.display());
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| AppError::input(format!("Failed to open workbook '{}': {e}", path.display())))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| AppError::input(format!("Failed to read sheet '{origin}': {e}")))?;

        // Ranges start at the first non-empty cell; pad back to absolute
        // coordinates so header offsets stay meaningful.
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![String::new(); col_offset];
            cells.extend(row.iter().map(cell_text));
            rows.push(cells);
        }

        Ok(Self { origin, rows })
    }

    /// Resolve the header rows and split off the data rows.
    pub fn with_header(&self, layout: HeaderLayout) -> Result<HeaderedSheet, AppError> {
        let last = layout.last_row();
        if self.rows.len() <= last {
            return Err(AppError::input(format!(
                "'{}' has {} rows; expected a header at row {}",
                self.origin,
                self.rows.len(),
                last + 1
            )));
        }

        let headers = match layout {
            HeaderLayout::Single(row) => self.rows[row].iter().map(|h| h.trim().to_string()).collect(),
            HeaderLayout::Combined { first, last } => combine_header_rows(&self.rows[first..=last]),
        };

        let records = self.rows[last + 1..]
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|(idx, cells)| SheetRecord {
                line: last + idx + 2,
                cells: cells.clone(),
            })
            .collect();

        Ok(HeaderedSheet::new(self.origin.clone(), headers, records))
    }
}

/// A data row and its 1-based line/row number in the original file.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRecord {
    pub line: usize,
    pub cells: Vec<String>,
}

/// A sheet with resolved column names.
#[derive(Debug, Clone)]
pub struct HeaderedSheet {
    pub origin: String,
    pub headers: Vec<String>,
    pub records: Vec<SheetRecord>,
    exact: HashMap<String, usize>,
    header_map: HashMap<String, usize>,
}

impl HeaderedSheet {
    pub fn new(origin: String, headers: Vec<String>, records: Vec<SheetRecord>) -> Self {
        let mut exact = HashMap::new();
        let mut header_map = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            // First occurrence wins for repeated labels.
            exact.entry(name.trim().to_string()).or_insert(idx);
            header_map.entry(normalize_header_name(name)).or_insert(idx);
        }
        Self {
            origin,
            headers,
            records,
            exact,
            header_map,
        }
    }

    /// Column index by name.
    ///
    /// An exact match wins over a case-insensitive one, so OECD exports that
    /// carry both `TIME` (code) and `Time` (label) resolve as written.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.exact
            .get(name.trim())
            .or_else(|| self.header_map.get(&normalize_header_name(name)))
            .copied()
    }

    /// Fail with a schema error naming the first absent column.
    pub fn require_columns(&self, names: &[&str]) -> Result<(), AppError> {
        for name in names {
            if self.column(name).is_none() {
                return Err(AppError::input(format!(
                    "Missing required column `{name}` in '{}'",
                    self.origin
                )));
            }
        }
        Ok(())
    }

    /// Trimmed, non-empty cell value for `name`.
    pub fn get<'a>(&self, record: &'a SheetRecord, name: &str) -> Option<&'a str> {
        let idx = self.column(name)?;
        cell_at(record, idx)
    }
}

/// Trimmed, non-empty cell value at column `idx`.
pub fn cell_at(record: &SheetRecord, idx: usize) -> Option<&str> {
    record
        .cells
        .get(idx)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Join multi-row headers into one label per column.
///
/// Blank cells in every row but the last inherit the label to their left,
/// which is how merged group headers come out of a workbook.
pub fn combine_header_rows(rows: &[Vec<String>]) -> Vec<String> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut parts: Vec<Vec<String>> = vec![Vec::new(); width];

    for (row_idx, row) in rows.iter().enumerate() {
        let is_last = row_idx + 1 == rows.len();
        let mut carried = String::new();
        for (col, part) in parts.iter_mut().enumerate() {
            let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
            let label = if !cell.is_empty() {
                carried = cell.to_string();
                cell.to_string()
            } else if !is_last {
                carried.clone()
            } else {
                String::new()
            };
            if !label.is_empty() {
                part.push(label);
            }
        }
    }

    parts.into_iter().map(|p| p.join(" ")).collect()
}

fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn sniff_delimiter(path: &Path) -> Result<u8, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(|e| AppError::input(format!("Failed to read CSV '{}': {e}", path.display())))?;
    Ok(delimiter_for(&first_line))
}

fn delimiter_for(line: &str) -> u8 {
    let semicolons = line.matches(';').count();
    let commas = line.matches(',').count();
    if semicolons > commas { b';' } else { b',' }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn combined_headers_carry_merged_labels() {
        let rows = grid(&[
            &["Country or area", "Survey end year", "Contraceptive prevalence (%)", ""],
            &["", "", "Any method", "Any modern method"],
        ]);
        let headers = combine_header_rows(&rows);
        assert_eq!(
            headers,
            vec![
                "Country or area",
                "Survey end year",
                "Contraceptive prevalence (%) Any method",
                "Contraceptive prevalence (%) Any modern method",
            ]
        );
    }

    #[test]
    fn header_lookup_is_case_and_space_insensitive() {
        let sheet = RawSheet::new("test", grid(&[&["  ISO  Code", "Value"], &["ABC", "1"]]));
        let headered = sheet.with_header(HeaderLayout::Single(0)).unwrap();
        assert_eq!(headered.column("iso code"), Some(0));
        assert_eq!(headered.get(&headered.records[0], "VALUE"), Some("1"));
        assert_eq!(headered.records[0].line, 2);
    }

    #[test]
    fn exact_header_match_beats_case_insensitive() {
        let sheet = RawSheet::new(
            "test",
            grid(&[&["INDICATOR", "Indicator"], &["GEXP", "Health"]]),
        );
        let headered = sheet.with_header(HeaderLayout::Single(0)).unwrap();
        assert_eq!(headered.column("Indicator"), Some(1));
        assert_eq!(headered.column("INDICATOR"), Some(0));
        assert_eq!(headered.column("indicator"), Some(0));
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let sheet = RawSheet::new("test", grid(&[&["Country", "Year"]]));
        let headered = sheet.with_header(HeaderLayout::Single(0)).unwrap();
        let err = headered.require_columns(&["Country", "Value"]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("`Value`"));
    }

    #[test]
    fn short_sheet_reports_shifted_header() {
        let sheet = RawSheet::new("test", grid(&[&["only one row"]]));
        assert!(sheet.with_header(HeaderLayout::Single(11)).is_err());
    }

    #[test]
    fn blank_rows_are_skipped_but_lines_are_preserved() {
        let sheet = RawSheet::new("test", grid(&[&["a", "b"], &["", ""], &["1", "2"]]));
        let headered = sheet.with_header(HeaderLayout::Single(0)).unwrap();
        assert_eq!(headered.records.len(), 1);
        assert_eq!(headered.records[0].line, 3);
    }

    #[test]
    fn workbook_grid_keeps_absolute_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        // Header at row 3 column B, so the used range does not start at A1.
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Data").unwrap();
        for (col, label) in [(1, "Country"), (2, "Year"), (3, "Value")] {
            sheet.write_string(2, col, label).unwrap();
        }
        sheet.write_string(3, 1, "Chile").unwrap();
        sheet.write_number(3, 2, 2015.0).unwrap();
        sheet.write_number(3, 3, 1990.5).unwrap();
        workbook.save(&path).unwrap();

        let raw = RawSheet::from_workbook(&path, "Data").unwrap();
        assert!(raw.origin.ends_with("[Data]"));
        assert_eq!(raw.rows.len(), 4);
        assert!(raw.rows[..2].iter().all(|r| r.iter().all(|c| c.is_empty())));
        assert_eq!(raw.rows[2], vec!["", "Country", "Year", "Value"]);
        assert_eq!(raw.rows[3], vec!["", "Chile", "2015", "1990.5"]);

        let headered = raw.with_header(HeaderLayout::Single(2)).unwrap();
        assert_eq!(headered.records.len(), 1);
        assert_eq!(headered.records[0].line, 4);
    }

    #[test]
    fn missing_workbook_sheet_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet().write_string(0, 0, "x").unwrap();
        workbook.save(&path).unwrap();

        let err = RawSheet::from_workbook(&path, "Absent").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("Absent"));
    }

    #[test]
    fn csv_loader_detects_semicolons_and_strips_bom() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\u{feff}LOCATION;Country;Value\nAUS;Australia;1,5\n").unwrap();

        let sheet = RawSheet::from_csv_path(file.path()).unwrap();
        assert_eq!(sheet.rows[0], vec!["LOCATION", "Country", "Value"]);
        assert_eq!(sheet.rows[1], vec!["AUS", "Australia", "1,5"]);
    }

    #[test]
    fn missing_csv_is_fatal() {
        let err = RawSheet::from_csv_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn float_cells_render_without_trailing_zero() {
        assert_eq!(format_float(2015.0), "2015");
        assert_eq!(format_float(1990.5), "1990.5");
    }
}
