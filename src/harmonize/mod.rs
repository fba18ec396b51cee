//! Harmonizer: one table out of many sources.
//!
//! The OECD budget table is the base. Every other source is left-joined onto
//! it by `(country, year)`, so a country-year that has no budget row never
//! reaches the output even if every health source covers it. After the join,
//! each country's timeline is filled forward and then backward.

use std::collections::HashSet;

use tracing::warn;

use crate::domain::{HarmonizedRow, HarmonizedTable, SourceTable};
use crate::error::AppError;

pub mod fill;

use fill::{FillPass, fill_by_country};

/// Join `others` onto `base` and fill gaps per country.
pub fn harmonize(base: &SourceTable, others: &[&SourceTable]) -> Result<HarmonizedTable, AppError> {
    let columns = joined_columns(base, others)?;

    let rows: Vec<HarmonizedRow> = base
        .rows
        .iter()
        .map(|(key, base_row)| {
            let mut values = base_row.values.clone();
            for other in others {
                match other.get(key) {
                    Some(row) => values.extend(row.values.iter().copied()),
                    None => values.extend(std::iter::repeat_n(None, other.columns.len())),
                }
            }
            HarmonizedRow {
                country: key.country.clone(),
                code: base_row.code.clone(),
                year: key.year,
                values,
            }
        })
        .collect();

    let rows = fill_by_country(rows, &[FillPass::Forward, FillPass::Backward]);
    let table = HarmonizedTable { columns, rows };

    for (name, missing) in table.columns.iter().zip(table.missing_counts()) {
        if missing > 0 {
            warn!(column = %name, missing, "cells left empty after fill (no observation for those countries)");
        }
    }

    Ok(table)
}

fn joined_columns(base: &SourceTable, others: &[&SourceTable]) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for table in std::iter::once(base).chain(others.iter().copied()) {
        for name in &table.columns {
            if !seen.insert(name.clone()) {
                return Err(AppError::compute(format!(
                    "Column `{name}` is produced by more than one source ({})",
                    table.source.display_name()
                )));
            }
            columns.push(name.clone());
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CountryYear, SourceKind, SourceRow};

    fn table(source: SourceKind, column: &str, rows: &[(&str, i32, Option<f64>)]) -> SourceTable {
        let mut table = SourceTable::new(source, vec![column.to_string()]);
        for (country, year, value) in rows {
            table.insert_first(
                CountryYear::new(*country, *year),
                SourceRow {
                    code: Some(country[..3].to_uppercase()),
                    values: vec![*value],
                },
            );
        }
        table
    }

    fn budgets() -> SourceTable {
        table(
            SourceKind::OecdBudgets,
            "health_budget",
            &[
                ("Chile", 2015, Some(10.0)),
                ("Chile", 2016, Some(11.0)),
                ("Chile", 2017, Some(12.0)),
                ("Chile", 2018, Some(13.0)),
                ("Mexico", 2016, Some(50.0)),
            ],
        )
    }

    fn mortality(rows: &[(&str, i32, Option<f64>)]) -> SourceTable {
        table(SourceKind::ChildMortality, "u5_mortality_rate", rows)
    }

    fn values(table: &HarmonizedTable, country: &str, column: &str) -> Vec<Option<f64>> {
        let idx = table.column_index(column).unwrap();
        table
            .rows
            .iter()
            .filter(|r| r.country == country)
            .map(|r| r.values[idx])
            .collect()
    }

    #[test]
    fn health_only_keys_never_appear() {
        let health = mortality(&[
            ("Chile", 2016, Some(8.0)),
            ("Kenya", 2016, Some(41.0)),
            ("Chile", 2030, Some(1.0)),
        ]);
        let out = harmonize(&budgets(), &[&health]).unwrap();

        assert!(out.row("Kenya", 2016).is_none());
        assert!(out.row("Chile", 2030).is_none());
        assert_eq!(out.rows.len(), budgets().len());
        assert_eq!(out.columns, vec!["health_budget", "u5_mortality_rate"]);
        assert_eq!(out.row("Chile", 2015).unwrap().code.as_deref(), Some("CHI"));
    }

    #[test]
    fn every_observed_indicator_is_filled_for_its_country() {
        let health = mortality(&[("Chile", 2017, Some(7.0))]);
        let out = harmonize(&budgets(), &[&health]).unwrap();

        assert_eq!(
            values(&out, "Chile", "u5_mortality_rate"),
            vec![Some(7.0), Some(7.0), Some(7.0), Some(7.0)]
        );
        // Mexico has no mortality observation anywhere: stays missing, not zero.
        assert_eq!(values(&out, "Mexico", "u5_mortality_rate"), vec![None]);
    }

    #[test]
    fn forward_fill_runs_before_backward_fill() {
        let health = mortality(&[("Chile", 2016, Some(9.0)), ("Chile", 2018, Some(5.0))]);
        let out = harmonize(&budgets(), &[&health]).unwrap();

        // 2015 backfilled from 2016; 2017 forward-filled from 2016, not 2018.
        assert_eq!(
            values(&out, "Chile", "u5_mortality_rate"),
            vec![Some(9.0), Some(9.0), Some(9.0), Some(5.0)]
        );
    }

    #[test]
    fn fill_results_do_not_depend_on_input_order() {
        let health = mortality(&[("Chile", 2016, Some(9.0)), ("Chile", 2018, Some(5.0))]);
        let forward = harmonize(&budgets(), &[&health]).unwrap();

        // Build the same rows newest-first and run them through the same fill.
        let idx = forward.column_index("u5_mortality_rate").unwrap();
        let mut reversed = forward.rows.clone();
        for row in &mut reversed {
            row.values[idx] = health
                .get(&CountryYear::new(row.country.clone(), row.year))
                .and_then(|r| r.values[0]);
        }
        reversed.reverse();
        let refilled = fill_by_country(reversed, &[FillPass::Forward, FillPass::Backward]);

        assert_eq!(refilled, forward.rows);
    }

    #[test]
    fn duplicate_column_names_are_rejected() {
        let a = mortality(&[]);
        let b = mortality(&[]);
        let err = harmonize(&budgets(), &[&a, &b]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_COMPUTE);
    }
}
