//! Feature/label framing for supervised learning.
//!
//! Labels are the six health/welfare rates in `LABELS`. Features are the
//! country (categorical), the year, and every other numeric column. The ISO
//! code is display metadata and never reaches the model.

use nalgebra::DMatrix;

use crate::domain::{HarmonizedTable, LABELS};
use crate::error::AppError;

pub mod split;

pub use split::*;

/// Numeric feature matrix plus the categorical country column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    /// Numeric feature names, `year` first.
    pub names: Vec<String>,
    pub countries: Vec<String>,
    pub values: DMatrix<f64>,
}

impl FeatureMatrix {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Years, read back from the first numeric column.
    pub fn years(&self) -> Vec<i32> {
        self.values.column(0).iter().map(|y| *y as i32).collect()
    }

    /// Keep only the rows at `indices`, in order.
    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            countries: indices.iter().map(|&i| self.countries[i].clone()).collect(),
            values: self.values.select_rows(indices),
        }
    }
}

/// A harmonized table split into features and (possibly missing) labels.
#[derive(Debug, Clone)]
pub struct FramedData {
    pub features: FeatureMatrix,
    pub label_names: Vec<String>,
    pub labels: Vec<Vec<Option<f64>>>,
}

/// Split `table` into features and labels.
///
/// Missing feature cells become `0.0`, a crude stand-in that keeps every row
/// usable. Missing labels stay missing; the splitter imputes them.
pub fn frame(table: &HarmonizedTable) -> Result<FramedData, AppError> {
    let label_idx: Vec<usize> = LABELS
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| AppError::compute(format!("Harmonized table has no label column `{name}`")))
        })
        .collect::<Result<_, _>>()?;

    let feature_idx: Vec<usize> = (0..table.columns.len())
        .filter(|idx| !label_idx.contains(idx))
        .collect();

    let mut names = vec!["year".to_string()];
    names.extend(feature_idx.iter().map(|&idx| table.columns[idx].clone()));

    let width = names.len();
    let values = DMatrix::from_fn(table.rows.len(), width, |r, c| {
        let row = &table.rows[r];
        if c == 0 {
            row.year as f64
        } else {
            row.values[feature_idx[c - 1]].unwrap_or(0.0)
        }
    });

    let labels = table
        .rows
        .iter()
        .map(|row| label_idx.iter().map(|&idx| row.values[idx]).collect())
        .collect();

    Ok(FramedData {
        features: FeatureMatrix {
            names,
            countries: table.rows.iter().map(|r| r.country.clone()).collect(),
            values,
        },
        label_names: LABELS.iter().map(|s| s.to_string()).collect(),
        labels,
    })
}
