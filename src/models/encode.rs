//! Feature preprocessing: one-hot country encoding and standard scaling.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// One column per training country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted, distinct.
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit(countries: &[String]) -> Self {
        let mut categories = countries.to_vec();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn is_known(&self, country: &str) -> bool {
        self.categories.binary_search_by(|c| c.as_str().cmp(country)).is_ok()
    }

    /// Write the encoding of `country` into `out`; unknown countries encode as all zeros.
    pub fn encode_into(&self, country: &str, out: &mut [f64]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        if let Ok(idx) = self.categories.binary_search_by(|c| c.as_str().cmp(country)) {
            out[idx] = 1.0;
        }
    }
}

/// Per-column mean/population-std standardization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(values: &DMatrix<f64>) -> Self {
        let n = values.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(values.ncols());
        let mut scale = Vec::with_capacity(values.ncols());
        for col in values.column_iter() {
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            mean.push(m);
            // Constant columns pass through centered.
            scale.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }
        Self { mean, scale }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_into(&self, row: &[f64], out: &mut [f64]) {
        for (idx, (v, o)) in row.iter().zip(out.iter_mut()).enumerate() {
            *o = (v - self.mean[idx]) / self.scale[idx];
        }
    }
}

/// Build the model's design matrix: one-hot block, then scaled numeric block.
pub fn encode_design(
    encoder: &OneHotEncoder,
    scaler: &StandardScaler,
    countries: &[String],
    numeric: &DMatrix<f64>,
) -> DMatrix<f64> {
    let onehot = encoder.width();
    let mut design = DMatrix::zeros(numeric.nrows(), onehot + scaler.width());
    let mut buf = vec![0.0; onehot + scaler.width()];
    for (r, country) in countries.iter().enumerate() {
        let row: Vec<f64> = numeric.row(r).iter().copied().collect();
        let (head, tail) = buf.split_at_mut(onehot);
        encoder.encode_into(country, head);
        scaler.transform_into(&row, tail);
        for (c, v) in buf.iter().enumerate() {
            design[(r, c)] = *v;
        }
    }
    design
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn categories_are_sorted_and_distinct() {
        let enc = OneHotEncoder::fit(&names(&["Peru", "Chile", "Peru", "Austria"]));
        assert_eq!(enc.categories, names(&["Austria", "Chile", "Peru"]));

        let mut out = [9.0; 3];
        enc.encode_into("Chile", &mut out);
        assert_eq!(out, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn unknown_country_encodes_as_zeros() {
        let enc = OneHotEncoder::fit(&names(&["Chile", "Peru"]));
        let mut out = [1.0; 2];
        enc.encode_into("Atlantis", &mut out);
        assert_eq!(out, [0.0, 0.0]);
        assert!(!enc.is_known("Atlantis"));
    }

    #[test]
    fn scaler_uses_population_std_and_guards_constants() {
        let values = DMatrix::from_row_slice(4, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0, 4.0, 5.0]);
        let scaler = StandardScaler::fit(&values);
        assert_eq!(scaler.mean, vec![2.5, 5.0]);
        assert!((scaler.scale[0] - 1.25_f64.sqrt()).abs() < 1e-12);
        assert_eq!(scaler.scale[1], 1.0);
    }

    #[test]
    fn design_puts_onehot_block_first() {
        let enc = OneHotEncoder::fit(&names(&["Chile", "Peru"]));
        let values = DMatrix::from_row_slice(2, 1, &[10.0, 20.0]);
        let scaler = StandardScaler::fit(&values);
        let design = encode_design(&enc, &scaler, &names(&["Peru", "Chile"]), &values);

        assert_eq!(design.ncols(), 3);
        assert_eq!(design.row(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, -1.0]);
        assert_eq!(design.row(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 1.0]);
    }
}
