//! Elastic-net regression by cyclic coordinate descent.
//!
//! Objective, for `n` rows:
//!
//! ```text
//! 1/(2n) ||y - Xw - b||² + α·ρ·||w||₁ + α·(1-ρ)/2 · ||w||²
//! ```
//!
//! with `α = alpha`, `ρ = l1_ratio`. The intercept `b` is handled by centering
//! `X` and `y` before descent and recovered afterwards.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetParams {
    pub alpha: f64,
    pub l1_ratio: f64,
    pub max_iter: usize,
    /// Convergence threshold on the largest coefficient update, relative to the largest coefficient.
    pub tol: f64,
}

impl Default for ElasticNetParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

/// Fitted coefficients for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetFit {
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl ElasticNetFit {
    pub fn predict_row(&self, x: &[f64]) -> f64 {
        self.coef.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + self.intercept
    }
}

fn soft_threshold(x: f64, t: f64) -> f64 {
    if x > t {
        x - t
    } else if x < -t {
        x + t
    } else {
        0.0
    }
}

/// Fit one target column.
pub fn fit_elastic_net(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    params: &ElasticNetParams,
) -> Result<ElasticNetFit, AppError> {
    let (n, p) = x.shape();
    if n == 0 {
        return Err(AppError::no_data("Cannot fit elastic net on zero rows."));
    }
    if y.len() != n {
        return Err(AppError::compute(format!(
            "Elastic net target has {} rows, design has {n}.",
            y.len()
        )));
    }
    if !(params.alpha >= 0.0 && (0.0..=1.0).contains(&params.l1_ratio)) {
        return Err(AppError::compute(format!(
            "Invalid elastic net parameters: alpha={}, l1_ratio={}",
            params.alpha, params.l1_ratio
        )));
    }

    let x_mean: Vec<f64> = x.column_iter().map(|c| c.mean()).collect();
    let y_mean = y.mean();
    let mut xc = x.clone();
    for (j, mut col) in xc.column_iter_mut().enumerate() {
        col.add_scalar_mut(-x_mean[j]);
    }
    let yc = y.add_scalar(-y_mean);

    let l1 = params.alpha * params.l1_ratio * n as f64;
    let l2 = params.alpha * (1.0 - params.l1_ratio) * n as f64;
    let norms: Vec<f64> = xc.column_iter().map(|c| c.norm_squared()).collect();

    let mut w = DVector::<f64>::zeros(p);
    let mut residual = yc.clone();
    let mut iterations = 0;
    let mut converged = p == 0;

    while !converged && iterations < params.max_iter {
        iterations += 1;
        let mut max_w = 0.0_f64;
        let mut max_delta = 0.0_f64;

        for j in 0..p {
            if norms[j] == 0.0 {
                continue;
            }
            let old = w[j];
            let rho = xc.column(j).dot(&residual) + norms[j] * old;
            let new = soft_threshold(rho, l1) / (norms[j] + l2);
            let delta = new - old;
            if delta != 0.0 {
                residual.axpy(-delta, &xc.column(j), 1.0);
                w[j] = new;
            }
            max_delta = max_delta.max(delta.abs());
            max_w = max_w.max(new.abs());
        }

        if max_w == 0.0 || max_delta / max_w < params.tol {
            converged = true;
        }
    }

    if w.iter().any(|v| !v.is_finite()) {
        return Err(AppError::compute("Elastic net produced non-finite coefficients."));
    }

    let intercept = y_mean - x_mean.iter().zip(w.iter()).map(|(m, c)| m * c).sum::<f64>();
    Ok(ElasticNetFit {
        coef: w.iter().copied().collect(),
        intercept,
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (DMatrix<f64>, DVector<f64>) {
        // y = 3 + 2x
        let x = DMatrix::from_row_slice(5, 1, &[-2.0, -1.0, 0.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[-1.0, 1.0, 3.0, 5.0, 7.0]);
        (x, y)
    }

    #[test]
    fn zero_penalty_recovers_ols() {
        let (x, y) = line();
        let params = ElasticNetParams {
            alpha: 0.0,
            ..ElasticNetParams::default()
        };
        let fit = fit_elastic_net(&x, &y, &params).unwrap();
        assert!((fit.coef[0] - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!(fit.converged);
    }

    #[test]
    fn default_penalty_matches_closed_form_for_one_feature() {
        // Σx² = 10, Σxy = 20, n = 5 → w = (20 - 2.5) / (10 + 2.5) = 1.4
        let (x, y) = line();
        let fit = fit_elastic_net(&x, &y, &ElasticNetParams::default()).unwrap();
        assert!((fit.coef[0] - 1.4).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!((fit.predict_row(&[1.0]) - 4.4).abs() < 1e-9);
    }

    #[test]
    fn large_alpha_zeroes_everything_and_predicts_the_mean() {
        let (x, y) = line();
        let params = ElasticNetParams {
            alpha: 100.0,
            ..ElasticNetParams::default()
        };
        let fit = fit_elastic_net(&x, &y, &params).unwrap();
        assert_eq!(fit.coef, vec![0.0]);
        assert_eq!(fit.intercept, 3.0);
    }

    #[test]
    fn constant_columns_are_ignored() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 7.0, 2.0, 7.0, 3.0, 7.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let fit = fit_elastic_net(&x, &y, &ElasticNetParams::default()).unwrap();
        assert_eq!(fit.coef[1], 0.0);
        assert!(fit.coef.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn mismatched_target_is_an_error() {
        let (x, _) = line();
        let y = DVector::from_row_slice(&[1.0]);
        assert!(fit_elastic_net(&x, &y, &ElasticNetParams::default()).is_err());
    }
}
