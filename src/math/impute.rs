//! Multivariate iterative imputation.
//!
//! Each column with at least two observed values is modeled as a ridge
//! regression on all other columns, round-robin, starting from a column-mean
//! fill:
//!
//! 1. fill every gap with its column mean
//! 2. for each round, for each modeled column `j`: regress `j` on the rest
//!    using the rows where `j` was observed, then overwrite the gaps in `j`
//!    with the regression's predictions
//! 3. stop after `MAX_ROUNDS` or once the largest update is small relative to
//!    the observed scale
//!
//! Every regression is kept as an `ImputationStep` so `transform` can replay
//! the same sequence on unseen rows. Fitting on training rows and replaying on
//! test rows keeps test labels out of the fit. Columns complete in the fit
//! rows are modeled too, since unseen rows may have gaps there.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::math::solve_ridge;

const MAX_ROUNDS: usize = 10;
const TOLERANCE: f64 = 1e-3;
const RIDGE_LAMBDA: f64 = 1e-3;

/// One fitted column regression, on standardized predictors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ImputationStep {
    target: usize,
    predictors: Vec<usize>,
    center: Vec<f64>,
    scale: Vec<f64>,
    coef: Vec<f64>,
    intercept: f64,
}

impl ImputationStep {
    fn predict(&self, data: &DMatrix<f64>, row: usize) -> f64 {
        self.predictors
            .iter()
            .enumerate()
            .map(|(k, &col)| self.coef[k] * (data[(row, col)] - self.center[k]) / self.scale[k])
            .sum::<f64>()
            + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterativeImputer {
    width: usize,
    /// Initial fill; `0.0` for columns never observed during fit.
    means: Vec<f64>,
    steps: Vec<ImputationStep>,
    rounds: usize,
}

impl IterativeImputer {
    /// Fit on `rows` (each of length `width`).
    pub fn fit(rows: &[Vec<Option<f64>>], width: usize) -> Result<Self, AppError> {
        if rows.is_empty() {
            return Err(AppError::no_data("Cannot fit imputer on zero rows."));
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(AppError::compute("Imputer input rows have inconsistent widths."));
        }

        let means: Vec<f64> = (0..width)
            .map(|col| {
                let observed: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
                if observed.is_empty() {
                    0.0
                } else {
                    observed.iter().sum::<f64>() / observed.len() as f64
                }
            })
            .collect();

        let mut imputer = Self {
            width,
            means,
            steps: Vec::new(),
            rounds: 0,
        };

        let mut data = imputer.initial_fill(rows);
        let targets: Vec<usize> = (0..width)
            .filter(|&col| rows.iter().filter(|r| r[col].is_some()).count() >= 2)
            .collect();
        if targets.is_empty() {
            return Ok(imputer);
        }

        let observed_scale = rows
            .iter()
            .flatten()
            .flatten()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
            .max(1.0);

        for round in 0..MAX_ROUNDS {
            let mut max_change = 0.0_f64;
            for &target in &targets {
                let Some(step) = fit_step(&data, rows, target) else {
                    debug!(target, round, "imputation regression unsolvable; keeping previous fill");
                    continue;
                };
                for (r, row) in rows.iter().enumerate() {
                    if row[target].is_none() {
                        let updated = step.predict(&data, r);
                        max_change = max_change.max((updated - data[(r, target)]).abs());
                        data[(r, target)] = updated;
                    }
                }
                imputer.steps.push(step);
            }
            imputer.rounds = round + 1;
            if max_change < TOLERANCE * observed_scale {
                break;
            }
        }

        debug!(rounds = imputer.rounds, steps = imputer.steps.len(), "iterative imputer fitted");
        Ok(imputer)
    }

    /// Fill the gaps in `rows` by replaying the fitted regressions.
    ///
    /// Observed values pass through unchanged.
    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Result<DMatrix<f64>, AppError> {
        if rows.iter().any(|r| r.len() != self.width) {
            return Err(AppError::compute("Imputer input rows have inconsistent widths."));
        }
        let mut data = self.initial_fill(rows);
        for step in &self.steps {
            for (r, row) in rows.iter().enumerate() {
                if row[step.target].is_none() {
                    data[(r, step.target)] = step.predict(&data, r);
                }
            }
        }
        Ok(data)
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    fn initial_fill(&self, rows: &[Vec<Option<f64>>]) -> DMatrix<f64> {
        DMatrix::from_fn(rows.len(), self.width, |r, c| rows[r][c].unwrap_or(self.means[c]))
    }
}

fn fit_step(data: &DMatrix<f64>, rows: &[Vec<Option<f64>>], target: usize) -> Option<ImputationStep> {
    let observed: Vec<usize> = (0..rows.len()).filter(|&r| rows[r][target].is_some()).collect();
    let predictors: Vec<usize> = (0..data.ncols()).filter(|&c| c != target).collect();
    let n = observed.len() as f64;

    let mut center = Vec::with_capacity(predictors.len());
    let mut scale = Vec::with_capacity(predictors.len());
    for &col in &predictors {
        let mean = observed.iter().map(|&r| data[(r, col)]).sum::<f64>() / n;
        let var = observed.iter().map(|&r| (data[(r, col)] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        center.push(mean);
        scale.push(if std > 1e-12 { std } else { 1.0 });
    }

    let x = DMatrix::from_fn(observed.len(), predictors.len(), |i, k| {
        (data[(observed[i], predictors[k])] - center[k]) / scale[k]
    });
    let y_mean = observed.iter().map(|&r| data[(r, target)]).sum::<f64>() / n;
    let y = DVector::from_fn(observed.len(), |i, _| data[(observed[i], target)] - y_mean);

    let coef = solve_ridge(&x, &y, RIDGE_LAMBDA)?;

    Some(ImputationStep {
        target,
        predictors,
        center,
        scale,
        coef: coef.iter().copied().collect(),
        intercept: y_mean,
    })
}
