//! The fitted multi-output model: encode → scale → one elastic net per label.

use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{FeatureRow, LabelRow};
use crate::error::AppError;
use crate::frame::{FeatureMatrix, Partition};
use crate::models::{ElasticNetFit, ElasticNetParams, OneHotEncoder, StandardScaler, encode_design, fit_elastic_net};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub encoder: OneHotEncoder,
    pub scaler: StandardScaler,
    /// Numeric feature names, `year` first.
    pub feature_names: Vec<String>,
    pub label_names: Vec<String>,
    pub params: ElasticNetParams,
    /// One fit per label, same order as `label_names`.
    pub regressors: Vec<ElasticNetFit>,
    pub train_rows: usize,
    pub trained_at: DateTime<Utc>,
}

/// Test-partition quality for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub rmse: f64,
    /// `None` when the observed values are constant.
    pub r2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rows: usize,
    pub scores: Vec<LabelScore>,
}

impl TrainedModel {
    pub fn fit(train: &Partition, label_names: &[String], params: ElasticNetParams) -> Result<Self, AppError> {
        if train.is_empty() {
            return Err(AppError::no_data("Training partition is empty."));
        }
        if train.labels.ncols() != label_names.len() {
            return Err(AppError::compute(format!(
                "Training labels have {} columns, expected {}.",
                train.labels.ncols(),
                label_names.len()
            )));
        }

        let encoder = OneHotEncoder::fit(&train.features.countries);
        let scaler = StandardScaler::fit(&train.features.values);
        let design = encode_design(&encoder, &scaler, &train.features.countries, &train.features.values);

        let mut regressors = Vec::with_capacity(label_names.len());
        for (idx, label) in label_names.iter().enumerate() {
            let y: DVector<f64> = train.labels.column(idx).into_owned();
            let fit = fit_elastic_net(&design, &y, &params)?;
            if !fit.converged {
                warn!(label = %label, iterations = fit.iterations, "elastic net hit max_iter before converging");
            }
            debug!(
                label = %label,
                iterations = fit.iterations,
                nonzero = fit.coef.iter().filter(|c| **c != 0.0).count(),
                "fitted label"
            );
            regressors.push(fit);
        }

        Ok(Self {
            encoder,
            scaler,
            feature_names: train.features.names.clone(),
            label_names: label_names.to_vec(),
            params,
            regressors,
            train_rows: train.len(),
            trained_at: Utc::now(),
        })
    }

    /// Predict every label for one request.
    ///
    /// Every numeric feature other than `year` must be supplied. Countries not
    /// seen in training are accepted and encode as all zeros.
    pub fn predict(&self, request: &FeatureRow) -> Result<LabelRow, AppError> {
        if let Some(extra) = request.values.keys().find(|k| !self.feature_names.contains(k)) {
            return Err(AppError::input(format!(
                "Unknown feature `{extra}`; the model expects: {}",
                self.feature_names[1..].join(", ")
            )));
        }

        let mut numeric = Vec::with_capacity(self.feature_names.len());
        for name in &self.feature_names {
            let value = if name == "year" {
                request.year as f64
            } else {
                *request.values.get(name).ok_or_else(|| {
                    AppError::input(format!(
                        "Missing feature `{name}` for {} {}.",
                        request.country, request.year
                    ))
                })?
            };
            if !value.is_finite() {
                return Err(AppError::input(format!("Feature `{name}` is not a finite number.")));
            }
            numeric.push(value);
        }

        if !self.encoder.is_known(&request.country) {
            debug!(country = %request.country, "country not seen in training; encoding as zeros");
        }

        let numeric = DMatrix::from_row_slice(1, numeric.len(), &numeric);
        let predictions = self.predict_rows(std::slice::from_ref(&request.country), &numeric);

        Ok(LabelRow {
            values: self
                .label_names
                .iter()
                .cloned()
                .zip(predictions.row(0).iter().copied())
                .collect(),
        })
    }

    /// Batch prediction: one row per input row, one column per label.
    pub fn predict_many(&self, features: &FeatureMatrix) -> Result<DMatrix<f64>, AppError> {
        if features.names != self.feature_names {
            return Err(AppError::compute(format!(
                "Feature columns differ from the trained model ({} vs {}).",
                features.names.join(", "),
                self.feature_names.join(", ")
            )));
        }
        Ok(self.predict_rows(&features.countries, &features.values))
    }

    /// Per-label RMSE and R² against `test`.
    pub fn evaluate(&self, test: &Partition) -> Result<Evaluation, AppError> {
        if test.is_empty() {
            return Err(AppError::no_data("Test partition is empty."));
        }
        let predicted = self.predict_many(&test.features)?;
        let n = test.len() as f64;

        let scores = self
            .label_names
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                let actual = test.labels.column(idx);
                let sse: f64 = actual
                    .iter()
                    .zip(predicted.column(idx).iter())
                    .map(|(a, p)| (a - p).powi(2))
                    .sum();
                let mean = actual.mean();
                let sst: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
                LabelScore {
                    label: label.clone(),
                    rmse: (sse / n).sqrt(),
                    r2: (sst > 0.0).then(|| 1.0 - sse / sst),
                }
            })
            .collect();

        Ok(Evaluation {
            rows: test.len(),
            scores,
        })
    }

    fn predict_rows(&self, countries: &[String], numeric: &DMatrix<f64>) -> DMatrix<f64> {
        let design = encode_design(&self.encoder, &self.scaler, countries, numeric);
        DMatrix::from_fn(design.nrows(), self.regressors.len(), |r, l| {
            let row: Vec<f64> = design.row(r).iter().copied().collect();
            self.regressors[l].predict_row(&row)
        })
    }
}
