//! Cutoff-year split and label imputation.

use nalgebra::DMatrix;
use tracing::info;

use crate::error::AppError;
use crate::frame::{FeatureMatrix, FramedData};
use crate::math::IterativeImputer;

/// One side of the split with fully imputed labels.
#[derive(Debug, Clone)]
pub struct Partition {
    pub features: FeatureMatrix,
    pub labels: DMatrix<f64>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct SplitData {
    pub label_names: Vec<String>,
    pub train: Partition,
    pub test: Partition,
    pub imputer: IterativeImputer,
}

/// Rows with `year >= cutoff` go to the test partition.
///
/// The imputer sees training labels only; test labels are filled by replaying
/// the training fit.
pub fn split(framed: &FramedData, cutoff: i32) -> Result<SplitData, AppError> {
    let years = framed.features.years();
    let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
        (0..years.len()).partition(|&i| years[i] >= cutoff);

    if train_idx.is_empty() {
        return Err(AppError::no_data(format!(
            "No training rows before cutoff year {cutoff} ({} rows total).",
            years.len()
        )));
    }

    let width = framed.label_names.len();
    let pick = |idx: &[usize]| -> Vec<Vec<Option<f64>>> {
        idx.iter().map(|&i| framed.labels[i].clone()).collect()
    };
    let train_labels = pick(&train_idx);
    let test_labels = pick(&test_idx);

    let imputer = IterativeImputer::fit(&train_labels, width)?;
    let train = Partition {
        features: framed.features.select_rows(&train_idx),
        labels: imputer.transform(&train_labels)?,
    };
    let test = Partition {
        features: framed.features.select_rows(&test_idx),
        labels: imputer.transform(&test_labels)?,
    };

    info!(
        cutoff,
        train = train.len(),
        test = test.len(),
        imputer_rounds = imputer.rounds(),
        "split training data"
    );

    Ok(SplitData {
        label_names: framed.label_names.clone(),
        train,
        test,
        imputer,
    })
}
