//! Read/write the trained model blob.
//!
//! The blob is the JSON serialization of `TrainedModel`. Writes go to a
//! sibling temp file that is then renamed over the target, so readers never
//! observe a half-written model.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{AppError, EXIT_INPUT};
use crate::models::TrainedModel;

/// Write (replace) the model blob at `path`.
pub fn write_model(path: &Path, model: &TrainedModel) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new(EXIT_INPUT, format!("Failed to create model directory '{}': {e}", dir.display()))
        })?;
    }

    let tmp = path.with_extension("json.tmp");
    if let Err(err) = write_blob(&tmp, model) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::new(EXIT_INPUT, format!("Failed to replace model file '{}': {e}", path.display()))
    })?;

    info!(path = %path.display(), "model written");
    Ok(())
}

/// Serialize into `tmp` and sync it to disk; every write error surfaces here.
fn write_blob(tmp: &Path, model: &TrainedModel) -> Result<(), AppError> {
    let failed = |e: &dyn std::fmt::Display| {
        AppError::new(EXIT_INPUT, format!("Failed to write model file '{}': {e}", tmp.display()))
    };

    let file = File::create(tmp).map_err(|e| failed(&e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, model).map_err(|e| failed(&e))?;
    writer.flush().map_err(|e| failed(&e))?;
    let file = writer.into_inner().map_err(|e| failed(&e.into_error()))?;
    file.sync_all().map_err(|e| failed(&e))
}

/// Read the model blob at `path`.
pub fn read_model(path: &Path) -> Result<TrainedModel, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to open model '{}': {e} (run `cstats train` first)", path.display()),
        )
    })?;
    let model: TrainedModel = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid model JSON '{}': {e}", path.display())))?;

    if model.regressors.len() != model.label_names.len() {
        return Err(AppError::input(format!(
            "Model '{}' has {} regressors for {} labels.",
            path.display(),
            model.regressors.len(),
            model.label_names.len()
        )));
    }
    Ok(model)
}
