//! Shared pipeline logic behind the `cstats` commands.
//!
//! Source load -> harmonize -> frame -> split/impute -> fit -> evaluate
//!
//! Every call reloads from disk; nothing is cached between calls.

use tracing::{info, warn};

use crate::data::synthetic::generate_table;
use crate::domain::{DropReport, FeatureRow, HarmonizedTable, LabelRow, PipelineConfig, SourceTable};
use crate::error::AppError;
use crate::frame::{frame, split};
use crate::harmonize::harmonize;
use crate::io::{read_model, write_model};
use crate::models::{ElasticNetParams, Evaluation, TrainedModel};
use crate::sources::load_all;

/// The harmonized table plus each source's drop report.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: HarmonizedTable,
    pub reports: Vec<DropReport>,
}

/// Outputs of one training run.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub model: TrainedModel,
    pub cutoff_year: i32,
    pub test_rows: usize,
    /// `None` when no rows fall at or after the cutoff.
    pub evaluation: Option<Evaluation>,
    pub reports: Vec<DropReport>,
}

/// Synthetic train/predict round trip.
#[derive(Debug, Clone)]
pub struct DemoRun {
    pub table: HarmonizedTable,
    pub training: TrainingRun,
    pub request: FeatureRow,
    pub prediction: LabelRow,
}

/// Load every source and harmonize them onto the OECD base.
pub fn load_harmonized_table(config: &PipelineConfig) -> Result<LoadedTable, AppError> {
    let sources = load_all(&config.data_dir)?;
    let others: Vec<&SourceTable> = sources.health.iter().map(|s| &s.table).collect();
    let table = harmonize(&sources.budgets.table, &others)?;

    if table.rows.is_empty() {
        return Err(AppError::no_data(format!(
            "Harmonized table is empty (data dir '{}').",
            config.data_dir.display()
        )));
    }
    info!(
        rows = table.rows.len(),
        countries = table.countries().len(),
        columns = table.columns.len(),
        "harmonized table built"
    );

    Ok(LoadedTable {
        reports: sources.reports().into_iter().cloned().collect(),
        table,
    })
}

/// Build, fit, evaluate, and write the model to `config.model_path`.
pub fn train_model(config: &PipelineConfig) -> Result<TrainingRun, AppError> {
    let loaded = load_harmonized_table(config)?;
    let mut run = train_on_table(&loaded.table, config.cutoff_year)?;
    run.reports = loaded.reports;
    write_model(&config.model_path, &run.model)?;
    Ok(run)
}

/// Frame, split, fit, and evaluate on an in-memory table.
pub fn train_on_table(table: &HarmonizedTable, cutoff_year: i32) -> Result<TrainingRun, AppError> {
    let framed = frame(table)?;
    let data = split(&framed, cutoff_year)?;
    let model = TrainedModel::fit(&data.train, &data.label_names, ElasticNetParams::default())?;

    let evaluation = if data.test.is_empty() {
        warn!(cutoff_year, "no rows at or after the cutoff; skipping evaluation");
        None
    } else {
        Some(model.evaluate(&data.test)?)
    };

    Ok(TrainingRun {
        model,
        cutoff_year,
        test_rows: data.test.len(),
        evaluation,
        reports: Vec::new(),
    })
}

/// Read the model written by the last `train`.
pub fn load_trained_model(config: &PipelineConfig) -> Result<TrainedModel, AppError> {
    read_model(&config.model_path)
}

/// Request for `(country, year)` filled from the harmonized table.
///
/// The country name is taken from the table, so lookups are case-insensitive.
/// Cells that are still missing after harmonization are left out of the
/// request; `predict` names them if nothing overrides them.
pub fn feature_row_from_table(
    table: &HarmonizedTable,
    model: &TrainedModel,
    country: &str,
    year: i32,
) -> Result<FeatureRow, AppError> {
    let row = table
        .row(country, year)
        .ok_or_else(|| AppError::input(format!("No harmonized row for {country} {year}.")))?;

    let mut request = FeatureRow::new(row.country.clone(), year);
    for name in model.feature_names.iter().filter(|n| n.as_str() != "year") {
        if let Some(value) = table.column_index(name).and_then(|idx| row.values[idx]) {
            request.values.insert(name.clone(), value);
        }
    }
    Ok(request)
}

/// Train on a seeded synthetic table, then predict its last test-year row.
pub fn run_demo(seed: u64, countries: usize, cutoff_year: i32) -> Result<DemoRun, AppError> {
    let table = generate_table(seed, countries, (cutoff_year - 8)..=(cutoff_year + 2))?;
    let training = train_on_table(&table, cutoff_year)?;

    let last = table
        .rows
        .iter()
        .rfind(|r| r.year >= cutoff_year)
        .ok_or_else(|| AppError::no_data("Synthetic table has no test rows."))?;
    let request = feature_row_from_table(&table, &training.model, &last.country, last.year)?;
    let prediction = training.model.predict(&request)?;

    Ok(DemoRun {
        table,
        training,
        request,
        prediction,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::LABELS;
    use crate::error::{EXIT_INPUT, EXIT_NO_DATA};

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.join("data"),
            model_path: dir.join("model").join("model.json"),
            cutoff_year: 2017,
        }
    }

    #[test]
    fn missing_source_files_fail_the_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_harmonized_table(&config(dir.path())).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.message().contains("NAAG_13102019054548637.csv"));
    }

    #[test]
    fn training_on_synthetic_table_evaluates_every_label() {
        let table = generate_table(9, 5, 2010..=2019).unwrap();
        let run = train_on_table(&table, 2017).unwrap();

        assert_eq!(run.test_rows, 15);
        assert_eq!(run.model.train_rows, 35);
        let eval = run.evaluation.unwrap();
        assert_eq!(eval.scores.len(), LABELS.len());
    }

    #[test]
    fn cutoff_past_the_data_skips_evaluation() {
        let table = generate_table(9, 3, 2010..=2014).unwrap();
        let run = train_on_table(&table, 2017).unwrap();
        assert_eq!(run.test_rows, 0);
        assert!(run.evaluation.is_none());
    }

    #[test]
    fn cutoff_before_the_data_is_a_no_data_error() {
        let table = generate_table(9, 3, 2018..=2019).unwrap();
        let err = train_on_table(&table, 2017).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_NO_DATA);
    }

    #[test]
    fn model_written_by_training_can_be_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let run = train_on_table(&generate_table(2, 4, 2012..=2018).unwrap(), 2017).unwrap();
        write_model(&config.model_path, &run.model).unwrap();

        let loaded = load_trained_model(&config).unwrap();
        assert_eq!(loaded.label_names, run.model.label_names);
    }

    #[test]
    fn missing_model_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            model_path: PathBuf::from(dir.path()).join("absent.json"),
            ..config(dir.path())
        };
        assert_eq!(load_trained_model(&config).unwrap_err().exit_code(), EXIT_INPUT);
    }

    #[test]
    fn table_requests_use_canonical_country_names() {
        let table = generate_table(4, 3, 2015..=2018).unwrap();
        let run = train_on_table(&table, 2017).unwrap();

        let request = feature_row_from_table(&table, &run.model, "chile", 2018).unwrap();
        assert_eq!(request.country, "Chile");
        assert_eq!(request.values.len(), run.model.feature_names.len() - 1);

        let err = feature_row_from_table(&table, &run.model, "Atlantis", 2018).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
    }

    #[test]
    fn demo_round_trip_yields_six_finite_rates() {
        let demo = run_demo(42, 6, 2017).unwrap();
        assert_eq!(demo.prediction.values.len(), 6);
        assert!(demo.prediction.values.iter().all(|(_, v)| v.is_finite()));
        assert!(demo.request.year >= 2017);
        assert!(demo.prediction.get("safely_managed_water_use_rate").is_some());
    }
}
