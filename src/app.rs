//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves the run configuration (flags, then environment, then defaults)
//! - dispatches to the shared pipeline and prints reports

use std::path::PathBuf;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, DemoArgs, ExportArgs, PredictArgs, TrainArgs};
use crate::domain::{DEFAULT_CUTOFF_YEAR, FeatureRow, PipelineConfig};
use crate::error::AppError;
use crate::report;

pub mod pipeline;

pub const DATA_DIR_ENV: &str = "COUNTRY_STATS_DATA_DIR";
pub const MODEL_PATH_ENV: &str = "COUNTRY_STATS_MODEL_PATH";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_MODEL_PATH: &str = "model/country_stats_model.json";

/// Entry point for the `cstats` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // A missing .env is normal.
    dotenvy::dotenv().ok();
    let config = resolve_config(cli.data_dir.clone(), cli.model.clone(), |key| {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    });
    debug!(?config, "resolved configuration");

    match cli.command {
        Command::Build => handle_build(&config),
        Command::Export(args) => handle_export(&config, &args),
        Command::Train(args) => handle_train(config, &args),
        Command::Predict(args) => handle_predict(&config, args),
        Command::Demo(args) => handle_demo(&args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Flag, else environment, else default. `cutoff_year` starts at the default;
/// `train` overrides it.
pub fn resolve_config(
    data_dir: Option<PathBuf>,
    model: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> PipelineConfig {
    PipelineConfig {
        data_dir: data_dir
            .or_else(|| env(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        model_path: model
            .or_else(|| env(MODEL_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
        cutoff_year: DEFAULT_CUTOFF_YEAR,
    }
}

fn handle_build(config: &PipelineConfig) -> Result<(), AppError> {
    let loaded = pipeline::load_harmonized_table(config)?;
    println!("{}", report::format_table_summary(&loaded.table));
    println!("{}", report::format_drop_reports(&loaded.reports));
    Ok(())
}

fn handle_export(config: &PipelineConfig, args: &ExportArgs) -> Result<(), AppError> {
    let loaded = pipeline::load_harmonized_table(config)?;
    let written = crate::io::write_table_csv(&args.out, &loaded.table, args.year)?;
    if let (0, Some(year)) = (written, args.year) {
        return Err(AppError::no_data(format!("No harmonized rows for year {year}.")));
    }
    println!("Wrote {written} rows to {}", args.out.display());
    Ok(())
}

fn handle_train(mut config: PipelineConfig, args: &TrainArgs) -> Result<(), AppError> {
    config.cutoff_year = args.cutoff;
    let run = pipeline::train_model(&config)?;

    println!("{}", report::format_drop_reports(&run.reports));
    println!(
        "{}",
        report::format_training_summary(
            &run.model,
            run.cutoff_year,
            run.evaluation.as_ref(),
            Some(config.model_path.as_path())
        )
    );
    Ok(())
}

fn handle_predict(config: &PipelineConfig, args: PredictArgs) -> Result<(), AppError> {
    let model = pipeline::load_trained_model(config)?;

    let mut request = if args.from_table {
        let loaded = pipeline::load_harmonized_table(config)?;
        pipeline::feature_row_from_table(&loaded.table, &model, &args.country, args.year)?
    } else {
        FeatureRow::new(args.country.clone(), args.year)
    };
    request.values.extend(args.features);

    let labels = model.predict(&request)?;
    println!(
        "{}",
        report::format_prediction(
            &request.country,
            request.year,
            model.encoder.is_known(&request.country),
            &labels
        )
    );
    Ok(())
}

fn handle_demo(args: &DemoArgs) -> Result<(), AppError> {
    let demo = pipeline::run_demo(args.seed, args.countries, args.cutoff)?;

    println!("{}", report::format_table_summary(&demo.table));
    println!(
        "{}",
        report::format_training_summary(
            &demo.training.model,
            demo.training.cutoff_year,
            demo.training.evaluation.as_ref(),
            None
        )
    );
    println!(
        "{}",
        report::format_prediction(&demo.request.country, demo.request.year, true, &demo.prediction)
    );
    Ok(())
}
