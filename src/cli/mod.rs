//! Command-line parsing for `cstats`.
//!
//! Parsing stays here; `app` turns the parsed arguments into a
//! `PipelineConfig` and dispatches.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::DEFAULT_CUTOFF_YEAR;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "cstats",
    version,
    about = "Harmonize public country statistics and forecast health/welfare rates"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory containing the `country_stats/` source tree [env: COUNTRY_STATS_DATA_DIR].
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Trained model file [env: COUNTRY_STATS_MODEL_PATH].
    #[arg(long, value_name = "FILE", global = true)]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and harmonize every source; print the table summary and drop reports.
    Build,
    /// Write the harmonized table to CSV.
    Export(ExportArgs),
    /// Train the model on the harmonized table, evaluate it, and save it.
    Train(TrainArgs),
    /// Predict the six rates for one country-year with the saved model.
    Predict(PredictArgs),
    /// Train and predict on a synthetic table (no input files needed).
    Demo(DemoArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    /// Output CSV path.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Only export rows for this year.
    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// First year of the test partition.
    #[arg(long, default_value_t = DEFAULT_CUTOFF_YEAR)]
    pub cutoff: i32,
}

#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    #[arg(long)]
    pub country: String,

    #[arg(long)]
    pub year: i32,

    /// Feature value as `name=value`; repeatable.
    #[arg(long = "feature", value_name = "NAME=VALUE", value_parser = parse_feature)]
    pub features: Vec<(String, f64)>,

    /// Start from the harmonized row for this country-year; `--feature` values override it.
    #[arg(long)]
    pub from_table: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of synthetic countries.
    #[arg(long, default_value_t = 8)]
    pub countries: usize,

    #[arg(long, default_value_t = DEFAULT_CUTOFF_YEAR)]
    pub cutoff: i32,
}

fn parse_feature(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{raw}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("feature `{name}` value '{}' is not a number", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("feature `{name}` value must be finite"));
    }
    Ok((name.to_string(), value))
}
