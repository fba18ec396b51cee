//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline code returns plain values and the
//! text layout changes in one place.

use std::path::Path;

use crate::domain::{DropReport, HarmonizedTable, LabelRow};
use crate::models::{Evaluation, TrainedModel};

/// How many individual drops to list per source before summarizing.
const DROP_EXAMPLES: usize = 3;

/// Table shape plus per-column completeness.
pub fn format_table_summary(table: &HarmonizedTable) -> String {
    let mut out = String::new();

    out.push_str("=== cstats - harmonized country table ===\n");
    let countries = table.countries();
    let years = table.rows.iter().map(|r| r.year);
    match (years.clone().min(), years.max()) {
        (Some(lo), Some(hi)) => out.push_str(&format!(
            "Rows: {} | countries: {} | years: {lo}-{hi}\n",
            table.rows.len(),
            countries.len()
        )),
        _ => out.push_str("Rows: 0\n"),
    }

    out.push_str("\nColumns (missing cells after fill):\n");
    let width = table.columns.iter().map(|c| c.len()).max().unwrap_or(0);
    for (name, missing) in table.columns.iter().zip(table.missing_counts()) {
        out.push_str(&format!("  {name:<width$} {missing:>6}\n"));
    }

    out
}

/// Per-source row accounting.
pub fn format_drop_reports(reports: &[DropReport]) -> String {
    let mut out = String::new();
    out.push_str("Sources:\n");
    out.push_str(&format!(
        "  {:<24} {:>8} {:>8} {:>8}\n",
        "source", "read", "used", "dropped"
    ));
    out.push_str(&format!("  {:-<24} {:-<8} {:-<8} {:-<8}\n", "", "", "", ""));

    for report in reports {
        out.push_str(&format!(
            "  {:<24} {:>8} {:>8} {:>8}\n",
            report.source.display_name(),
            report.rows_read,
            report.rows_used,
            report.drops.len()
        ));
        for (kind, count) in report.counts() {
            out.push_str(&format!("    {count} x {kind}\n"));
        }
        for drop in report.drops.iter().take(DROP_EXAMPLES) {
            let at = match &drop.key {
                Some(key) => key.to_string(),
                None => format!("line {}", drop.row),
            };
            out.push_str(&format!("      e.g. {at}: {}\n", drop.reason));
        }
    }

    out
}

/// Training outcome: data sizes, evaluation, and where the model went.
pub fn format_training_summary(
    model: &TrainedModel,
    cutoff: i32,
    evaluation: Option<&Evaluation>,
    model_path: Option<&Path>,
) -> String {
    let mut out = String::new();

    out.push_str("=== cstats - model training ===\n");
    out.push_str(&format!(
        "Train rows: {} (years < {cutoff}) | countries: {} | features: {}\n",
        model.train_rows,
        model.encoder.width(),
        model.feature_names.len()
    ));
    out.push_str(&format!(
        "ElasticNet: alpha={} l1_ratio={} max_iter={} tol={}\n",
        model.params.alpha, model.params.l1_ratio, model.params.max_iter, model.params.tol
    ));
    out.push_str(&format!("Trained at: {}\n", model.trained_at.to_rfc3339()));

    match evaluation {
        Some(eval) => {
            out.push_str(&format!("\nTest evaluation (n={}):\n", eval.rows));
            out.push_str(&format!("  {:<32} {:>10} {:>8}\n", "label", "RMSE", "R2"));
            out.push_str(&format!("  {:-<32} {:-<10} {:-<8}\n", "", "", ""));
            for score in &eval.scores {
                let r2 = score.r2.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".to_string());
                out.push_str(&format!("  {:<32} {:>10.3} {:>8}\n", score.label, score.rmse, r2));
            }
        }
        None => out.push_str("\nTest evaluation: skipped (no rows at or after the cutoff)\n"),
    }

    if let Some(path) = model_path {
        out.push_str(&format!("\nModel written to {}\n", path.display()));
    }

    out
}

/// One prediction, one label per line.
pub fn format_prediction(country: &str, year: i32, known_country: bool, labels: &LabelRow) -> String {
    let mut out = String::new();
    out.push_str(&format!("Prediction for {country} {year}"));
    if !known_country {
        out.push_str(" (country not in training data)");
    }
    out.push('\n');

    let width = labels.values.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, value) in &labels.values {
        out.push_str(&format!("  {name:<width$} {value:>10.3}\n"));
    }
    out
}
