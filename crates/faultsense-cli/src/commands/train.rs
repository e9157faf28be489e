//! Train command: network structure from rules, CPTs from data, saved model.

use std::path::Path;

use faultsense::bayes::Estimator;
use faultsense::config::Config;
use faultsense::pipeline::{train_files, TrainingReport, ValidationMode};
use serde::Serialize;

use super::{run_with_progress, validate_path};
use crate::error::Result;
use crate::output;

#[derive(Serialize)]
struct TrainResult<'a> {
    model: String,
    training_rows: usize,
    inference_fallbacks: usize,
    summary: faultsense::persist::ArtifactSummary,
    validation: &'a faultsense::metrics::ClassificationReport,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn run(
    data: &Path,
    rules: &Path,
    model_out: &Path,
    mut config: Config,
    estimator: Option<&str>,
    in_sample: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    validate_path(data)?;
    validate_path(rules)?;
    if let Some(name) = estimator {
        config.training.estimator = name.parse::<Estimator>()?;
    }
    if in_sample {
        config.training.validation = ValidationMode::InSample;
    }

    let (data_path, rules_path, model_path) =
        (data.to_path_buf(), rules.to_path_buf(), model_out.to_path_buf());
    let report = run_with_progress("training", quiet || json, move |reporter| {
        train_files(&data_path, &rules_path, &model_path, &config, reporter)
    })?;

    if json {
        output::json(&TrainResult {
            model: model_out.display().to_string(),
            training_rows: report.training_rows,
            inference_fallbacks: report.inference_fallbacks,
            summary: report.artifact.summary(),
            validation: &report.validation,
        })
    } else {
        if !quiet {
            print_report(&report);
        }
        output::success(&format!("model saved to {}", model_out.display()));
        Ok(())
    }
}

fn print_report(report: &TrainingReport) {
    let summary = report.artifact.summary();
    output::section("Network");
    output::kv("Estimator", &summary.estimator);
    output::kv("Training rows", report.training_rows);
    for edge in &summary.edges {
        println!("  {edge}");
    }

    output::section(&format!("Validation ({})", report.validation.scope));
    print!("{}", report.validation);
    if report.inference_fallbacks > 0 {
        output::warning(&format!(
            "{} validation rows could not be explained by the network",
            report.inference_fallbacks
        ));
    }
}
