//! Predict command: classify one record given on the command line.

use std::path::Path;

use faultsense::config::Config;
use faultsense::data::{Readings, SensorRecord};
use faultsense::persist::ModelArtifact;
use faultsense::predict::{ExtremeThresholds, PredictionResult, Predictor};

use super::validate_path;
use crate::error::{CliError, Result};
use crate::output;

/// One record's inputs.
#[derive(Debug, Clone)]
pub(crate) struct RecordArgs {
    pub(crate) department: String,
    pub(crate) readings: Readings,
}

pub(crate) fn run(
    model: &Path,
    record: RecordArgs,
    config: &Config,
    extreme_margin: Option<f64>,
    json: bool,
) -> Result<()> {
    validate_path(model)?;
    let artifact = ModelArtifact::load(model)?;
    if artifact.is_legacy() && !json {
        output::warning("model has no bin configuration; prediction uses the rule table only");
    }

    let mut predictor = Predictor::with_config(artifact, &config.prediction)?;
    if let Some(margin) = extreme_margin {
        let bins = predictor.artifact().bins().ok_or_else(|| {
            CliError::InvalidArgument("--extreme-margin needs a model with bins".into())
        })?;
        let thresholds = ExtremeThresholds::beyond_bins(bins, margin)?;
        predictor = predictor.with_thresholds(thresholds);
    }

    let result = predictor.predict_single(&SensorRecord::unlabeled(record.department, record.readings));
    if json {
        output::json(&result)
    } else {
        print_result(&result);
        Ok(())
    }
}

fn print_result(result: &PredictionResult) {
    output::section("Prediction");
    output::kv("Label", result.label);
    output::kv("Source", output::source(result.source));
    println!();
    for (fault, p) in &result.probabilities {
        println!("  {:<14}{} {:>6.2}%", fault.alias(), output::bar(*p, 30), p * 100.0);
    }
    for breach in &result.breaches {
        output::warning(&breach.to_string());
    }
    if result.low_confidence {
        output::warning(&format!(
            "low confidence: top probability {:.2}",
            result.confidence()
        ));
    }
}
