//! Evaluate command: batch-score a labeled CSV with the naive scorer.

use std::path::Path;

use faultsense::data::Dataset;
use faultsense::persist::ModelArtifact;
use faultsense::predict::Predictor;

use super::validate_path;
use crate::error::Result;
use crate::output;

pub(crate) fn run(model: &Path, data: &Path, show_rows: bool, json: bool) -> Result<()> {
    validate_path(model)?;
    validate_path(data)?;
    let predictor = Predictor::new(ModelArtifact::load(model)?);
    let dataset = Dataset::load(data)?;
    let batch = predictor.predict_batch(&dataset)?;

    if json {
        return output::json(&batch);
    }
    if show_rows {
        output::section("Predictions");
        for row in &batch.rows {
            let actual = row.actual.map_or("-", |f| f.alias());
            let marker = if row.actual == Some(row.predicted) { " " } else { "✗" };
            println!(
                "{marker} {:<12}{:<14}{}",
                row.device_id.as_deref().unwrap_or("-"),
                actual,
                row.predicted.alias()
            );
        }
    }
    output::section("Batch evaluation");
    print!("{}", batch.report);
    Ok(())
}
