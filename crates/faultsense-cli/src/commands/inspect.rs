//! Inspect command: what a saved model contains.

use std::path::Path;

use faultsense::persist::ModelArtifact;
use faultsense::schema::NodeId;

use super::validate_path;
use crate::error::Result;
use crate::output;

pub(crate) fn run(model: &Path, show_bins: bool, json: bool) -> Result<()> {
    validate_path(model)?;
    let artifact = ModelArtifact::load(model)?;
    let summary = artifact.summary();

    if json {
        return output::json(&summary);
    }
    output::section("Model");
    output::kv("File", model.display());
    output::kv("Estimator", &summary.estimator);
    if !summary.metadata.created_by.is_empty() {
        output::kv("Created by", &summary.metadata.created_by);
    }
    output::kv("Training rows", summary.metadata.training_rows);
    output::kv("Rules", summary.metadata.rule_count);
    if let Some(accuracy) = summary.metadata.validation_accuracy {
        output::kv("Validation accuracy", format!("{accuracy:.4}"));
    }
    match (summary.strategy, summary.num_bins) {
        (Some(strategy), Some(n)) => output::kv("Bins", format!("{strategy}, {n} per feature")),
        _ => output::warning("legacy model: no bin configuration"),
    }

    output::section("Nodes");
    for node in &summary.nodes {
        output::kv(&node.name, format!("{} states", node.states));
    }
    output::section("Edges");
    for edge in &summary.edges {
        println!("  {edge}");
    }

    if show_bins {
        if let Some(bins) = artifact.bins() {
            output::section("Bin boundaries");
            for (feature, fb) in bins.iter() {
                let states = artifact
                    .model()
                    .states(NodeId::Feature(feature))
                    .map_or(0, <[String]>::len);
                let bounds: Vec<String> = fb.bins().iter().map(|b| format!("{b:.3}")).collect();
                println!("  {feature} ({states} states in model)");
                println!("    [{}]", bounds.join(", "));
                println!("    {}", fb.labels().join(" | "));
            }
        }
    }
    Ok(())
}
