//! End-to-end runs.
//!
//! An analysis run turns a dataset into a rules file: discretize (searching
//! strategies or using a fixed one), build transactions, mine fault rules.
//! A training run turns a dataset and a rules file into a model artifact:
//! discretize, build the network structure from the rules, estimate CPTs,
//! validate, save.
//!
//! Both runs report progress through a [`Reporter`] at fixed milestones and
//! honor its cancellation token between stages.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bayes::ParameterEstimator;
use crate::config::Config;
use crate::data::{Dataset, LoadReport};
use crate::discretize::{BinConfig, Strategy};
use crate::error::{FaultsenseError, Result};
use crate::metrics::{ClassificationReport, EvaluationScope};
use crate::mining::{build_transactions, mine, MiningOutcome, MiningStatus, RuleSet};
use crate::network::build_structure;
use crate::optimize::{optimize, StrategyTrial};
use crate::persist::{ArtifactMetadata, ModelArtifact};
use crate::predict::{rule_table, ExtremeThresholds};
use crate::progress::Reporter;

/// Rows the fitted network is validated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Seeded split; the held-out share is never fitted on.
    Holdout,
    /// The fitting rows themselves.
    InSample,
}

/// Result of an analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub load: LoadReport,
    pub strategy: Strategy,
    /// Strategy trials, empty when a fixed strategy was used.
    pub trials: Vec<StrategyTrial>,
    #[serde(skip)]
    pub bins: BinConfig,
    pub outcome: MiningOutcome,
    /// Where the rules were written, if any were found.
    pub rules_path: Option<PathBuf>,
}

impl AnalysisReport {
    #[must_use]
    pub fn found_rules(&self) -> bool {
        self.outcome.status == MiningStatus::Found
    }
}

/// Analyze an in-memory dataset. Progress runs from 10 to 100.
///
/// A run that finds no fault rules is not an error: the outcome status
/// carries the reason and nothing is written.
///
/// # Errors
///
/// Returns an error for invalid settings, when no strategy is viable during
/// a search, on cancellation, or if the rules file cannot be written.
pub fn analyze(
    dataset: &Dataset,
    config: &Config,
    rules_out: Option<&Path>,
    reporter: &Reporter<'_>,
) -> Result<AnalysisReport> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(FaultsenseError::empty_input("dataset has no records"));
    }
    let num_bins = config.discretization.num_bins;

    let (bins, trials) = if config.discretization.auto_optimize {
        let search = optimize(dataset, num_bins, &config.mining, reporter)?;
        let trials = search.trials.clone();
        (search.into_best_bins(), trials)
    } else {
        reporter.progress(10, "discretizing");
        let bins = BinConfig::fit(dataset, num_bins, config.discretization.strategy)?;
        (bins, Vec::new())
    };
    reporter.checkpoint()?;
    let strategy = bins.strategy();

    let rows = bins.discretize(dataset);
    reporter.progress(70, format!("data discretized ({strategy})"));
    let transactions = build_transactions(&rows);
    reporter.progress(75, format!("{} transactions built", transactions.len()));
    reporter.checkpoint()?;

    let outcome = mine(&transactions, &config.mining)?;
    reporter.progress(90, "rules mined");
    reporter.log(format!(
        "{} frequent itemsets, {} association rules, {} fault rules",
        outcome.frequent_itemsets,
        outcome.association_rules,
        outcome.rules.len()
    ));

    let mut rules_path = None;
    if outcome.status == MiningStatus::Found {
        if let Some(path) = rules_out {
            RuleSet::new(outcome.rules.clone()).write_csv(path)?;
            reporter.log(format!("rules written to {}", path.display()));
            rules_path = Some(path.to_path_buf());
        }
        reporter.progress(98, "rules saved");
    } else {
        warn!(status = ?outcome.status, "analysis found no fault rules");
        reporter.log(outcome.status.message());
    }
    reporter.progress(100, "analysis finished");

    Ok(AnalysisReport {
        load: dataset.report().clone(),
        strategy,
        trials,
        bins,
        outcome,
        rules_path,
    })
}

/// Load `data_path` and analyze it. Progress runs from 0 to 100.
///
/// # Errors
///
/// Input errors from loading, and everything [`analyze`] returns.
pub fn analyze_file(
    data_path: &Path,
    config: &Config,
    rules_out: Option<&Path>,
    reporter: &Reporter<'_>,
) -> Result<AnalysisReport> {
    reporter.progress(0, "loading data");
    let dataset = Dataset::load(data_path)?;
    reporter.log(format!(
        "{} rows loaded, {} duplicates removed",
        dataset.len(),
        dataset.report().duplicates_removed
    ));
    reporter.progress(10, "data loaded");
    analyze(&dataset, config, rules_out, reporter)
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub artifact: ModelArtifact,
    pub validation: ClassificationReport,
    pub training_rows: usize,
    /// Validation rows whose evidence the network could not explain; they
    /// were scored with the extreme rule table.
    pub inference_fallbacks: usize,
}

/// Row indices `(fit, validate)` for a seeded holdout split. Falls back to
/// no split when either side would be empty.
fn holdout_split(n: usize, fraction: f64, seed: u64) -> Option<(Vec<usize>, Vec<usize>)> {
    let n_validate = (n as f64 * fraction).round() as usize;
    if n_validate == 0 || n_validate >= n {
        return None;
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let validate = indices.split_off(n - n_validate);
    Some((indices, validate))
}

/// Train on an in-memory dataset and rule set. Progress runs from 25 to 90.
///
/// # Errors
///
/// Returns an error if the rules yield no network edge, the data lacks a
/// node the structure needs, settings are invalid, or the run is cancelled.
pub fn train(
    dataset: &Dataset,
    rules: &RuleSet,
    config: &Config,
    reporter: &Reporter<'_>,
) -> Result<TrainingReport> {
    config.validate()?;
    let training = &config.training;
    if dataset.is_empty() {
        return Err(FaultsenseError::empty_input("dataset has no records"));
    }

    let bins = BinConfig::fit(dataset, config.discretization.num_bins, training.bins)?;
    let rows = bins.discretize(dataset);
    reporter.progress(25, format!("data discretized ({})", training.bins));
    reporter.checkpoint()?;

    reporter.progress(40, format!("{} rules loaded", rules.len()));
    let structure = build_structure(rules.rules(), &bins.label_map()?)?;
    reporter.log(format!("network structure: {} edges", structure.edge_count()));
    for (from, to) in structure.edges() {
        reporter.log(format!("  {from} → {to}"));
    }
    reporter.progress(50, "network structure built");
    reporter.checkpoint()?;

    let split = match training.validation {
        ValidationMode::Holdout => {
            let split = holdout_split(rows.len(), training.validation_fraction, training.seed);
            if split.is_none() {
                warn!(rows = rows.len(), "too few rows to hold out; validating in-sample");
            }
            split
        }
        ValidationMode::InSample => None,
    };
    let (fit_idx, validate_idx, scope) = match split {
        Some((fit, validate)) => (fit, validate, EvaluationScope::Holdout),
        None => {
            let all: Vec<usize> = (0..rows.len()).collect();
            (all.clone(), all, EvaluationScope::InSample)
        }
    };
    let fit_rows: Vec<_> = fit_idx.iter().map(|&i| rows[i].clone()).collect();
    reporter.progress(60, "network instantiated");

    let estimator = ParameterEstimator::new(training.estimator, training.equivalent_sample_size);
    let model = estimator.fit(&structure, &fit_rows)?;
    reporter.progress(80, format!("parameters estimated ({})", training.estimator.name()));
    reporter.checkpoint()?;

    let thresholds = ExtremeThresholds::default();
    let mut pairs = Vec::with_capacity(validate_idx.len());
    let mut inference_fallbacks = 0;
    for &i in &validate_idx {
        let Some(actual) = rows[i].fault else { continue };
        let predicted = match model.map_predict(&rows[i]) {
            Ok(label) => label,
            Err(_) => {
                inference_fallbacks += 1;
                rule_table(&thresholds.breaches(&dataset.records()[i].readings))
            }
        };
        pairs.push((actual, predicted));
    }
    let validation = ClassificationReport::from_pairs(scope, &pairs);
    if inference_fallbacks > 0 {
        warn!(rows = inference_fallbacks, "validation rows fell back to the rule table");
    }
    reporter.log(format!(
        "{} accuracy {:.4} on {} rows",
        scope, validation.accuracy, validation.samples
    ));
    reporter.progress(90, "model validated");

    let metadata = ArtifactMetadata {
        created_by: format!("faultsense {}", env!("CARGO_PKG_VERSION")),
        training_rows: fit_rows.len(),
        rule_count: rules.len(),
        validation_accuracy: Some(validation.accuracy),
    };
    info!(
        nodes = model.nodes().len(),
        rows = fit_rows.len(),
        accuracy = validation.accuracy,
        "network trained"
    );
    Ok(TrainingReport {
        artifact: ModelArtifact::new(model, bins, metadata),
        validation,
        training_rows: fit_rows.len(),
        inference_fallbacks,
    })
}

/// Load data and rules, train, and save the artifact to `model_out`.
/// Progress runs from 0 to 100.
///
/// # Errors
///
/// Input errors from loading, everything [`train`] returns, and write
/// errors from saving.
pub fn train_files(
    data_path: &Path,
    rules_path: &Path,
    model_out: &Path,
    config: &Config,
    reporter: &Reporter<'_>,
) -> Result<TrainingReport> {
    reporter.progress(0, "loading data");
    let dataset = Dataset::load(data_path)?;
    reporter.progress(10, format!("{} rows loaded", dataset.len()));
    let rules = RuleSet::read_csv(rules_path)?;
    if rules.is_empty() {
        return Err(FaultsenseError::empty_input("rules file has no rules"));
    }
    reporter.checkpoint()?;

    let report = train(&dataset, &rules, config, reporter)?;
    report.artifact.save(model_out)?;
    reporter.log(format!("model saved to {}", model_out.display()));
    reporter.progress(100, "training finished");
    Ok(report)
}
