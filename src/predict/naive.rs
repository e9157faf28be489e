//! Naive conditional-probability scorer for batch evaluation.
//!
//! The batch is re-binned with standard-deviation bins computed on the batch
//! itself, and the scorer is fitted on the same rows: a prior per label
//! times `P(state | label)` per column, Laplace-smoothed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::data::Dataset;
use crate::discretize::{BinConfig, DiscreteRow, Strategy};
use crate::error::{FaultsenseError, Result};
use crate::metrics::{ClassificationReport, EvaluationScope};
use crate::schema::{FaultType, Feature, NodeId};

/// Probability used for a state never seen with a label.
pub const UNKNOWN_STATE_PROBABILITY: f64 = 0.01;

fn columns() -> impl Iterator<Item = NodeId> {
    std::iter::once(NodeId::Department).chain(Feature::ALL.into_iter().map(NodeId::Feature))
}

/// Fitted prior and conditional tables.
#[derive(Debug, Clone)]
pub struct NaiveScorer {
    priors: BTreeMap<FaultType, f64>,
    conditionals: BTreeMap<(NodeId, String, FaultType), f64>,
}

impl NaiveScorer {
    /// Fit on labeled rows; unlabeled rows are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if no row is labeled.
    pub fn fit(rows: &[DiscreteRow]) -> Result<Self> {
        let labeled: Vec<(&DiscreteRow, FaultType)> =
            rows.iter().filter_map(|r| r.fault.map(|f| (r, f))).collect();
        if labeled.is_empty() {
            return Err(FaultsenseError::empty_input("no labeled rows to score"));
        }

        let mut label_totals: BTreeMap<FaultType, usize> = BTreeMap::new();
        for (_, fault) in &labeled {
            *label_totals.entry(*fault).or_insert(0) += 1;
        }
        let n = labeled.len() as f64;
        let priors = label_totals
            .iter()
            .map(|(fault, count)| (*fault, *count as f64 / n))
            .collect();

        let mut conditionals = BTreeMap::new();
        for column in columns() {
            let mut joint: BTreeMap<(String, FaultType), usize> = BTreeMap::new();
            let mut states: BTreeSet<String> = BTreeSet::new();
            for (row, fault) in &labeled {
                if let Some(state) = row.state(column) {
                    *joint.entry((state.clone(), *fault)).or_insert(0) += 1;
                    states.insert(state);
                }
            }
            for state in &states {
                for (fault, total) in &label_totals {
                    let matching = joint.get(&(state.clone(), *fault)).copied().unwrap_or(0);
                    let p = (matching + 1) as f64 / (total + states.len()) as f64;
                    conditionals.insert((column, state.clone(), *fault), p);
                }
            }
        }
        Ok(Self {
            priors,
            conditionals,
        })
    }

    /// Normalized scores per label, in label order.
    #[must_use]
    pub fn scores(&self, row: &DiscreteRow) -> Vec<(FaultType, f64)> {
        let raw: Vec<(FaultType, f64)> = self
            .priors
            .iter()
            .map(|(fault, prior)| {
                let likelihood: f64 = columns()
                    .filter_map(|column| row.state(column).map(|s| (column, s)))
                    .map(|(column, state)| {
                        self.conditionals
                            .get(&(column, state, *fault))
                            .copied()
                            .unwrap_or(UNKNOWN_STATE_PROBABILITY)
                    })
                    .product();
                (*fault, prior * likelihood)
            })
            .collect();
        let total: f64 = raw.iter().map(|(_, s)| s).sum();
        if total > 0.0 {
            raw.into_iter().map(|(f, s)| (f, s / total)).collect()
        } else {
            raw
        }
    }

    /// Highest-scoring label; ties go to the earlier label.
    #[must_use]
    pub fn predict(&self, row: &DiscreteRow) -> Option<FaultType> {
        crate::bayes::argmax(&self.scores(row))
    }
}

/// One scored batch row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub device_id: Option<String>,
    pub actual: Option<FaultType>,
    pub predicted: FaultType,
}

/// Batch predictions plus their report over the labeled rows.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPrediction {
    pub rows: Vec<BatchRow>,
    pub report: ClassificationReport,
}

/// Re-bin `dataset` with std-based bins of its own, fit the naive scorer on
/// it and score every row.
///
/// # Errors
///
/// Returns an error if the batch cannot be binned or has no labeled row.
pub fn predict_batch(dataset: &Dataset, num_bins: usize) -> Result<BatchPrediction> {
    let bins = BinConfig::fit(dataset, num_bins, Strategy::StdBased)?;
    let discrete = bins.discretize(dataset);
    let scorer = NaiveScorer::fit(&discrete)?;

    let mut rows = Vec::with_capacity(discrete.len());
    let mut pairs = Vec::new();
    for (record, row) in dataset.records().iter().zip(&discrete) {
        let predicted = scorer.predict(row).unwrap_or(FaultType::Normal);
        if let Some(actual) = record.fault {
            pairs.push((actual, predicted));
        }
        rows.push(BatchRow {
            device_id: record.device_id.clone(),
            actual: record.fault,
            predicted,
        });
    }
    let report = ClassificationReport::from_pairs(EvaluationScope::Batch, &pairs);
    debug!(rows = rows.len(), accuracy = report.accuracy, "batch scored");
    Ok(BatchPrediction { rows, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn row(dept: &str, temp: &str, fault: Option<FaultType>) -> DiscreteRow {
        DiscreteRow {
            department: dept.to_string(),
            levels: BTreeMap::from([(Feature::Temp, temp.to_string())]),
            fault,
        }
    }

    #[test]
    fn test_laplace_tables() {
        let rows = vec![
            row("A", "高温", Some(FaultType::Cooling)),
            row("A", "中温", Some(FaultType::Normal)),
            row("A", "中温", Some(FaultType::Normal)),
            row("B", "中温", Some(FaultType::Normal)),
        ];
        let scorer = NaiveScorer::fit(&rows).unwrap();
        assert_eq!(scorer.priors[&FaultType::Normal], 0.75);
        let key = (NodeId::Feature(Feature::Temp), "高温".to_string(), FaultType::Cooling);
        // (1 + 1) / (1 + 2 states)
        assert!((scorer.conditionals[&key] - 2.0 / 3.0).abs() < 1e-12);
        let key = (NodeId::Department, "部门_B".to_string(), FaultType::Cooling);
        assert!((scorer.conditionals[&key] - 1.0 / 3.0).abs() < 1e-12);

        assert_eq!(scorer.predict(&row("A", "高温", None)), Some(FaultType::Cooling));
        let scores = scorer.scores(&row("A", "中温", None));
        assert!((scores.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_state_uses_default() {
        let rows = vec![
            row("A", "高温", Some(FaultType::Cooling)),
            row("A", "中温", Some(FaultType::Normal)),
        ];
        let scorer = NaiveScorer::fit(&rows).unwrap();
        // unseen department scores 0.01 for every label, leaving temp to decide
        assert_eq!(scorer.predict(&row("Z", "高温", None)), Some(FaultType::Cooling));
    }

    #[test]
    fn test_unlabeled_batch_is_rejected() {
        assert!(NaiveScorer::fit(&[row("A", "高温", None)]).is_err());
    }

    #[test]
    fn test_predict_batch_on_fixture() {
        let batch = predict_batch(&fixtures::plant(500, 9), 5).unwrap();
        assert_eq!(batch.rows.len(), 500);
        assert_eq!(batch.report.samples, 500);
        assert_eq!(batch.report.scope, EvaluationScope::Batch);
        assert!(batch.report.accuracy > 0.8, "accuracy {}", batch.report.accuracy);
    }
}
