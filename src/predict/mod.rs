//! Fault prediction for new records.
//!
//! [`Predictor::predict_single`] screens a record against extreme limits,
//! discretizes it with the bins stored in the artifact and runs exact
//! inference on the network. It always returns a label and a full
//! distribution; inference failures resolve through the extreme rule table.
//!
//! [`Predictor::predict_batch`] scores a labeled batch with the naive
//! conditional-probability scorer of [`naive`].

pub mod extreme;
pub mod naive;

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

pub use extreme::{rule_table, Breach, ExtremeThresholds, FeatureLimits, Side};
pub use naive::{BatchPrediction, BatchRow, NaiveScorer};

use crate::config::PredictionConfig;
use crate::data::{Dataset, SensorRecord};
use crate::error::{FaultsenseError, Result};
use crate::persist::ModelArtifact;
use crate::schema::FaultType;

/// Default probability below which a prediction is flagged.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Which path produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// Extreme readings mapped straight to a fault; no inference ran.
    ExtremeOverride,
    /// Posterior of the Bayesian network.
    Network,
    /// Inference failed and the extreme rule table decided.
    FallbackRules,
}

impl fmt::Display for PredictionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PredictionSource::ExtremeOverride => "extreme-value override",
            PredictionSource::Network => "bayesian network",
            PredictionSource::FallbackRules => "rule-table fallback",
        })
    }
}

/// Outcome of a single-record prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: FaultType,
    /// Every fault type with its probability, most probable first.
    pub probabilities: Vec<(FaultType, f64)>,
    pub source: PredictionSource,
    pub breaches: Vec<Breach>,
    pub low_confidence: bool,
}

impl PredictionResult {
    fn certain(label: FaultType, source: PredictionSource, breaches: Vec<Breach>) -> Self {
        let probabilities = FaultType::ALL
            .into_iter()
            .map(|f| (f, if f == label { 1.0 } else { 0.0 }))
            .collect();
        Self {
            label,
            probabilities: sorted_descending(probabilities),
            source,
            breaches,
            low_confidence: false,
        }
    }

    /// Probability of the predicted label.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .iter()
            .find(|(f, _)| *f == self.label)
            .map_or(0.0, |(_, p)| *p)
    }

    #[must_use]
    pub fn probability(&self, fault: FaultType) -> f64 {
        self.probabilities
            .iter()
            .find(|(f, _)| *f == fault)
            .map_or(0.0, |(_, p)| *p)
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.label, self.source)?;
        for (fault, p) in &self.probabilities {
            writeln!(f, "  {:<14}{:>8.2}%", fault.alias(), p * 100.0)?;
        }
        for breach in &self.breaches {
            writeln!(f, "  {breach}")?;
        }
        if self.low_confidence {
            write!(f, "warning: low confidence ({:.2})", self.confidence())?;
        }
        Ok(())
    }
}

/// True when the largest probability is below `threshold`.
#[must_use]
pub fn is_low_confidence(probabilities: &[(FaultType, f64)], threshold: f64) -> bool {
    let max = probabilities
        .iter()
        .map(|(_, p)| *p)
        .fold(f64::NEG_INFINITY, f64::max);
    max < threshold
}

fn sorted_descending(mut probabilities: Vec<(FaultType, f64)>) -> Vec<(FaultType, f64)> {
    // stable: equal probabilities keep fault-type order
    probabilities.sort_by(|a, b| b.1.total_cmp(&a.1));
    probabilities
}

/// Predictor over a loaded model artifact.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: ModelArtifact,
    thresholds: ExtremeThresholds,
    low_confidence_threshold: f64,
}

impl Predictor {
    /// Predictor with default extreme limits and confidence threshold.
    #[must_use]
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact,
            thresholds: ExtremeThresholds::default(),
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the configured limits or threshold are invalid.
    pub fn with_config(artifact: ModelArtifact, config: &PredictionConfig) -> Result<Self> {
        config.extreme.validate()?;
        Self::new(artifact)
            .with_low_confidence_threshold(config.low_confidence_threshold)
            .map(|p| p.with_thresholds(config.extreme))
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: ExtremeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// # Errors
    ///
    /// Returns an error unless `threshold` is in `[0, 1]`.
    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FaultsenseError::invalid_parameter(
                "low_confidence_threshold",
                threshold,
                "in [0, 1]",
            ));
        }
        self.low_confidence_threshold = threshold;
        Ok(self)
    }

    #[must_use]
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    #[must_use]
    pub fn thresholds(&self) -> &ExtremeThresholds {
        &self.thresholds
    }

    /// Predict the fault of one record. Never fails.
    #[must_use]
    pub fn predict_single(&self, record: &SensorRecord) -> PredictionResult {
        let breaches = self.thresholds.breaches(&record.readings);
        let screened = rule_table(&breaches);
        if screened.is_fault() {
            debug!(label = %screened, breaches = breaches.len(), "extreme override");
            return PredictionResult::certain(screened, PredictionSource::ExtremeOverride, breaches);
        }

        match self.network_posterior(record) {
            Ok(posterior) => {
                let label = crate::bayes::argmax(&posterior).unwrap_or(FaultType::Normal);
                let probabilities = sorted_descending(
                    FaultType::ALL
                        .into_iter()
                        .map(|f| {
                            let p = posterior
                                .iter()
                                .find(|(g, _)| *g == f)
                                .map_or(0.0, |(_, p)| *p);
                            (f, p)
                        })
                        .collect(),
                );
                let low_confidence =
                    is_low_confidence(&probabilities, self.low_confidence_threshold);
                PredictionResult {
                    label,
                    probabilities,
                    source: PredictionSource::Network,
                    breaches,
                    low_confidence,
                }
            }
            Err(err) => {
                warn!(error = %err, label = %screened, "inference failed; using rule table");
                PredictionResult::certain(screened, PredictionSource::FallbackRules, breaches)
            }
        }
    }

    fn network_posterior(&self, record: &SensorRecord) -> Result<Vec<(FaultType, f64)>> {
        let bins = self.artifact.bins().ok_or_else(|| {
            FaultsenseError::inference("legacy model has no bin configuration")
        })?;
        let row = bins.discretize_record(record);
        let model = self.artifact.model();
        model.posterior(&model.evidence_for(&row))
    }

    /// Score a labeled batch with the naive scorer, re-binned on the batch.
    ///
    /// # Errors
    ///
    /// See [`naive::predict_batch`].
    pub fn predict_batch(&self, dataset: &Dataset) -> Result<BatchPrediction> {
        let num_bins = self.artifact.bins().map_or(5, |b| b.num_bins());
        naive::predict_batch(dataset, num_bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayes::ParameterEstimator;
    use crate::data::Readings;
    use crate::discretize::{BinConfig, Strategy};
    use crate::fixtures;
    use crate::network::NetworkStructure;
    use crate::persist::ArtifactMetadata;
    use crate::schema::{Feature, NodeId};

    fn artifact() -> ModelArtifact {
        let dataset = fixtures::plant(600, 11);
        let bins = BinConfig::fit(&dataset, 5, Strategy::StdBased).unwrap();
        let rows = bins.discretize(&dataset);
        let structure = NetworkStructure::from_parents([
            NodeId::Feature(Feature::Temp),
            NodeId::Feature(Feature::Vibration),
            NodeId::Feature(Feature::Voltage),
        ])
        .unwrap();
        let model = ParameterEstimator::default().fit(&structure, &rows).unwrap();
        ModelArtifact::new(model, bins, ArtifactMetadata::default())
    }

    fn typical() -> Readings {
        Readings {
            temp: 60.0,
            vibration: 2.0,
            oil_pressure: 10.0,
            voltage: 220.0,
            rpm: 2000.0,
        }
    }

    #[test]
    fn test_extreme_temperature_overrides_network() {
        let predictor = Predictor::new(artifact());
        let mut readings = typical();
        readings.temp = 299.0;
        let result = predictor.predict_single(&SensorRecord::unlabeled("A", readings));
        assert_eq!(result.label, FaultType::Cooling);
        assert_eq!(result.source, PredictionSource::ExtremeOverride);
        assert_eq!(result.confidence(), 1.0);
        assert_eq!(result.probabilities[0], (FaultType::Cooling, 1.0));
        assert_eq!(result.probabilities.len(), 5);
    }

    #[test]
    fn test_typical_record_uses_network() {
        let predictor = Predictor::new(artifact());
        let result = predictor.predict_single(&SensorRecord::unlabeled("A", typical()));
        assert_eq!(result.source, PredictionSource::Network);
        assert_eq!(result.probabilities.len(), 5);
        let total: f64 = result.probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(result
            .probabilities
            .windows(2)
            .all(|w| w[0].1 >= w[1].1));
        assert_eq!(result.label, result.probabilities[0].0);
    }

    #[test]
    fn test_breach_without_fault_falls_through() {
        let predictor = Predictor::new(artifact());
        let mut readings = typical();
        readings.temp = 0.0;
        let result = predictor.predict_single(&SensorRecord::unlabeled("A", readings));
        assert_eq!(result.breaches.len(), 1);
        assert_ne!(result.source, PredictionSource::ExtremeOverride);
        assert_eq!(result.probabilities.len(), 5);
    }

    #[test]
    fn test_legacy_model_falls_back_to_rules() {
        let full = artifact();
        let legacy = ModelArtifact::legacy(full.model().clone(), ArtifactMetadata::default());
        let result = Predictor::new(legacy).predict_single(&SensorRecord::unlabeled("A", typical()));
        assert_eq!(result.source, PredictionSource::FallbackRules);
        assert_eq!(result.label, FaultType::Normal);
        assert_eq!(result.confidence(), 1.0);
    }

    #[test]
    fn test_low_confidence_flag() {
        let probabilities = vec![
            (FaultType::Normal, 0.55),
            (FaultType::Cooling, 0.30),
            (FaultType::Electrical, 0.15),
        ];
        assert!(is_low_confidence(&probabilities, LOW_CONFIDENCE_THRESHOLD));
        assert!(!is_low_confidence(&probabilities, 0.5));
    }

    #[test]
    fn test_threshold_is_validated() {
        assert!(Predictor::new(artifact())
            .with_low_confidence_threshold(1.5)
            .is_err());
    }
}
