//! Run configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! ```
//! use faultsense::config::Config;
//!
//! let config = Config::from_toml_str("[mining]\nmin_support = 0.01\n").unwrap();
//! assert_eq!(config.mining.min_support, 0.01);
//! assert_eq!(config.discretization.num_bins, 5);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bayes::Estimator;
use crate::discretize::Strategy;
use crate::error::{FaultsenseError, Result};
use crate::mining::MiningThresholds;
use crate::pipeline::ValidationMode;
use crate::predict::ExtremeThresholds;

/// Discretization settings for analysis runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizationConfig {
    pub num_bins: usize,
    /// Strategy used when `auto_optimize` is off.
    pub strategy: Strategy,
    /// Try every strategy and keep the best one.
    pub auto_optimize: bool,
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            num_bins: 5,
            strategy: Strategy::StdBased,
            auto_optimize: true,
        }
    }
}

/// Network training settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub estimator: Estimator,
    /// BDeu equivalent sample size.
    pub equivalent_sample_size: f64,
    pub validation: ValidationMode,
    /// Share of rows held out when `validation = "holdout"`.
    pub validation_fraction: f64,
    pub seed: u64,
    /// Strategy used to re-discretize the training data.
    pub bins: Strategy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            estimator: Estimator::BDeu,
            equivalent_sample_size: 10.0,
            validation: ValidationMode::Holdout,
            validation_fraction: 0.2,
            seed: 42,
            bins: Strategy::StdBased,
        }
    }
}

/// Single-record prediction settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Predictions whose top probability is below this are flagged.
    pub low_confidence_threshold: f64,
    pub extreme: ExtremeThresholds,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.6,
            extreme: ExtremeThresholds::default(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mining: MiningThresholds,
    pub discretization: DiscretizationConfig,
    pub training: TrainingConfig,
    pub prediction: PredictionConfig,
}

impl Config {
    /// Read and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// holds an out-of-range value.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// # Errors
    ///
    /// See [`Config::from_file`].
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| FaultsenseError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FaultsenseError::Serialization(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns the first out-of-range value found.
    pub fn validate(&self) -> Result<()> {
        self.mining.validate()?;
        if self.discretization.num_bins < 2 {
            return Err(FaultsenseError::invalid_parameter(
                "discretization.num_bins",
                self.discretization.num_bins,
                ">= 2",
            ));
        }
        if !(self.training.equivalent_sample_size > 0.0) {
            return Err(FaultsenseError::invalid_parameter(
                "training.equivalent_sample_size",
                self.training.equivalent_sample_size,
                "> 0",
            ));
        }
        let fraction = self.training.validation_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(FaultsenseError::invalid_parameter(
                "training.validation_fraction",
                fraction,
                "a value in (0, 1)",
            ));
        }
        let threshold = self.prediction.low_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FaultsenseError::invalid_parameter(
                "prediction.low_confidence_threshold",
                threshold,
                "a value in [0, 1]",
            ));
        }
        self.prediction.extreme.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Feature;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.training.validation, ValidationMode::Holdout);
        assert_eq!(config.training.estimator, Estimator::BDeu);
        assert_eq!(config.prediction.low_confidence_threshold, 0.6);
    }

    #[test]
    fn test_partial_sections() {
        let text = r#"
            [discretization]
            strategy = "kmeans"
            auto_optimize = false

            [training]
            estimator = "mle"
            validation = "in_sample"

            [prediction.extreme.temp]
            high = 120.0
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.discretization.strategy, Strategy::KMeans);
        assert!(!config.discretization.auto_optimize);
        assert_eq!(config.discretization.num_bins, 5);
        assert_eq!(config.training.estimator, Estimator::Mle);
        assert_eq!(config.training.validation, ValidationMode::InSample);
        let temp = config.prediction.extreme.limits(Feature::Temp);
        assert_eq!(temp.high, Some(120.0));
        assert_eq!(temp.low, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_toml_str("[mining]\nmin_support = 0.0\n").is_err());
        assert!(Config::from_toml_str("[discretization]\nnum_bins = 1\n").is_err());
        assert!(Config::from_toml_str("[training]\nvalidation_fraction = 1.0\n").is_err());
        assert!(Config::from_toml_str("[discretization]\nstrategy = \"fibonacci\"\n").is_err());
    }

    #[test]
    fn test_toml_round_trip_and_file() {
        let mut config = Config::default();
        config.mining.min_lift = 1.2;
        config.training.seed = 7;
        let text = config.to_toml_string().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faultsense.toml");
        std::fs::write(&path, text).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }
}
