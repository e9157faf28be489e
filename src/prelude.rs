//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use faultsense::prelude::*;
//! ```

pub use crate::bayes::{BayesianModel, Estimator, ParameterEstimator};
pub use crate::config::Config;
pub use crate::data::{Dataset, Readings, SensorRecord};
pub use crate::discretize::{BinConfig, Strategy};
pub use crate::error::{FaultsenseError, Result};
pub use crate::metrics::ClassificationReport;
pub use crate::mining::{FaultRule, MiningThresholds, RuleSet};
pub use crate::persist::ModelArtifact;
pub use crate::pipeline::{analyze, analyze_file, train, train_files};
pub use crate::predict::{PredictionResult, PredictionSource, Predictor};
pub use crate::progress::{CancellationToken, ChannelSink, PipelineEvent, Reporter};
pub use crate::schema::{FaultType, Feature};
