//! Faultsense: equipment fault prediction from sensor readings.
//!
//! Continuous sensor readings are discretized into ordinal categories,
//! association rules linking categories to fault types are mined with
//! Apriori, and those rules define the structure of a Bayesian network
//! whose conditional probability tables are estimated from the data. New
//! records are classified by exact inference on that network, behind an
//! extreme-value screen for readings far outside anything seen in training.
//!
//! # Quick Start
//!
//! ```no_run
//! use faultsense::prelude::*;
//!
//! let config = Config::default();
//! let reporter = Reporter::silent();
//!
//! // Mine fault rules, then train a network from them
//! let analysis = analyze_file("plant.csv".as_ref(), &config, Some("rules.csv".as_ref()), &reporter)?;
//! println!("{} fault rules", analysis.outcome.rules.len());
//! let training = train_files(
//!     "plant.csv".as_ref(),
//!     "rules.csv".as_ref(),
//!     "model.fsbn".as_ref(),
//!     &config,
//!     &reporter,
//! )?;
//! println!("{}", training.validation);
//!
//! // Predict one record
//! let predictor = Predictor::new(ModelArtifact::load("model.fsbn")?);
//! let readings = Readings { temp: 61.0, vibration: 2.1, oil_pressure: 9.8, voltage: 221.0, rpm: 1980.0 };
//! let result = predictor.predict_single(&SensorRecord::unlabeled("生产部", readings));
//! println!("{result}");
//! # Ok::<(), faultsense::FaultsenseError>(())
//! ```
//!
//! # Modules
//!
//! - [`schema`]: Sensor features, fault types and the label→node table
//! - [`data`]: CSV loading with encoding detection, fault history queries
//! - [`discretize`]: Six binning strategies and the stored bin configuration
//! - [`mining`]: Transactions, Apriori and fault rules
//! - [`optimize`]: Discretization strategy search
//! - [`network`]: Network structure from fault rules
//! - [`bayes`]: CPT estimation and variable elimination
//! - [`metrics`]: Accuracy, per-class scores, confusion matrix
//! - [`persist`]: Model artifact file format
//! - [`predict`]: Single-record and batch prediction
//! - [`pipeline`]: End-to-end analysis and training runs
//! - [`tasks`]: Single-active background task queue

pub mod bayes;
pub mod config;
pub mod data;
pub mod discretize;
pub mod error;
pub mod metrics;
pub mod mining;
pub mod network;
pub mod optimize;
pub mod persist;
pub mod pipeline;
pub mod predict;
pub mod prelude;
pub mod progress;
pub mod schema;
pub mod stats;
pub mod tasks;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{FaultsenseError, Result};
