//! Error types for faultsense operations.
//!
//! The variants follow the failure classes of the pipeline: input errors
//! halt before mining, parameter errors are reported immediately, degenerate
//! results are fatal only where a stage cannot continue, and inference errors
//! are recovered inside the single-record predictor.

use std::fmt;

/// Main error type for faultsense operations.
///
/// # Examples
///
/// ```
/// use faultsense::error::FaultsenseError;
///
/// let err = FaultsenseError::InvalidParameter {
///     param: "strategy".to_string(),
///     value: "fibonacci".to_string(),
///     constraint: "one of equal_width, equal_freq, kmeans, quantile, std_based, decision_tree"
///         .to_string(),
/// };
/// assert!(err.to_string().contains("strategy"));
/// ```
#[derive(Debug)]
pub enum FaultsenseError {
    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Input contained nothing to work with.
    EmptyInput {
        /// What was empty
        context: String,
    },

    /// No decoder in the fallback chain could read the input.
    Encoding {
        /// Error description
        message: String,
    },

    /// Required dataset columns could not be resolved, even by fuzzy match.
    MissingColumns {
        /// Required columns that were not found
        missing: Vec<String>,
        /// Columns present in the file
        available: Vec<String>,
    },

    /// Malformed CSV content.
    Csv(String),

    /// Invalid parameter value provided.
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// No discretization strategy produced a single fault rule.
    NoViableStrategy {
        /// Number of strategies tried
        tried: usize,
    },

    /// Rules resolved to zero network edges.
    EmptyStructure {
        /// Error description
        message: String,
    },

    /// Network references nodes that are absent from the training data.
    ModelDataMismatch {
        /// Node names missing from the data
        missing: Vec<String>,
    },

    /// Exact inference could not produce a posterior.
    Inference {
        /// Error description
        message: String,
    },

    /// The task queue already has an active task.
    Busy {
        /// Queue name
        queue: String,
    },

    /// The run was cancelled through its cancellation token.
    Cancelled,

    /// A background task panicked or disconnected.
    TaskFailed {
        /// Error description
        message: String,
    },

    /// Invalid or corrupt model artifact.
    Format {
        /// Error description
        message: String,
    },

    /// Unsupported artifact version.
    UnsupportedVersion {
        /// Version found
        found: u16,
        /// Maximum supported version
        supported: u16,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for FaultsenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultsenseError::Io(e) => write!(f, "I/O error: {e}"),
            FaultsenseError::EmptyInput { context } => write!(f, "Empty input: {context}"),
            FaultsenseError::Encoding { message } => {
                write!(f, "Unreadable encoding: {message}")
            }
            FaultsenseError::MissingColumns { missing, available } => {
                write!(
                    f,
                    "Missing required columns [{}]; available columns: [{}]",
                    missing.join(", "),
                    available.join(", ")
                )
            }
            FaultsenseError::Csv(msg) => write!(f, "CSV error: {msg}"),
            FaultsenseError::InvalidParameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter: {param} = {value}, expected {constraint}"
                )
            }
            FaultsenseError::NoViableStrategy { tried } => {
                write!(
                    f,
                    "No discretization strategy produced fault rules ({tried} tried); \
                     relax min_support, min_lift or min_confidence"
                )
            }
            FaultsenseError::EmptyStructure { message } => {
                write!(f, "Cannot build network structure: {message}")
            }
            FaultsenseError::ModelDataMismatch { missing } => {
                write!(
                    f,
                    "Network nodes missing from training data: {}",
                    missing.join(", ")
                )
            }
            FaultsenseError::Inference { message } => write!(f, "Inference failed: {message}"),
            FaultsenseError::Busy { queue } => {
                write!(f, "Queue '{queue}' is busy: wait for the current task to finish")
            }
            FaultsenseError::Cancelled => write!(f, "Operation cancelled"),
            FaultsenseError::TaskFailed { message } => write!(f, "Task failed: {message}"),
            FaultsenseError::Format { message } => {
                write!(f, "Invalid model format: {message}")
            }
            FaultsenseError::UnsupportedVersion { found, supported } => {
                write!(
                    f,
                    "Unsupported artifact version: found {found}, max supported {supported}"
                )
            }
            FaultsenseError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            FaultsenseError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FaultsenseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FaultsenseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FaultsenseError {
    fn from(err: std::io::Error) -> Self {
        FaultsenseError::Io(err)
    }
}

impl From<csv::Error> for FaultsenseError {
    fn from(err: csv::Error) -> Self {
        FaultsenseError::Csv(err.to_string())
    }
}

impl From<bincode::Error> for FaultsenseError {
    fn from(err: bincode::Error) -> Self {
        FaultsenseError::Serialization(err.to_string())
    }
}

impl From<&str> for FaultsenseError {
    fn from(msg: &str) -> Self {
        FaultsenseError::Other(msg.to_string())
    }
}

impl From<String> for FaultsenseError {
    fn from(msg: String) -> Self {
        FaultsenseError::Other(msg)
    }
}

impl FaultsenseError {
    /// Create an empty input error
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::EmptyInput {
            context: context.to_string(),
        }
    }

    /// Create an invalid parameter error
    #[must_use]
    pub fn invalid_parameter(param: &str, value: impl fmt::Display, constraint: &str) -> Self {
        Self::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create an inference error
    #[must_use]
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the input-error class.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::EmptyInput { .. }
                | Self::Encoding { .. }
                | Self::MissingColumns { .. }
                | Self::Csv(_)
        )
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, FaultsenseError>;
