//! Error types for faultsense-cli

use std::path::PathBuf;
use std::process::ExitCode;

use faultsense::FaultsenseError;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Not a file (e.g., directory)
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    /// Unreadable or incomplete input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bad command line or configuration value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The run finished without anything usable
    #[error("No result: {0}")]
    NoResult(String),

    /// Corrupt or unsupported model file
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Background task failed or its queue was busy
    #[error("Task failed: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other library error
    #[error("{0}")]
    Faultsense(String),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::Faultsense(_) => ExitCode::from(1),
            Self::InvalidArgument(_) => ExitCode::from(2),
            Self::FileNotFound(_) | Self::NotAFile(_) => ExitCode::from(3),
            Self::InvalidInput(_) => ExitCode::from(4),
            Self::NoResult(_) => ExitCode::from(5),
            Self::InvalidModel(_) => ExitCode::from(6),
            Self::Io(_) => ExitCode::from(7),
            Self::Task(_) => ExitCode::from(8),
        }
    }
}

impl From<FaultsenseError> for CliError {
    fn from(e: FaultsenseError) -> Self {
        let message = e.to_string();
        match e {
            FaultsenseError::Io(io) => Self::Io(io),
            FaultsenseError::InvalidParameter { .. } | FaultsenseError::Serialization(_) => {
                Self::InvalidArgument(message)
            }
            FaultsenseError::NoViableStrategy { .. }
            | FaultsenseError::EmptyStructure { .. }
            | FaultsenseError::ModelDataMismatch { .. } => Self::NoResult(message),
            FaultsenseError::Format { .. } | FaultsenseError::UnsupportedVersion { .. } => {
                Self::InvalidModel(message)
            }
            FaultsenseError::Busy { .. }
            | FaultsenseError::Cancelled
            | FaultsenseError::TaskFailed { .. } => Self::Task(message),
            ref other if other.is_input_error() => Self::InvalidInput(message),
            _ => Self::Faultsense(message),
        }
    }
}
