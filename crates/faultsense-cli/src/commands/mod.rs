//! Subcommand implementations and what they share.

pub(crate) mod analyze;
pub(crate) mod evaluate;
pub(crate) mod faults;
pub(crate) mod inspect;
pub(crate) mod predict;
pub(crate) mod train;

use std::path::Path;

use faultsense::config::Config;
use faultsense::progress::{ChannelSink, Reporter};
use faultsense::tasks::TaskQueue;

use crate::error::{CliError, Result};
use crate::output;

pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(CliError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

/// Configuration from `--config`, or the defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            validate_path(path)?;
            Ok(Config::from_file(path)?)
        }
        None => Ok(Config::default()),
    }
}

/// Run a pipeline stage on its task queue, printing its events to stderr
/// as they arrive unless `quiet`.
pub(crate) fn run_with_progress<T, F>(queue: &str, quiet: bool, stage: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Reporter<'_>) -> faultsense::Result<T> + Send + 'static,
{
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = TaskQueue::new(queue).submit(move || {
        let sink = ChannelSink::new(tx);
        let reporter = Reporter::new(&sink);
        stage(&reporter)
    })?;
    // ends once the task drops its sink
    for event in rx.iter() {
        if !quiet {
            output::event(&event);
        }
    }
    Ok(handle.wait()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(Path::new("/nonexistent/faultsense.toml"))).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
        assert_eq!(load_config(None).unwrap(), Config::default());
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(validate_path(dir.path()), Err(CliError::NotAFile(_))));
    }

    #[test]
    fn test_stage_result_is_returned() {
        let value = run_with_progress("test", true, |reporter| {
            reporter.progress(50, "halfway");
            Ok(5)
        })
        .unwrap();
        assert_eq!(value, 5);
    }
}
