//! Output formatting utilities

use colored::Colorize;
use faultsense::predict::PredictionSource;
use faultsense::progress::PipelineEvent;
use serde::Serialize;

use crate::error::{CliError, Result};

/// Print a section header
pub(crate) fn section(title: &str) {
    println!("\n{}", format!("=== {title} ===").cyan().bold());
}

/// Print a key-value pair
pub(crate) fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", key.white().bold(), value);
}

/// Print a success message
pub(crate) fn success(msg: &str) {
    println!("{} {}", "[PASS]".green().bold(), msg);
}

/// Print a warning message
pub(crate) fn warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// Print an error message
pub(crate) fn error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

/// Print any serializable value as pretty JSON on stdout
pub(crate) fn json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Faultsense(format!("JSON output failed: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Render one pipeline event on stderr
pub(crate) fn event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Progress { percent, stage } => {
            eprintln!("{} {}", format!("[{percent:>3}%]").blue(), stage);
        }
        PipelineEvent::Log(line) => eprintln!("       {}", line.dimmed()),
    }
}

/// Colored name of a prediction source
pub(crate) fn source(source: PredictionSource) -> String {
    let text = source.to_string();
    match source {
        PredictionSource::Network => text.green().to_string(),
        PredictionSource::ExtremeOverride => text.red().bold().to_string(),
        PredictionSource::FallbackRules => text.yellow().to_string(),
    }
}

/// Fixed-width percentage bar, `width` cells for 100%
pub(crate) fn bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_widths() {
        assert_eq!(bar(0.0, 10).chars().filter(|c| *c == '█').count(), 0);
        assert_eq!(bar(0.5, 10).chars().filter(|c| *c == '█').count(), 5);
        assert_eq!(bar(1.7, 10).chars().count(), 10);
    }

    #[test]
    fn test_source_names() {
        colored::control::set_override(false);
        assert_eq!(source(PredictionSource::Network), "bayesian network");
        assert_eq!(
            source(PredictionSource::ExtremeOverride),
            "extreme-value override"
        );
    }
}
