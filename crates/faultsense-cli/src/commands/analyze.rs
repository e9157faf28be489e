//! Analyze command: discretize, mine fault rules, write the rules file.

use std::path::{Path, PathBuf};

use faultsense::config::Config;
use faultsense::discretize::Strategy;
use faultsense::pipeline::{analyze_file, AnalysisReport};

use super::{run_with_progress, validate_path};
use crate::error::{CliError, Result};
use crate::output;

/// Command line overrides of the analysis settings.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) num_bins: Option<usize>,
    pub(crate) strategy: Option<String>,
    pub(crate) min_support: Option<f64>,
    pub(crate) min_confidence: Option<f64>,
    pub(crate) min_lift: Option<f64>,
    pub(crate) max_len: Option<usize>,
}

impl Overrides {
    /// A fixed strategy turns the strategy search off.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(n) = self.num_bins {
            config.discretization.num_bins = n;
        }
        if let Some(name) = &self.strategy {
            config.discretization.strategy = name.parse::<Strategy>()?;
            config.discretization.auto_optimize = false;
        }
        if let Some(v) = self.min_support {
            config.mining.min_support = v;
        }
        if let Some(v) = self.min_confidence {
            config.mining.min_confidence = v;
        }
        if let Some(v) = self.min_lift {
            config.mining.min_lift = v;
        }
        if let Some(v) = self.max_len {
            config.mining.max_itemset_len = v;
        }
        config.validate()?;
        Ok(())
    }
}

pub(crate) fn run(
    data: &Path,
    rules_out: &Path,
    mut config: Config,
    overrides: &Overrides,
    json: bool,
    quiet: bool,
) -> Result<()> {
    validate_path(data)?;
    overrides.apply(&mut config)?;

    let data_path = data.to_path_buf();
    let rules_path: PathBuf = rules_out.to_path_buf();
    let report = run_with_progress("analysis", quiet || json, move |reporter| {
        analyze_file(&data_path, &config, Some(&rules_path), reporter)
    })?;

    if json {
        output::json(&report)?;
    } else if !quiet {
        print_report(&report);
    }
    if report.found_rules() {
        Ok(())
    } else {
        Err(CliError::NoResult(report.outcome.status.message().to_string()))
    }
}

fn print_report(report: &AnalysisReport) {
    output::section("Data");
    output::kv("Rows", report.load.rows_read);
    output::kv("Duplicates removed", report.load.duplicates_removed);
    output::kv("Rows skipped", report.load.rows_skipped);
    if let Some(encoding) = report.load.encoding {
        output::kv("Encoding", encoding.name());
    }
    for (required, found) in &report.load.fuzzy_matches {
        output::warning(&format!("column '{required}' matched to header '{found}'"));
    }

    if !report.trials.is_empty() {
        output::section("Discretization search");
        println!(
            "  {:<15}{:>8}{:>12}{:>12}",
            "strategy", "rules", "mean lift", "time (ms)"
        );
        for trial in &report.trials {
            let marker = if trial.strategy == report.strategy { "*" } else { " " };
            println!(
                "{marker} {:<15}{:>8}{:>12.2}{:>12.1}",
                trial.strategy.name(),
                trial.rule_count,
                trial.mean_lift,
                trial.elapsed.as_secs_f64() * 1000.0
            );
        }
    }

    output::section("Rules");
    output::kv("Strategy", report.strategy);
    output::kv("Frequent itemsets", report.outcome.frequent_itemsets);
    output::kv("Association rules", report.outcome.association_rules);
    output::kv("Fault rules", report.outcome.rules.len());
    for rule in report.outcome.rules.iter().take(10) {
        println!("  {rule}");
    }
    if report.outcome.rules.len() > 10 {
        println!("  ... {} more", report.outcome.rules.len() - 10);
    }
    match &report.rules_path {
        Some(path) => output::success(&format!("rules written to {}", path.display())),
        None => output::warning(report.outcome.status.message()),
    }
}
