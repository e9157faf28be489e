//! Discretization strategy search.
//!
//! Every strategy is tried on the same dataset: bins are fitted, the data
//! is discretized, transactions are built and fault rules mined. Each trial
//! owns its own [`BinConfig`] snapshot. The winner has the most fault rules,
//! ties going to the higher mean lift; a strategy with no rules never wins.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::data::Dataset;
use crate::discretize::{BinConfig, Strategy};
use crate::error::{FaultsenseError, Result};
use crate::mining::{build_transactions, mine, MiningStatus, MiningThresholds};
use crate::progress::Reporter;

/// Outcome of one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyTrial {
    pub strategy: Strategy,
    pub elapsed: Duration,
    pub rule_count: usize,
    pub mean_lift: f64,
    pub status: MiningStatus,
    /// `None` when binning itself failed.
    #[serde(skip)]
    pub bins: Option<BinConfig>,
    pub error: Option<String>,
}

impl StrategyTrial {
    #[must_use]
    pub fn is_viable(&self) -> bool {
        self.rule_count > 0 && self.bins.is_some()
    }
}

/// Index of the winning trial, if any trial produced rules.
///
/// Rule count decides first, then mean lift. On a full tie the earlier
/// trial is kept.
#[must_use]
pub fn select_best(trials: &[StrategyTrial]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, trial) in trials.iter().enumerate() {
        if !trial.is_viable() {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) => {
                let current = &trials[b];
                trial.rule_count > current.rule_count
                    || (trial.rule_count == current.rule_count
                        && trial.mean_lift > current.mean_lift)
            }
        };
        if better {
            best = Some(i);
        }
    }
    best
}

/// All trials of one search plus the winner.
#[derive(Debug, Clone)]
pub struct Optimization {
    pub trials: Vec<StrategyTrial>,
    best: usize,
    best_bins: BinConfig,
}

impl Optimization {
    #[must_use]
    pub fn best(&self) -> &StrategyTrial {
        &self.trials[self.best]
    }

    #[must_use]
    pub fn best_strategy(&self) -> Strategy {
        self.best().strategy
    }

    /// Bin configuration of the winning trial.
    #[must_use]
    pub fn best_bins(&self) -> &BinConfig {
        &self.best_bins
    }

    #[must_use]
    pub fn into_best_bins(self) -> BinConfig {
        self.best_bins
    }
}

fn run_trial(
    dataset: &Dataset,
    strategy: Strategy,
    num_bins: usize,
    thresholds: &MiningThresholds,
) -> StrategyTrial {
    let start = Instant::now();
    let attempt = BinConfig::fit(dataset, num_bins, strategy).and_then(|bins| {
        let transactions = build_transactions(&bins.discretize(dataset));
        mine(&transactions, thresholds).map(|outcome| (bins, outcome))
    });
    match attempt {
        Ok((bins, outcome)) => StrategyTrial {
            strategy,
            elapsed: start.elapsed(),
            rule_count: outcome.rules.len(),
            mean_lift: outcome.mean_lift(),
            status: outcome.status,
            bins: Some(bins),
            error: None,
        },
        Err(e) => {
            warn!(%strategy, error = %e, "strategy trial failed");
            StrategyTrial {
                strategy,
                elapsed: start.elapsed(),
                rule_count: 0,
                mean_lift: 0.0,
                status: MiningStatus::NoFrequentItemsets,
                bins: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Try `strategies` in order and pick the best.
///
/// Reports progress from 10% to 60% and one log line per strategy. The
/// cancellation token attached to `reporter` is checked before each trial.
///
/// # Errors
///
/// Returns [`FaultsenseError::NoViableStrategy`] if no strategy yields a
/// fault rule, [`FaultsenseError::Cancelled`] if cancelled, or a parameter
/// error for invalid thresholds.
pub fn optimize_over(
    dataset: &Dataset,
    strategies: &[Strategy],
    num_bins: usize,
    thresholds: &MiningThresholds,
    reporter: &Reporter<'_>,
) -> Result<Optimization> {
    thresholds.validate()?;
    if num_bins < 2 {
        return Err(FaultsenseError::invalid_parameter("num_bins", num_bins, ">= 2"));
    }
    let total = strategies.len().max(1);
    let mut trials = Vec::with_capacity(strategies.len());
    for (i, strategy) in strategies.iter().enumerate() {
        reporter.checkpoint()?;
        reporter.progress(
            (10 + 50 * i / total) as u8,
            format!("trying {strategy} discretization"),
        );
        let trial = run_trial(dataset, *strategy, num_bins, thresholds);
        reporter.log(format!(
            "{}: {} rules, mean lift {:.2}, {:.1} ms",
            trial.strategy,
            trial.rule_count,
            trial.mean_lift,
            trial.elapsed.as_secs_f64() * 1000.0
        ));
        trials.push(trial);
    }
    reporter.progress(60, "strategy search finished");

    let (best, best_bins) = select_best(&trials)
        .and_then(|i| trials[i].bins.clone().map(|bins| (i, bins)))
        .ok_or(FaultsenseError::NoViableStrategy {
            tried: trials.len(),
        })?;
    info!(
        strategy = %trials[best].strategy,
        rules = trials[best].rule_count,
        mean_lift = trials[best].mean_lift,
        "best discretization selected"
    );
    reporter.log(format!("best strategy: {}", trials[best].strategy));
    Ok(Optimization {
        trials,
        best,
        best_bins,
    })
}

/// [`optimize_over`] with every strategy.
///
/// # Errors
///
/// See [`optimize_over`].
pub fn optimize(
    dataset: &Dataset,
    num_bins: usize,
    thresholds: &MiningThresholds,
    reporter: &Reporter<'_>,
) -> Result<Optimization> {
    optimize_over(dataset, &Strategy::ALL, num_bins, thresholds, reporter)
}
