//! Discretization of continuous sensor columns into ordinal categories.
//!
//! Six strategies are supported. Whatever the strategy, the result is
//! `num_bins + 1` strictly increasing boundaries covering the column's
//! `[min, max]`: strategies that collapse boundaries on skewed or degenerate
//! columns fall back to equal-width binning.
//!
//! A [`BinConfig`] learned at training time is persisted with the model and
//! reused unchanged at inference, so new records are always binned against
//! training-time boundaries.

pub mod kmeans;
pub mod tree;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Dataset, SensorRecord};
use crate::error::{FaultsenseError, Result};
use crate::schema::{FaultType, Feature, LabelMap, NodeId, DEPARTMENT_PREFIX};
use crate::stats::DescriptiveStats;

use kmeans::KMeans1d;
use tree::SplitTree;

/// Binning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Evenly spaced boundaries between min and max
    EqualWidth,
    /// Percentile boundaries at 100·i/n
    EqualFreq,
    /// Midpoints between sorted 1-D k-means centers
    #[serde(rename = "kmeans")]
    KMeans,
    /// `num_bins + 1` evenly spaced percentiles from 0 to 100
    Quantile,
    /// Mean ± multiples of the standard deviation
    StdBased,
    /// Split thresholds of a fault-vs-normal decision tree
    DecisionTree,
}

impl Strategy {
    /// Every strategy, in the order the optimizer tries them.
    pub const ALL: [Strategy; 6] = [
        Strategy::EqualWidth,
        Strategy::EqualFreq,
        Strategy::KMeans,
        Strategy::Quantile,
        Strategy::StdBased,
        Strategy::DecisionTree,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Strategy::EqualWidth => "equal_width",
            Strategy::EqualFreq => "equal_freq",
            Strategy::KMeans => "kmeans",
            Strategy::Quantile => "quantile",
            Strategy::StdBased => "std_based",
            Strategy::DecisionTree => "decision_tree",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = FaultsenseError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        Strategy::ALL
            .into_iter()
            .find(|st| st.name() == needle)
            .ok_or_else(|| {
                FaultsenseError::invalid_parameter(
                    "strategy",
                    s,
                    "one of equal_width, equal_freq, kmeans, quantile, std_based, decision_tree",
                )
            })
    }
}

fn equal_width(min: f64, max: f64, num_bins: usize) -> Vec<f64> {
    let step = (max - min) / num_bins as f64;
    let mut bins: Vec<f64> = (0..=num_bins).map(|i| min + step * i as f64).collect();
    bins[num_bins] = max;
    bins
}

fn std_based(stats: &DescriptiveStats<'_>, min: f64, max: f64, num_bins: usize) -> Vec<f64> {
    let mean = stats.mean().unwrap_or(min);
    let sigma = stats.std().unwrap_or(0.0);
    let multiples: Vec<f64> = match num_bins {
        5 => vec![-2.0, -1.0, 1.0, 2.0],
        3 => vec![-1.0, 1.0],
        2 => vec![0.0],
        n => {
            let step = 4.0 / (n - 2) as f64;
            (0..n - 1).map(|j| -2.0 + step * j as f64).collect()
        }
    };
    let mut bins = Vec::with_capacity(num_bins + 1);
    bins.push(min);
    bins.extend(multiples.iter().map(|k| (mean + k * sigma).clamp(min, max)));
    bins.push(max);
    bins
}

fn kmeans_midpoints(values: &[f64], min: f64, max: f64, num_bins: usize) -> Vec<f64> {
    let mut km = KMeans1d::new(num_bins).with_random_state(0);
    let centers = match km.fit(values).ok().and_then(|()| km.sorted_centers()) {
        Some(centers) => centers,
        None => return Vec::new(),
    };
    let mut bins = vec![min];
    bins.extend(centers.windows(2).map(|w| (w[0] + w[1]) / 2.0));
    bins.push(max);
    bins
}

fn tree_thresholds(
    values: &[f64],
    targets: Option<&[bool]>,
    min: f64,
    max: f64,
    num_bins: usize,
) -> Vec<f64> {
    let Some(targets) = targets else {
        debug!("decision_tree binning without a fault target; using equal_width");
        return Vec::new();
    };
    let mut tree = SplitTree::new(num_bins);
    if tree.fit(values, targets).is_err() {
        return Vec::new();
    }
    let thresholds = tree.thresholds();
    if thresholds.len() < num_bins - 1 {
        return Vec::new();
    }
    let mut bins = vec![min];
    bins.extend(thresholds.into_iter().take(num_bins - 1));
    bins.push(max);
    bins
}

/// Compute `num_bins + 1` boundaries for an unlabeled column.
///
/// NaN values are ignored. `DecisionTree` has no target here and therefore
/// always resolves to equal-width boundaries.
///
/// # Errors
///
/// Returns an error if `num_bins < 2` or the column has no finite value.
///
/// # Examples
///
/// ```
/// use faultsense::discretize::{compute_bins, Strategy};
///
/// let bins = compute_bins(&[0.0, 2.5, 5.0, 10.0], 4, Strategy::EqualWidth).unwrap();
/// assert_eq!(bins, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
/// ```
pub fn compute_bins(values: &[f64], num_bins: usize, strategy: Strategy) -> Result<Vec<f64>> {
    compute_bins_supervised(values, None, num_bins, strategy)
}

/// Compute boundaries, optionally with a fault-vs-normal target for the
/// `DecisionTree` strategy. `is_fault` must be parallel to `values`.
///
/// # Errors
///
/// Returns an error if `num_bins < 2`, the column has no finite value, or
/// `is_fault` has a different length than `values`.
pub fn compute_bins_supervised(
    values: &[f64],
    is_fault: Option<&[bool]>,
    num_bins: usize,
    strategy: Strategy,
) -> Result<Vec<f64>> {
    if num_bins < 2 {
        return Err(FaultsenseError::invalid_parameter("num_bins", num_bins, ">= 2"));
    }
    if let Some(target) = is_fault {
        if target.len() != values.len() {
            return Err(FaultsenseError::invalid_parameter(
                "is_fault",
                format!("{} labels for {} values", target.len(), values.len()),
                "one label per value",
            ));
        }
    }

    let (finite, target): (Vec<f64>, Vec<bool>) = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (*v, is_fault.is_some_and(|t| t[i])))
        .unzip();
    let stats = DescriptiveStats::new(&finite);
    let (Some(min), Some(max)) = (stats.min(), stats.max()) else {
        return Err(FaultsenseError::empty_input("column has no finite values"));
    };
    if max <= min {
        return Ok(equal_width(min - 0.5, max + 0.5, num_bins));
    }

    let raw = match strategy {
        Strategy::EqualWidth => equal_width(min, max, num_bins),
        Strategy::EqualFreq => {
            let inner: Vec<f64> = (1..num_bins)
                .map(|i| 100.0 * i as f64 / num_bins as f64)
                .collect();
            let mut bins = vec![min];
            bins.extend(stats.percentiles(&inner)?);
            bins.push(max);
            bins
        }
        Strategy::Quantile => {
            let grid: Vec<f64> = (0..=num_bins)
                .map(|i| 100.0 * i as f64 / num_bins as f64)
                .collect();
            stats.percentiles(&grid)?
        }
        Strategy::KMeans => kmeans_midpoints(&finite, min, max, num_bins),
        Strategy::StdBased => std_based(&stats, min, max, num_bins),
        Strategy::DecisionTree => {
            let target = is_fault.map(|_| target.as_slice());
            tree_thresholds(&finite, target, min, max, num_bins)
        }
    };

    Ok(finalize(raw, min, max, num_bins, strategy))
}

/// Sort, dedup and check arity; equal-width replaces anything short.
fn finalize(mut bins: Vec<f64>, min: f64, max: f64, num_bins: usize, strategy: Strategy) -> Vec<f64> {
    bins.retain(|b| b.is_finite());
    bins.sort_by(f64::total_cmp);
    bins.dedup();
    if bins.len() == num_bins + 1 {
        bins
    } else {
        debug!(
            %strategy,
            unique = bins.len(),
            required = num_bins + 1,
            "too few unique boundaries; falling back to equal_width"
        );
        equal_width(min, max, num_bins)
    }
}

/// Boundaries and labels of one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBins {
    bins: Vec<f64>,
    labels: Vec<String>,
}

impl FeatureBins {
    /// # Errors
    ///
    /// Returns an error unless `bins.len() == labels.len() + 1` and the
    /// boundaries are strictly increasing.
    pub fn new(bins: Vec<f64>, labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() || bins.len() != labels.len() + 1 {
            return Err(FaultsenseError::invalid_parameter(
                "bins",
                format!("{} boundaries for {} labels", bins.len(), labels.len()),
                "exactly one more boundary than labels",
            ));
        }
        if bins.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(FaultsenseError::invalid_parameter(
                "bins",
                format!("{bins:?}"),
                "strictly increasing boundaries",
            ));
        }
        Ok(Self { bins, labels })
    }

    #[must_use]
    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Bin index of `value`.
    ///
    /// Internal boundaries are left-closed. Values below the first boundary
    /// land in bin 0 and values above the last in the final bin. NaN has
    /// no bin.
    #[must_use]
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let last = self.labels.len() - 1;
        let upper = self.bins.partition_point(|b| *b <= value);
        Some(upper.saturating_sub(1).min(last))
    }

    #[must_use]
    pub fn label_of(&self, value: f64) -> Option<&str> {
        self.bin_index(value).map(|i| self.labels[i].as_str())
    }
}

/// Per-feature bin configuration. An immutable snapshot: a new one is built
/// for every strategy trial and every training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    strategy: Strategy,
    num_bins: usize,
    features: BTreeMap<Feature, FeatureBins>,
}

impl BinConfig {
    /// Learn bins for all five features of `dataset`.
    ///
    /// # Errors
    ///
    /// Returns an error if any feature column has no finite values or
    /// `num_bins < 2`.
    pub fn fit(dataset: &Dataset, num_bins: usize, strategy: Strategy) -> Result<Self> {
        let mask = dataset.fault_mask();
        let mut features = BTreeMap::new();
        for feature in Feature::ALL {
            let bins = compute_bins_supervised(
                &dataset.column(feature),
                Some(mask.as_slice()),
                num_bins,
                strategy,
            )
            .map_err(|e| match e {
                FaultsenseError::EmptyInput { context } => FaultsenseError::EmptyInput {
                    context: format!("{feature}: {context}"),
                },
                other => other,
            })?;
            features.insert(feature, FeatureBins::new(bins, feature.labels(num_bins))?);
        }
        Ok(Self {
            strategy,
            num_bins,
            features,
        })
    }

    /// Assemble a config from explicit per-feature bins.
    ///
    /// # Errors
    ///
    /// Returns an error if a feature is missing or bin counts differ.
    pub fn from_parts(strategy: Strategy, features: BTreeMap<Feature, FeatureBins>) -> Result<Self> {
        let num_bins = features
            .values()
            .next()
            .map(|fb| fb.labels.len())
            .ok_or_else(|| FaultsenseError::empty_input("bin config has no features"))?;
        for feature in Feature::ALL {
            match features.get(&feature) {
                Some(fb) if fb.labels.len() == num_bins => {}
                Some(_) => {
                    return Err(FaultsenseError::invalid_parameter(
                        "bins",
                        feature,
                        "the same bin count for every feature",
                    ))
                }
                None => {
                    return Err(FaultsenseError::invalid_parameter(
                        "bins",
                        feature,
                        "bins for all five features",
                    ))
                }
            }
        }
        Ok(Self {
            strategy,
            num_bins,
            features,
        })
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    #[must_use]
    pub fn feature(&self, feature: Feature) -> Option<&FeatureBins> {
        self.features.get(&feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, &FeatureBins)> {
        self.features.iter().map(|(f, b)| (*f, b))
    }

    /// Category label of a single value against the stored boundaries.
    #[must_use]
    pub fn discretize_value(&self, feature: Feature, value: f64) -> Option<&str> {
        self.feature(feature).and_then(|fb| fb.label_of(value))
    }

    /// Discretize one record.
    #[must_use]
    pub fn discretize_record(&self, record: &SensorRecord) -> DiscreteRow {
        let levels = Feature::ALL
            .into_iter()
            .filter_map(|f| {
                self.discretize_value(f, record.readings.get(f))
                    .map(|label| (f, label.to_string()))
            })
            .collect();
        DiscreteRow {
            department: record.department.clone(),
            levels,
            fault: record.fault,
        }
    }

    /// Discretize every record of a dataset.
    #[must_use]
    pub fn discretize(&self, dataset: &Dataset) -> Vec<DiscreteRow> {
        dataset
            .records()
            .iter()
            .map(|r| self.discretize_record(r))
            .collect()
    }

    /// Label→node table for the labels this config produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the label sets are incomplete or ambiguous.
    pub fn label_map(&self) -> Result<LabelMap> {
        LabelMap::from_label_sets(self.iter().map(|(f, fb)| (f, fb.labels.clone())))
    }
}

/// A record after discretization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteRow {
    /// Raw department name, without prefix.
    pub department: String,
    /// Category label per feature; features with a missing reading are absent.
    pub levels: BTreeMap<Feature, String>,
    pub fault: Option<FaultType>,
}

impl DiscreteRow {
    /// State of `node` as used by the network: departments carry the
    /// department prefix, the fault node uses the fault label.
    #[must_use]
    pub fn state(&self, node: NodeId) -> Option<String> {
        match node {
            NodeId::Department => {
                if self.department.is_empty() {
                    None
                } else {
                    Some(format!("{DEPARTMENT_PREFIX}{}", self.department))
                }
            }
            NodeId::Feature(f) => self.levels.get(&f).cloned(),
            NodeId::Fault => self.fault.map(|f| f.label().to_string()),
        }
    }
}
