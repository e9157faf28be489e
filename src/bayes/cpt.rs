//! Conditional probability tables and their estimation from counts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FaultsenseError, Result};
use crate::schema::NodeId;

/// Parameter estimator for CPTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Bayesian Dirichlet equivalent uniform prior: every cell of a table
    /// gets `ess / (r · q)` pseudo-counts, `r` states and `q` parent
    /// configurations.
    #[serde(rename = "bdeu")]
    BDeu,
    /// Relative frequencies. A parent configuration never observed gets a
    /// uniform row.
    Mle,
}

impl Estimator {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Estimator::BDeu => "bdeu",
            Estimator::Mle => "mle",
        }
    }
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Estimator {
    type Err = FaultsenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bdeu" => Ok(Estimator::BDeu),
            "mle" | "maximum_likelihood" => Ok(Estimator::Mle),
            _ => Err(FaultsenseError::invalid_parameter("estimator", s, "bdeu or mle")),
        }
    }
}

/// `P(node | parents)`.
///
/// `values` holds one distribution over the node's states per parent
/// configuration. Configurations are enumerated row-major over `parents`
/// (last parent fastest), and the node's own state varies fastest of all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpt {
    node: NodeId,
    parents: Vec<NodeId>,
    cardinality: usize,
    parent_cardinalities: Vec<usize>,
    values: Vec<f64>,
}

impl Cpt {
    /// Estimate from a count table laid out like `values`.
    pub(crate) fn from_counts(
        node: NodeId,
        parents: Vec<NodeId>,
        cardinality: usize,
        parent_cardinalities: Vec<usize>,
        counts: &[usize],
        estimator: Estimator,
        equivalent_sample_size: f64,
    ) -> Self {
        let configurations: usize = parent_cardinalities.iter().product();
        let alpha = equivalent_sample_size / (cardinality * configurations) as f64;
        let mut values = Vec::with_capacity(counts.len());
        for row in counts.chunks(cardinality) {
            let total: usize = row.iter().sum();
            match estimator {
                Estimator::BDeu => {
                    let denominator = total as f64 + cardinality as f64 * alpha;
                    values.extend(row.iter().map(|n| (*n as f64 + alpha) / denominator));
                }
                Estimator::Mle if total == 0 => {
                    values.extend(std::iter::repeat(1.0 / cardinality as f64).take(cardinality));
                }
                Estimator::Mle => {
                    values.extend(row.iter().map(|n| *n as f64 / total as f64));
                }
            }
        }
        Self {
            node,
            parents,
            cardinality,
            parent_cardinalities,
            values,
        }
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    #[must_use]
    pub fn parent_cardinalities(&self) -> &[usize] {
        &self.parent_cardinalities
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn configurations(&self) -> usize {
        self.parent_cardinalities.iter().product()
    }

    /// Distribution of the node for parent state indices `parent_states`.
    #[must_use]
    pub fn row(&self, parent_states: &[usize]) -> Option<&[f64]> {
        if parent_states.len() != self.parents.len() {
            return None;
        }
        let mut config = 0;
        for (state, card) in parent_states.iter().zip(&self.parent_cardinalities) {
            if state >= card {
                return None;
            }
            config = config * card + state;
        }
        let start = config * self.cardinality;
        self.values.get(start..start + self.cardinality)
    }
}
