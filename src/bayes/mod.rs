//! Discrete Bayesian network over the fault star: parameter estimation,
//! exact posterior queries and MAP prediction.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use faultsense::bayes::ParameterEstimator;
//! use faultsense::discretize::DiscreteRow;
//! use faultsense::network::NetworkStructure;
//! use faultsense::schema::{FaultType, Feature, NodeId};
//!
//! let row = |temp: &str, fault| DiscreteRow {
//!     department: "生产部".into(),
//!     levels: BTreeMap::from([(Feature::Temp, temp.to_string())]),
//!     fault: Some(fault),
//! };
//! let rows = vec![
//!     row("高温", FaultType::Cooling),
//!     row("高温", FaultType::Cooling),
//!     row("中温", FaultType::Normal),
//!     row("中温", FaultType::Normal),
//! ];
//! let structure = NetworkStructure::from_parents([NodeId::Feature(Feature::Temp)]).unwrap();
//! let model = ParameterEstimator::bdeu(1.0).fit(&structure, &rows).unwrap();
//! assert_eq!(model.map_predict(&row("高温", FaultType::Normal)).unwrap(), FaultType::Cooling);
//! ```

pub mod cpt;
pub mod inference;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::discretize::DiscreteRow;
use crate::error::{FaultsenseError, Result};
use crate::network::NetworkStructure;
use crate::schema::{FaultType, Feature, NodeId};

pub use cpt::{Cpt, Estimator};

/// Fits CPTs for a [`NetworkStructure`] from discretized rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterEstimator {
    estimator: Estimator,
    equivalent_sample_size: f64,
}

impl Default for ParameterEstimator {
    fn default() -> Self {
        Self::bdeu(10.0)
    }
}

impl ParameterEstimator {
    #[must_use]
    pub fn new(estimator: Estimator, equivalent_sample_size: f64) -> Self {
        Self {
            estimator,
            equivalent_sample_size,
        }
    }

    #[must_use]
    pub fn bdeu(equivalent_sample_size: f64) -> Self {
        Self::new(Estimator::BDeu, equivalent_sample_size)
    }

    #[must_use]
    pub fn mle() -> Self {
        Self::new(Estimator::Mle, 0.0)
    }

    /// Fit every node's table.
    ///
    /// Node state spaces are the states observed in `rows`, sorted. Each
    /// table counts only rows where the node and all its parents have a
    /// state. Nodes that no row observes are a model/data mismatch; data
    /// columns that are not in the structure are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FaultsenseError::ModelDataMismatch`] for unobserved nodes,
    /// [`FaultsenseError::EmptyInput`] for no rows, or a parameter error
    /// for a non-positive BDeu sample size.
    pub fn fit(&self, structure: &NetworkStructure, rows: &[DiscreteRow]) -> Result<BayesianModel> {
        if rows.is_empty() {
            return Err(FaultsenseError::empty_input("no training rows"));
        }
        if self.estimator == Estimator::BDeu && !(self.equivalent_sample_size > 0.0) {
            return Err(FaultsenseError::invalid_parameter(
                "equivalent_sample_size",
                self.equivalent_sample_size,
                "> 0",
            ));
        }

        let nodes = structure.nodes();
        let mut states: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();
        let mut missing = Vec::new();
        for node in &nodes {
            let observed: BTreeSet<String> = rows.iter().filter_map(|r| r.state(*node)).collect();
            if observed.is_empty() {
                missing.push(node.name().to_string());
            } else {
                states.insert(*node, observed.into_iter().collect());
            }
        }
        if !missing.is_empty() {
            return Err(FaultsenseError::ModelDataMismatch { missing });
        }

        let dropped: Vec<&str> = Feature::ALL
            .into_iter()
            .map(NodeId::Feature)
            .chain([NodeId::Department])
            .filter(|n| !structure.contains(*n))
            .map(NodeId::name)
            .collect();
        if !dropped.is_empty() {
            info!(columns = %dropped.join(", "), "columns not in the network are dropped");
        }

        let mut cpts = BTreeMap::new();
        for node in &nodes {
            let parents: Vec<NodeId> = if *node == NodeId::Fault {
                structure.parents()
            } else {
                Vec::new()
            };
            let cpt = self.fit_node(*node, parents, &states, rows);
            cpts.insert(*node, cpt);
        }
        debug!(
            nodes = nodes.len(),
            estimator = self.estimator.name(),
            "parameters estimated"
        );

        Ok(BayesianModel {
            structure: structure.clone(),
            states,
            cpts,
            estimator: self.estimator,
            equivalent_sample_size: self.equivalent_sample_size,
        })
    }

    fn fit_node(
        &self,
        node: NodeId,
        parents: Vec<NodeId>,
        states: &BTreeMap<NodeId, Vec<String>>,
        rows: &[DiscreteRow],
    ) -> Cpt {
        let state_index = |n: NodeId, s: &str| states[&n].iter().position(|x| x == s);
        let cardinality = states[&node].len();
        let parent_cards: Vec<usize> = parents.iter().map(|p| states[p].len()).collect();
        let configurations: usize = parent_cards.iter().product();
        let mut counts = vec![0usize; configurations * cardinality];

        'rows: for row in rows {
            let Some(own) = row.state(node).and_then(|s| state_index(node, &s)) else {
                continue;
            };
            let mut config = 0;
            for (parent, card) in parents.iter().zip(&parent_cards) {
                let Some(idx) = row.state(*parent).and_then(|s| state_index(*parent, &s)) else {
                    continue 'rows;
                };
                config = config * card + idx;
            }
            counts[config * cardinality + own] += 1;
        }

        Cpt::from_counts(
            node,
            parents,
            cardinality,
            parent_cards,
            &counts,
            self.estimator,
            self.equivalent_sample_size,
        )
    }
}

/// Evidence: observed state per node.
pub type Evidence = BTreeMap<NodeId, String>;

/// Fitted fault network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianModel {
    structure: NetworkStructure,
    states: BTreeMap<NodeId, Vec<String>>,
    cpts: BTreeMap<NodeId, Cpt>,
    estimator: Estimator,
    equivalent_sample_size: f64,
}

impl BayesianModel {
    #[must_use]
    pub fn structure(&self) -> &NetworkStructure {
        &self.structure
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        self.structure.nodes()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.structure.contains(node)
    }

    /// Observed states of `node`, sorted.
    #[must_use]
    pub fn states(&self, node: NodeId) -> Option<&[String]> {
        self.states.get(&node).map(Vec::as_slice)
    }

    #[must_use]
    pub fn cpt(&self, node: NodeId) -> Option<&Cpt> {
        self.cpts.get(&node)
    }

    pub fn cpts(&self) -> impl Iterator<Item = &Cpt> {
        self.cpts.values()
    }

    #[must_use]
    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    #[must_use]
    pub fn equivalent_sample_size(&self) -> f64 {
        self.equivalent_sample_size
    }

    /// Evidence for the model's parent nodes taken from a discretized row.
    /// Nodes outside the model and missing levels are left out.
    #[must_use]
    pub fn evidence_for(&self, row: &DiscreteRow) -> Evidence {
        self.structure
            .parents()
            .into_iter()
            .filter_map(|node| row.state(node).map(|s| (node, s)))
            .collect()
    }

    /// Posterior over the fault node, ordered like [`FaultType::ALL`] and
    /// restricted to the fault types seen in training.
    ///
    /// # Errors
    ///
    /// Returns an inference error for evidence on the fault node, a state
    /// never seen in training, or evidence with zero probability.
    pub fn posterior(&self, evidence: &Evidence) -> Result<Vec<(FaultType, f64)>> {
        let mut indexed = Vec::with_capacity(evidence.len());
        for (node, state) in evidence {
            if *node == NodeId::Fault {
                return Err(FaultsenseError::inference("evidence on the fault node"));
            }
            let idx = self
                .states(*node)
                .and_then(|s| s.iter().position(|x| x == state))
                .ok_or_else(|| {
                    FaultsenseError::inference(format!("state '{state}' of {node} never seen in training"))
                })?;
            indexed.push((*node, idx));
        }

        let cpts: Vec<&Cpt> = self.cpts.values().collect();
        let distribution =
            inference::eliminate(&cpts, NodeId::Fault, &indexed, &self.structure.parents())?;

        let labels = self
            .states(NodeId::Fault)
            .ok_or_else(|| FaultsenseError::inference("model has no fault node"))?;
        let mut posterior = Vec::with_capacity(labels.len());
        for (label, p) in labels.iter().zip(distribution) {
            posterior.push((label.parse::<FaultType>()?, p));
        }
        posterior.sort_by_key(|(fault, _)| *fault);
        Ok(posterior)
    }

    /// Most probable fault type for a discretized row. Ties go to the
    /// earlier fault type.
    ///
    /// # Errors
    ///
    /// See [`BayesianModel::posterior`].
    pub fn map_predict(&self, row: &DiscreteRow) -> Result<FaultType> {
        let posterior = self.posterior(&self.evidence_for(row))?;
        argmax(&posterior).ok_or_else(|| FaultsenseError::inference("empty posterior"))
    }
}

/// Label with the highest probability; the first one wins ties.
pub(crate) fn argmax(distribution: &[(FaultType, f64)]) -> Option<FaultType> {
    let mut best: Option<(FaultType, f64)> = None;
    for (fault, p) in distribution {
        if best.map_or(true, |(_, bp)| *p > bp) {
            best = Some((*fault, *p));
        }
    }
    best.map(|(fault, _)| fault)
}
