//! Fault network structure: a star of predecessor nodes pointing at the
//! fault-type sink, read off the antecedents of fault rules.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FaultsenseError, Result};
use crate::mining::FaultRule;
use crate::schema::{LabelMap, NodeId};

/// Deduplicated directed edges, every one ending at [`NodeId::Fault`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStructure {
    edges: BTreeSet<(NodeId, NodeId)>,
}

impl NetworkStructure {
    /// Structure with one edge from each of `parents` into the sink.
    ///
    /// # Errors
    ///
    /// Returns [`FaultsenseError::EmptyStructure`] if no parent other than
    /// the sink itself is given.
    pub fn from_parents(parents: impl IntoIterator<Item = NodeId>) -> Result<Self> {
        let edges: BTreeSet<(NodeId, NodeId)> = parents
            .into_iter()
            .filter(|p| *p != NodeId::Fault)
            .map(|p| (p, NodeId::Fault))
            .collect();
        if edges.is_empty() {
            return Err(FaultsenseError::EmptyStructure {
                message: "no parent nodes".to_string(),
            });
        }
        Ok(Self { edges })
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.edges.iter().copied()
    }

    /// Parents of the sink, in node order.
    #[must_use]
    pub fn parents(&self) -> Vec<NodeId> {
        self.edges.iter().map(|(from, _)| *from).collect()
    }

    /// Every node, parents first and the sink last.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.parents();
        nodes.push(NodeId::Fault);
        nodes
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        node == NodeId::Fault || self.edges.iter().any(|(from, _)| *from == node)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl fmt::Display for NetworkStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (from, to)) in self.edges.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{from} → {to}")?;
        }
        Ok(())
    }
}

/// Build the structure from rule antecedents.
///
/// Each antecedent token is resolved through `labels`. Tokens that resolve
/// to nothing are skipped with a warning, as are tokens naming a fault
/// label (they would be a self-loop on the sink).
///
/// # Errors
///
/// Returns [`FaultsenseError::EmptyStructure`] if no edge survives.
///
/// # Examples
///
/// ```
/// use faultsense::mining::FaultRule;
/// use faultsense::network::build_structure;
/// use faultsense::schema::{FaultType, Feature, LabelMap, NodeId};
///
/// let rule = FaultRule {
///     antecedent: vec!["高振动".into(), "部门_生产部".into()],
///     consequent: FaultType::Transmission,
///     support: 0.05,
///     confidence: 0.8,
///     lift: 3.0,
/// };
/// let structure = build_structure(&[rule], &LabelMap::standard().unwrap()).unwrap();
/// assert_eq!(
///     structure.parents(),
///     vec![NodeId::Department, NodeId::Feature(Feature::Vibration)]
/// );
/// ```
pub fn build_structure(rules: &[FaultRule], labels: &LabelMap) -> Result<NetworkStructure> {
    let mut edges = BTreeSet::new();
    for rule in rules {
        for token in &rule.antecedent {
            match labels.resolve(token) {
                Some(NodeId::Fault) => {
                    debug!(token = %token, "fault label in antecedent; no edge");
                }
                Some(node) => {
                    edges.insert((node, NodeId::Fault));
                }
                None => warn!(token = %token, rule = %rule.text(), "unknown rule condition"),
            }
        }
    }
    if edges.is_empty() {
        return Err(FaultsenseError::EmptyStructure {
            message: format!(
                "{} rules resolved to no network edges; re-run analysis or relax thresholds",
                rules.len()
            ),
        });
    }
    debug!(edges = edges.len(), "network structure built");
    Ok(NetworkStructure { edges })
}
