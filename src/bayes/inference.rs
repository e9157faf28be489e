//! Exact inference by variable elimination over discrete factors.

use crate::error::{FaultsenseError, Result};
use crate::schema::NodeId;

use super::cpt::Cpt;

/// Non-negative function over a set of discrete variables, stored
/// row-major with the last variable varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Factor {
    vars: Vec<NodeId>,
    cards: Vec<usize>,
    values: Vec<f64>,
}

impl Factor {
    pub(crate) fn from_cpt(cpt: &Cpt) -> Self {
        let mut vars = cpt.parents().to_vec();
        vars.push(cpt.node());
        let mut cards = cpt.parent_cardinalities().to_vec();
        cards.push(cpt.cardinality());
        Self {
            vars,
            cards,
            values: cpt.values().to_vec(),
        }
    }

    pub(crate) fn vars(&self) -> &[NodeId] {
        &self.vars
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    fn contains(&self, var: NodeId) -> bool {
        self.vars.contains(&var)
    }

    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.vars.len()];
        for i in (0..self.vars.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.cards[i + 1];
        }
        strides
    }

    /// Fix `var` to `state` and drop it.
    fn reduce(&self, var: NodeId, state: usize) -> Factor {
        let Some(pos) = self.vars.iter().position(|v| *v == var) else {
            return self.clone();
        };
        let strides = self.strides();
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        vars.remove(pos);
        cards.remove(pos);
        let values = (0..self.values.len())
            .filter(|i| (i / strides[pos]) % self.cards[pos] == state)
            .map(|i| self.values[i])
            .collect();
        Factor { vars, cards, values }
    }

    /// Sum `var` out.
    fn marginalize(&self, var: NodeId) -> Factor {
        let Some(pos) = self.vars.iter().position(|v| *v == var) else {
            return self.clone();
        };
        let strides = self.strides();
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        vars.remove(pos);
        cards.remove(pos);
        let size: usize = cards.iter().product();
        let mut values = vec![0.0; size];
        let outer = strides[pos] * self.cards[pos];
        for (i, v) in self.values.iter().enumerate() {
            // drop the digit of `var` from the flat index
            let target = (i / outer) * strides[pos] + i % strides[pos];
            values[target] += v;
        }
        Factor { vars, cards, values }
    }

    fn product(&self, other: &Factor) -> Factor {
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        for (v, c) in other.vars.iter().zip(&other.cards) {
            if !vars.contains(v) {
                vars.push(*v);
                cards.push(*c);
            }
        }
        let self_map: Vec<usize> = self
            .vars
            .iter()
            .filter_map(|v| vars.iter().position(|u| u == v))
            .collect();
        let other_map: Vec<usize> = other
            .vars
            .iter()
            .filter_map(|v| vars.iter().position(|u| u == v))
            .collect();
        let (self_strides, other_strides) = (self.strides(), other.strides());

        let size: usize = cards.iter().product();
        let mut values = Vec::with_capacity(size);
        let mut assignment = vec![0usize; vars.len()];
        for _ in 0..size {
            let a: usize = self_map
                .iter()
                .zip(&self_strides)
                .map(|(pos, stride)| assignment[*pos] * stride)
                .sum();
            let b: usize = other_map
                .iter()
                .zip(&other_strides)
                .map(|(pos, stride)| assignment[*pos] * stride)
                .sum();
            values.push(self.values[a] * other.values[b]);
            for d in (0..assignment.len()).rev() {
                assignment[d] += 1;
                if assignment[d] < cards[d] {
                    break;
                }
                assignment[d] = 0;
            }
        }
        Factor { vars, cards, values }
    }
}

/// Normalized distribution of `query` given `evidence` (node, state index).
///
/// Variables that are neither queried nor observed are summed out in the
/// order given by `order`.
///
/// # Errors
///
/// Returns an inference error if the evidence has zero probability.
pub(crate) fn eliminate(
    cpts: &[&Cpt],
    query: NodeId,
    evidence: &[(NodeId, usize)],
    order: &[NodeId],
) -> Result<Vec<f64>> {
    let mut factors: Vec<Factor> = cpts
        .iter()
        .map(|cpt| {
            evidence
                .iter()
                .fold(Factor::from_cpt(cpt), |f, (var, state)| f.reduce(*var, *state))
        })
        .collect();

    for var in order {
        if *var == query || evidence.iter().any(|(v, _)| v == var) {
            continue;
        }
        let (involved, rest): (Vec<Factor>, Vec<Factor>) =
            factors.into_iter().partition(|f| f.contains(*var));
        factors = rest;
        if let Some(joint) = involved.into_iter().reduce(|a, b| a.product(&b)) {
            factors.push(joint.marginalize(*var));
        }
    }

    let joint = factors
        .into_iter()
        .reduce(|a, b| a.product(&b))
        .ok_or_else(|| FaultsenseError::inference("no factors left"))?;
    if joint.vars() != [query] {
        return Err(FaultsenseError::inference(format!(
            "elimination left variables {:?}",
            joint.vars()
        )));
    }
    let total: f64 = joint.values().iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(FaultsenseError::inference(
            "evidence has zero probability under the fitted tables",
        ));
    }
    Ok(joint.values().iter().map(|v| v / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayes::cpt::Estimator;
    use crate::schema::Feature;

    const A: NodeId = NodeId::Department;
    const B: NodeId = NodeId::Feature(Feature::Temp);
    const F: NodeId = NodeId::Fault;

    fn mle(node: NodeId, parents: Vec<NodeId>, card: usize, pc: Vec<usize>, counts: &[usize]) -> Cpt {
        Cpt::from_counts(node, parents, card, pc, counts, Estimator::Mle, 1.0)
    }

    fn fixture() -> (Cpt, Cpt, Cpt) {
        // P(A) = [0.5, 0.5], P(B) = [0.75, 0.25], P(F | A, B) over 2 states
        let a = mle(A, vec![], 2, vec![], &[1, 1]);
        let b = mle(B, vec![], 2, vec![], &[3, 1]);
        let f = mle(F, vec![A, B], 2, vec![2, 2], &[9, 1, 1, 1, 1, 3, 0, 1]);
        (a, b, f)
    }

    #[test]
    fn test_full_evidence_returns_cpt_row() {
        let (a, b, f) = fixture();
        let p = eliminate(&[&a, &b, &f], F, &[(A, 1), (B, 0)], &[A, B]).unwrap();
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!((p[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_hidden_parent_is_summed_out() {
        let (a, b, f) = fixture();
        let p = eliminate(&[&a, &b, &f], F, &[(A, 0)], &[A, B]).unwrap();
        // 0.75 · 0.9 + 0.25 · 0.5
        assert!((p[0] - 0.8).abs() < 1e-12);
        assert!((p[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_no_evidence_gives_marginal() {
        let (a, b, f) = fixture();
        let p = eliminate(&[&a, &b, &f], F, &[], &[A, B]).unwrap();
        let expected = 0.5 * (0.75 * 0.9 + 0.25 * 0.5) + 0.5 * (0.75 * 0.25 + 0.25 * 0.0);
        assert!((p[0] - expected).abs() < 1e-12);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_probability_evidence_fails() {
        let a = mle(A, vec![], 2, vec![], &[1, 0]);
        let f = mle(F, vec![A], 2, vec![2], &[1, 1, 1, 1]);
        let err = eliminate(&[&a, &f], F, &[(A, 1)], &[A]).unwrap_err();
        assert!(matches!(err, FaultsenseError::Inference { .. }));
    }

    #[test]
    fn test_marginalize_middle_variable() {
        let f = Factor {
            vars: vec![A, B, F],
            cards: vec![2, 3, 2],
            values: (0..12).map(f64::from).collect(),
        };
        let m = f.marginalize(B);
        assert_eq!(m.vars(), &[A, F]);
        // A=0,F=0: 0+2+4 ; A=0,F=1: 1+3+5 ; A=1,F=0: 6+8+10 ; A=1,F=1: 7+9+11
        assert_eq!(m.values(), &[6.0, 9.0, 24.0, 27.0]);
    }
}
