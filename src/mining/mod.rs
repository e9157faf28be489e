//! Association rule mining between discretized sensor states and fault
//! labels.
//!
//! # Pipeline
//!
//! 1. [`build_transactions`]: one item set per discretized record
//! 2. [`ItemMatrix`]: one-hot item presence over all transactions
//! 3. [`Apriori`]: frequent itemsets (min support, max length) and
//!    association rules scored by lift (min lift)
//! 4. [`mine`]: keep fault-relevant rules at min confidence, sort by lift,
//!    deduplicate by displayed text
//!
//! # Example
//!
//! ```
//! use faultsense::mining::{mine, MiningThresholds, Transaction};
//!
//! let tx = |items: &[&str]| -> Transaction { items.iter().map(|s| s.to_string()).collect() };
//! let mut transactions = Vec::new();
//! for _ in 0..8 {
//!     transactions.push(tx(&["部门_生产部", "temp=高温", "故障_散热系统故障"]));
//!     transactions.push(tx(&["部门_生产部", "temp=中温", "正常运行"]));
//! }
//! let thresholds = MiningThresholds { min_support: 0.1, min_lift: 1.2, ..Default::default() };
//! let outcome = mine(&transactions, &thresholds).unwrap();
//! assert_eq!(outcome.rules[0].text(), "高温 → 散热系统故障");
//! ```

pub mod rules;
pub mod transactions;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FaultsenseError, Result};
use crate::schema::FaultType;
pub use rules::{dedup_rules, FaultRule, RuleSet};
pub use transactions::{build_transactions, display_label, is_fault_item, ItemMatrix, Transaction};

/// Association rule over item ids: antecedent => consequent
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRule {
    /// Items in the antecedent (left side)
    pub antecedent: Vec<usize>,
    /// Items in the consequent (right side)
    pub consequent: Vec<usize>,
    /// Support: P(antecedent ∪ consequent)
    pub support: f64,
    /// Confidence: P(consequent | antecedent) = support / P(antecedent)
    pub confidence: f64,
    /// Lift: confidence / P(consequent)
    pub lift: f64,
}

/// Apriori frequent itemset mining with lift-scored rule generation.
///
/// # Algorithm
///
/// 1. Find frequent 1-itemsets (support >= `min_support`)
/// 2. Join frequent (k-1)-itemsets sharing a (k-2)-prefix into candidates
/// 3. Prune candidates with an infrequent subset, then by support
/// 4. Repeat until no candidates remain or `max_len` is reached
/// 5. Generate every antecedent/consequent split of each frequent itemset
/// 6. Keep rules with lift >= `min_lift`
#[derive(Debug, Clone)]
pub struct Apriori {
    min_support: f64,
    min_lift: f64,
    max_len: usize,
    frequent_itemsets: Vec<(Vec<usize>, f64)>,
    rules: Vec<AssociationRule>,
}

impl Apriori {
    /// Create a new Apriori instance.
    ///
    /// # Default Parameters
    ///
    /// - `min_support`: 0.05
    /// - `min_lift`: 1.0
    /// - `max_len`: 5
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_support: 0.05,
            min_lift: 1.0,
            max_len: 5,
            frequent_itemsets: Vec::new(),
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    #[must_use]
    pub fn with_min_lift(mut self, min_lift: f64) -> Self {
        self.min_lift = min_lift;
        self
    }

    /// Cap on itemset length.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    fn frequent_singletons(&self, matrix: &ItemMatrix) -> Vec<(Vec<usize>, f64)> {
        (0..matrix.n_items())
            .map(|item| (vec![item], matrix.support(&[item])))
            .filter(|(_, support)| *support >= self.min_support)
            .collect()
    }

    /// Join step over itemsets sorted lexicographically: two (k-1)-itemsets
    /// sharing their first k-2 items produce one k-candidate.
    fn generate_candidates(prev: &[(Vec<usize>, f64)]) -> Vec<Vec<usize>> {
        let known: HashSet<&[usize]> = prev.iter().map(|(s, _)| s.as_slice()).collect();
        let mut candidates = Vec::new();

        for (i, (a, _)) in prev.iter().enumerate() {
            let prefix = &a[..a.len() - 1];
            for (b, _) in &prev[i + 1..] {
                if &b[..b.len() - 1] != prefix {
                    break;
                }
                let mut candidate = a.clone();
                candidate.push(b[b.len() - 1]);
                if !Self::has_infrequent_subset(&candidate, &known) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    fn has_infrequent_subset(candidate: &[usize], known: &HashSet<&[usize]>) -> bool {
        (0..candidate.len()).any(|skip| {
            let subset: Vec<usize> = candidate
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, item)| *item)
                .collect();
            !known.contains(subset.as_slice())
        })
    }

    fn generate_rules(&mut self) {
        let supports: HashMap<&[usize], f64> = self
            .frequent_itemsets
            .iter()
            .map(|(s, sup)| (s.as_slice(), *sup))
            .collect();
        let mut rules = Vec::new();

        for (itemset, support) in &self.frequent_itemsets {
            let n = itemset.len();
            if n < 2 {
                continue;
            }
            // every non-empty proper subset as antecedent
            for mask in 1..(1u32 << n) - 1 {
                let (antecedent, consequent): (Vec<usize>, Vec<usize>) = itemset
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (mask & (1 << i) != 0, *item))
                    .fold((Vec::new(), Vec::new()), |(mut a, mut c), (in_a, item)| {
                        if in_a {
                            a.push(item);
                        } else {
                            c.push(item);
                        }
                        (a, c)
                    });
                // subsets of frequent itemsets are frequent, so both are known
                let (Some(sa), Some(sc)) = (
                    supports.get(antecedent.as_slice()),
                    supports.get(consequent.as_slice()),
                ) else {
                    continue;
                };
                let confidence = support / sa;
                let lift = confidence / sc;
                if lift >= self.min_lift {
                    rules.push(AssociationRule {
                        antecedent,
                        consequent,
                        support: *support,
                        confidence,
                        lift,
                    });
                }
            }
        }
        self.rules = rules;
    }

    /// Fit on an item matrix.
    pub fn fit(&mut self, matrix: &ItemMatrix) {
        self.frequent_itemsets = Vec::new();
        self.rules = Vec::new();
        if matrix.n_transactions() == 0 || self.max_len == 0 {
            return;
        }

        let mut current = self.frequent_singletons(matrix);
        while !current.is_empty() {
            self.frequent_itemsets.extend(current.iter().cloned());
            if current[0].0.len() >= self.max_len {
                break;
            }
            current = Self::generate_candidates(&current)
                .into_iter()
                .map(|c| {
                    let support = matrix.support(&c);
                    (c, support)
                })
                .filter(|(_, support)| *support >= self.min_support)
                .collect();
        }

        self.generate_rules();

        self.frequent_itemsets
            .sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        self.rules.sort_by(|a, b| b.lift.total_cmp(&a.lift));
    }

    /// Frequent itemsets sorted by support descending.
    #[must_use]
    pub fn get_frequent_itemsets(&self) -> &[(Vec<usize>, f64)] {
        &self.frequent_itemsets
    }

    /// Rules sorted by lift descending.
    #[must_use]
    pub fn get_rules(&self) -> &[AssociationRule] {
        &self.rules
    }
}

impl Default for Apriori {
    fn default() -> Self {
        Self::new()
    }
}

/// Thresholds for one mining run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningThresholds {
    pub min_support: f64,
    pub min_lift: f64,
    pub min_confidence: f64,
    pub max_itemset_len: usize,
}

impl Default for MiningThresholds {
    fn default() -> Self {
        Self {
            min_support: 0.05,
            min_lift: 2.0,
            min_confidence: 0.5,
            max_itemset_len: 5,
        }
    }
}

impl MiningThresholds {
    /// # Errors
    ///
    /// Returns an error when a threshold is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(FaultsenseError::invalid_parameter(
                "min_support",
                self.min_support,
                "a value in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(FaultsenseError::invalid_parameter(
                "min_confidence",
                self.min_confidence,
                "a value in [0, 1]",
            ));
        }
        if !(self.min_lift >= 0.0) {
            return Err(FaultsenseError::invalid_parameter(
                "min_lift",
                self.min_lift,
                "a non-negative value",
            ));
        }
        if self.max_itemset_len < 2 {
            return Err(FaultsenseError::invalid_parameter(
                "max_itemset_len",
                self.max_itemset_len,
                ">= 2",
            ));
        }
        Ok(())
    }
}

/// Why a mining run produced no rules, if it did not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningStatus {
    Found,
    NoFrequentItemsets,
    NoAssociationRules,
    NoFaultRules,
}

impl MiningStatus {
    /// Actionable description of the outcome.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            MiningStatus::Found => "fault rules found",
            MiningStatus::NoFrequentItemsets => {
                "no frequent itemsets: lower min_support"
            }
            MiningStatus::NoAssociationRules => {
                "no association rules above min_lift: lower min_lift or min_support"
            }
            MiningStatus::NoFaultRules => {
                "no fault rules above min_confidence: lower min_confidence or min_lift"
            }
        }
    }
}

/// Result of one mining run.
#[derive(Debug, Clone, Serialize)]
pub struct MiningOutcome {
    pub status: MiningStatus,
    pub frequent_itemsets: usize,
    pub association_rules: usize,
    /// Fault rules, lift descending, deduplicated.
    pub rules: Vec<FaultRule>,
}

impl MiningOutcome {
    fn empty(status: MiningStatus, frequent_itemsets: usize, association_rules: usize) -> Self {
        Self {
            status,
            frequent_itemsets,
            association_rules,
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn mean_lift(&self) -> f64 {
        rules::mean_lift(&self.rules)
    }
}

/// Convert a rule over item ids into a fault rule, if it is fault-relevant:
/// a single fault item as consequent and no fault item in the antecedent.
fn to_fault_rule(rule: &AssociationRule, matrix: &ItemMatrix) -> Option<FaultRule> {
    let [consequent] = rule.consequent.as_slice() else {
        return None;
    };
    let fault = FaultType::from_fault_item(matrix.item(*consequent))?;
    if rule.antecedent.iter().any(|i| is_fault_item(matrix.item(*i))) {
        return None;
    }
    let antecedent = rule
        .antecedent
        .iter()
        .map(|i| display_label(matrix.item(*i)).to_string())
        .collect();
    Some(FaultRule {
        antecedent,
        consequent: fault,
        support: rule.support,
        confidence: rule.confidence,
        lift: rule.lift,
    })
}

/// Mine fault rules from transactions.
///
/// Degenerate outcomes are not errors: the returned status says which stage
/// came up empty.
///
/// # Errors
///
/// Returns an error if the thresholds are out of range.
pub fn mine(transactions: &[Transaction], thresholds: &MiningThresholds) -> Result<MiningOutcome> {
    thresholds.validate()?;
    let matrix = ItemMatrix::from_transactions(transactions);

    let mut apriori = Apriori::new()
        .with_min_support(thresholds.min_support)
        .with_min_lift(thresholds.min_lift)
        .with_max_len(thresholds.max_itemset_len);
    apriori.fit(&matrix);

    let n_itemsets = apriori.get_frequent_itemsets().len();
    let n_rules = apriori.get_rules().len();
    debug!(
        transactions = matrix.n_transactions(),
        items = matrix.n_items(),
        itemsets = n_itemsets,
        rules = n_rules,
        "apriori finished"
    );
    if n_itemsets == 0 {
        return Ok(MiningOutcome::empty(MiningStatus::NoFrequentItemsets, 0, 0));
    }
    if n_rules == 0 {
        return Ok(MiningOutcome::empty(
            MiningStatus::NoAssociationRules,
            n_itemsets,
            0,
        ));
    }

    let fault_rules: Vec<FaultRule> = apriori
        .get_rules()
        .iter()
        .filter(|r| r.confidence >= thresholds.min_confidence)
        .filter_map(|r| to_fault_rule(r, &matrix))
        .collect();
    let rules = dedup_rules(fault_rules);
    if rules.is_empty() {
        return Ok(MiningOutcome::empty(
            MiningStatus::NoFaultRules,
            n_itemsets,
            n_rules,
        ));
    }

    Ok(MiningOutcome {
        status: MiningStatus::Found,
        frequent_itemsets: n_itemsets,
        association_rules: n_rules,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(items: &[&str]) -> Transaction {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn matrix(rows: &[&[&str]]) -> ItemMatrix {
        let tx: Vec<Transaction> = rows.iter().map(|r| tx(r)).collect();
        ItemMatrix::from_transactions(&tx)
    }

    #[test]
    fn test_frequent_itemsets() {
        let m = matrix(&[&["1", "2", "3"], &["1", "2"], &["1", "3"], &["2", "3"]]);
        let mut apriori = Apriori::new().with_min_support(0.5);
        apriori.fit(&m);

        let itemsets = apriori.get_frequent_itemsets();
        // {1},{2},{3} at 75% and the three pairs at 50%; {1,2,3} is 25%
        assert_eq!(itemsets.len(), 6);
        assert!(itemsets.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(itemsets.iter().all(|(s, _)| s.len() <= 2));
    }

    #[test]
    fn test_max_len_caps_itemsets() {
        let m = matrix(&[&["a", "b", "c"], &["a", "b", "c"]]);
        let mut apriori = Apriori::new().with_min_support(0.5).with_max_len(2);
        apriori.fit(&m);
        assert!(apriori.get_frequent_itemsets().iter().all(|(s, _)| s.len() <= 2));
        assert_eq!(apriori.get_frequent_itemsets().len(), 6);
    }

    #[test]
    fn test_lift_and_confidence() {
        // a and b always together in half the transactions
        let m = matrix(&[&["a", "b"], &["a", "b"], &["c"], &["c"]]);
        let mut apriori = Apriori::new().with_min_support(0.25).with_min_lift(1.5);
        apriori.fit(&m);
        let rules = apriori.get_rules();
        // a->b and b->a: confidence 1, lift 1 / 0.5 = 2
        assert_eq!(rules.len(), 2);
        for rule in rules {
            assert!((rule.confidence - 1.0).abs() < 1e-12);
            assert!((rule.lift - 2.0).abs() < 1e-12);
            assert!((rule.support - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_min_lift_filters_independent_items() {
        // x appears everywhere, so x -> y has lift exactly 1
        let m = matrix(&[&["x", "y"], &["x"], &["x", "y"], &["x"]]);
        let mut apriori = Apriori::new().with_min_support(0.25).with_min_lift(1.01);
        apriori.fit(&m);
        assert!(apriori.get_rules().is_empty());
    }

    #[test]
    fn test_empty_matrix() {
        let m = ItemMatrix::from_transactions(&[]);
        let mut apriori = Apriori::new();
        apriori.fit(&m);
        assert!(apriori.get_frequent_itemsets().is_empty());
        assert!(apriori.get_rules().is_empty());
    }

    #[test]
    fn test_mine_keeps_only_fault_rules() {
        let mut transactions = Vec::new();
        for _ in 0..10 {
            transactions.push(tx(&["部门_生产部", "vibration=高振动", "故障_传动系统异常"]));
            transactions.push(tx(&["部门_研发部", "vibration=中振动", "正常运行"]));
        }
        let thresholds = MiningThresholds {
            min_support: 0.1,
            min_lift: 1.2,
            min_confidence: 0.5,
            max_itemset_len: 5,
        };
        let outcome = mine(&transactions, &thresholds).unwrap();
        assert_eq!(outcome.status, MiningStatus::Found);
        assert!(outcome.association_rules > outcome.rules.len());
        for rule in &outcome.rules {
            assert_eq!(rule.consequent, FaultType::Transmission);
            assert!(rule.antecedent.iter().all(|a| !a.contains("故障")));
        }
        let texts: Vec<String> = outcome.rules.iter().map(FaultRule::text).collect();
        assert!(texts.contains(&"高振动 → 传动系统异常".to_string()));
        assert!(texts.contains(&"部门_生产部 → 传动系统异常".to_string()));
        assert!(texts.contains(&"高振动 ∧ 部门_生产部 → 传动系统异常".to_string()));
        assert!((outcome.mean_lift() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mine_degenerate_outcomes() {
        let transactions: Vec<Transaction> = (0..10)
            .map(|i| tx(&[format!("部门_{i}").as_str(), "正常运行"]))
            .collect();

        let strict = MiningThresholds {
            min_support: 0.5,
            min_lift: 1.0,
            ..Default::default()
        };
        // only the normal marker is frequent, so there is nothing to pair
        let outcome = mine(&transactions, &strict).unwrap();
        assert_eq!(outcome.status, MiningStatus::NoAssociationRules);

        let no_support = MiningThresholds {
            min_support: 1.0,
            ..Default::default()
        };
        let outcome = mine(&transactions[..0], &no_support).unwrap();
        assert_eq!(outcome.status, MiningStatus::NoFrequentItemsets);
        assert!(outcome.status.message().contains("min_support"));

        let loose = MiningThresholds {
            min_support: 0.1,
            min_lift: 1.0,
            ..Default::default()
        };
        let outcome = mine(&transactions, &loose).unwrap();
        assert_eq!(outcome.status, MiningStatus::NoFaultRules);
        assert!(outcome.rules.is_empty());
    }

    #[test]
    fn test_threshold_validation() {
        let bad = MiningThresholds {
            min_support: 0.0,
            ..Default::default()
        };
        assert!(mine(&[], &bad).is_err());
        let bad = MiningThresholds {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = MiningThresholds {
            max_itemset_len: 1,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
