//! Fault rules: the rule table, deduplication, optimal-rule selection and
//! the rules CSV file.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::encoding;
use crate::error::{FaultsenseError, Result};
use crate::schema::FaultType;

const AND: &str = " ∧ ";
const ARROW: &str = " → ";

/// A fault-relevant association rule in display form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRule {
    /// Antecedent display labels: bin labels and `部门_<dept>` items.
    pub antecedent: Vec<String>,
    pub consequent: FaultType,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

impl FaultRule {
    /// One-line text form, e.g. `高振动 ∧ 高温 → 传动系统异常`.
    #[must_use]
    pub fn text(&self) -> String {
        format!(
            "{}{ARROW}{}",
            self.antecedent.join(AND),
            self.consequent.label()
        )
    }

    /// Parse the text form back into antecedent tokens and consequent.
    ///
    /// # Errors
    ///
    /// Returns an error if the arrow is missing, the antecedent is empty or
    /// the consequent is not a fault label.
    pub fn parse_text(text: &str) -> Result<(Vec<String>, FaultType)> {
        let (lhs, rhs) = text
            .split_once('→')
            .ok_or_else(|| FaultsenseError::invalid_parameter("rule", text, "'a ∧ b → fault'"))?;
        let antecedent: Vec<String> = lhs
            .split('∧')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if antecedent.is_empty() {
            return Err(FaultsenseError::invalid_parameter(
                "rule",
                text,
                "at least one antecedent condition",
            ));
        }
        let consequent: FaultType = rhs.trim().parse()?;
        if !consequent.is_fault() {
            return Err(FaultsenseError::invalid_parameter(
                "rule",
                text,
                "a fault label as consequent",
            ));
        }
        Ok((antecedent, consequent))
    }

    fn dedup_key(&self) -> (Vec<String>, FaultType) {
        let mut labels = self.antecedent.clone();
        labels.sort();
        (labels, self.consequent)
    }
}

impl fmt::Display for FaultRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (support={:.4}, confidence={:.4}, lift={:.2})",
            self.text(),
            self.support,
            self.confidence,
            self.lift
        )
    }
}

/// Sort by lift descending and collapse rules with the same sorted
/// antecedent labels and consequent, keeping the highest-lift one.
#[must_use]
pub fn dedup_rules(mut rules: Vec<FaultRule>) -> Vec<FaultRule> {
    rules.sort_by(|a, b| b.lift.total_cmp(&a.lift));
    let mut seen = HashSet::new();
    rules.retain(|r| seen.insert(r.dedup_key()));
    rules
}

pub(crate) fn mean_lift(rules: &[FaultRule]) -> f64 {
    if rules.is_empty() {
        return 0.0;
    }
    rules.iter().map(|r| r.lift).sum::<f64>() / rules.len() as f64
}

const HEADERS: [&str; 4] = ["规则", "支持度", "置信度", "提升度"];
const ENGLISH_HEADERS: [&str; 4] = ["rule", "support", "confidence", "lift"];

/// Ordered table of fault rules, as mined or as read from a rules file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<FaultRule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<FaultRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[FaultRule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FaultRule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn mean_lift(&self) -> f64 {
        mean_lift(&self.rules)
    }

    /// Rules meeting all three thresholds, sorted by lift descending.
    #[must_use]
    pub fn filter(&self, min_support: f64, min_confidence: f64, min_lift: f64) -> RuleSet {
        let kept = self
            .rules
            .iter()
            .filter(|r| {
                r.support >= min_support && r.confidence >= min_confidence && r.lift >= min_lift
            })
            .cloned()
            .collect();
        RuleSet::new(dedup_rules(kept))
    }

    /// Highest-lift rule for each fault type.
    #[must_use]
    pub fn best_per_fault(&self) -> BTreeMap<FaultType, FaultRule> {
        let mut best: BTreeMap<FaultType, FaultRule> = BTreeMap::new();
        for rule in &self.rules {
            match best.get(&rule.consequent) {
                Some(current) if current.lift >= rule.lift => {}
                _ => {
                    best.insert(rule.consequent, rule.clone());
                }
            }
        }
        best
    }

    /// Write the rules file (UTF-8, header `规则,支持度,置信度,提升度`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(HEADERS)?;
        for rule in &self.rules {
            writer.write_record([
                rule.text(),
                format!("{:.4}", rule.support),
                format!("{:.4}", rule.confidence),
                format!("{:.2}", rule.lift),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a rules file written by [`RuleSet::write_csv`] or with English
    /// headers. Rows whose rule text cannot be parsed, or whose support,
    /// confidence or lift is not a finite non-negative number, are skipped
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks a column.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<RuleSet> {
        let bytes = std::fs::read(path)?;
        let (text, _) = encoding::decode(&bytes)?;
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut idx = [0usize; 4];
        let mut missing = Vec::new();
        for (slot, (zh, en)) in idx.iter_mut().zip(HEADERS.iter().zip(ENGLISH_HEADERS)) {
            match headers
                .iter()
                .position(|h| h == zh || h.eq_ignore_ascii_case(en))
            {
                Some(i) => *slot = i,
                None => missing.push((*zh).to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(FaultsenseError::MissingColumns {
                missing,
                available: headers,
            });
        }

        let mut rules = Vec::new();
        for (i, row) in reader.records().enumerate() {
            let row = row?;
            // header is line 1
            let line = i + 2;
            let field = |i: usize| row.get(idx[i]).unwrap_or("").trim();
            let (antecedent, consequent) = match FaultRule::parse_text(field(0)) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(line, rule = field(0), error = %e, "skipping unreadable rule");
                    continue;
                }
            };
            let mut metrics = [0.0; 3];
            let mut bad = None;
            for (slot, col) in metrics.iter_mut().zip(1..4) {
                match field(col).parse::<f64>() {
                    Ok(v) if v.is_finite() && v >= 0.0 => *slot = v,
                    _ => {
                        bad = Some(col);
                        break;
                    }
                }
            }
            if let Some(col) = bad {
                warn!(
                    line,
                    column = HEADERS[col],
                    value = field(col),
                    "skipping rule with unreadable metric"
                );
                continue;
            }
            let [support, confidence, lift] = metrics;
            rules.push(FaultRule {
                antecedent,
                consequent,
                support,
                confidence,
                lift,
            });
        }
        Ok(RuleSet::new(rules))
    }
}

impl From<Vec<FaultRule>> for RuleSet {
    fn from(rules: Vec<FaultRule>) -> Self {
        Self::new(rules)
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a FaultRule;
    type IntoIter = std::slice::Iter<'a, FaultRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
