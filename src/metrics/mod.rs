//! Evaluation metrics for fault classification.
//!
//! [`ClassificationReport`] collects accuracy, per-class precision, recall
//! and F1, and the confusion matrix over the five fault labels.

pub mod classification;

use std::fmt;

use serde::Serialize;

use crate::schema::FaultType;
use classification::{accuracy, confusion_matrix, Average, ClassCounts};

/// How the evaluated rows relate to the rows the model was fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationScope {
    /// Rows held out from fitting.
    Holdout,
    /// The fitting rows themselves; scores are optimistic.
    InSample,
    /// A separate batch scored by the naive classifier.
    Batch,
}

impl fmt::Display for EvaluationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvaluationScope::Holdout => "holdout",
            EvaluationScope::InSample => "in-sample",
            EvaluationScope::Batch => "batch",
        })
    }
}

/// Scores of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScores {
    pub label: FaultType,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Classification report over [`FaultType::ALL`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub scope: EvaluationScope,
    pub samples: usize,
    pub accuracy: f64,
    pub per_class: Vec<ClassScores>,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    /// `confusion[t][p]`, rows and columns in [`FaultType::ALL`] order.
    pub confusion: Vec<Vec<usize>>,
}

fn class_index(fault: FaultType) -> usize {
    FaultType::ALL.iter().position(|f| *f == fault).unwrap_or(0)
}

impl ClassificationReport {
    /// Build from `(true, predicted)` pairs.
    #[must_use]
    pub fn from_pairs(scope: EvaluationScope, pairs: &[(FaultType, FaultType)]) -> Self {
        let y_true: Vec<usize> = pairs.iter().map(|(t, _)| class_index(*t)).collect();
        let y_pred: Vec<usize> = pairs.iter().map(|(_, p)| class_index(*p)).collect();
        let n_classes = FaultType::ALL.len();
        let counts = ClassCounts::tally(&y_pred, &y_true, n_classes);

        let per_class = FaultType::ALL
            .iter()
            .enumerate()
            .map(|(i, label)| ClassScores {
                label: *label,
                precision: counts.precision(i),
                recall: counts.recall(i),
                f1: counts.f1(i),
                support: counts.support[i],
            })
            .collect();

        // classes with no support and no predictions do not dilute the averages
        let present: Vec<usize> = (0..n_classes)
            .filter(|i| counts.support[*i] > 0 || counts.fp[*i] > 0)
            .collect();
        let macro_f1 = if present.is_empty() {
            0.0
        } else {
            present.iter().map(|i| counts.f1(*i)).sum::<f64>() / present.len() as f64
        };

        Self {
            scope,
            samples: pairs.len(),
            accuracy: accuracy(&y_pred, &y_true),
            per_class,
            macro_f1,
            weighted_f1: counts.average(ClassCounts::f1, Average::Weighted),
            confusion: confusion_matrix(&y_pred, &y_true, n_classes),
        }
    }

    #[must_use]
    pub fn class(&self, label: FaultType) -> Option<&ClassScores> {
        self.per_class.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "accuracy: {:.4} ({} samples, {})",
            self.accuracy, self.samples, self.scope
        )?;
        writeln!(
            f,
            "{:<14}{:>10}{:>10}{:>10}{:>9}",
            "label", "precision", "recall", "f1", "support"
        )?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:<14}{:>10.2}{:>10.2}{:>10.2}{:>9}",
                c.label.alias(),
                c.precision,
                c.recall,
                c.f1,
                c.support
            )?;
        }
        writeln!(f, "macro f1: {:.4}  weighted f1: {:.4}", self.macro_f1, self.weighted_f1)?;
        writeln!(f, "confusion (rows = true, columns = predicted):")?;
        for (label, row) in FaultType::ALL.iter().zip(&self.confusion) {
            let cells: Vec<String> = row.iter().map(|n| format!("{n:>6}")).collect();
            writeln!(f, "{:<14}{}", label.alias(), cells.join(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let pairs = vec![
            (FaultType::Normal, FaultType::Normal),
            (FaultType::Normal, FaultType::Cooling),
            (FaultType::Cooling, FaultType::Cooling),
            (FaultType::Electrical, FaultType::Normal),
        ];
        let report = ClassificationReport::from_pairs(EvaluationScope::Holdout, &pairs);
        assert_eq!(report.samples, 4);
        assert!((report.accuracy - 0.5).abs() < 1e-12);
        assert_eq!(report.confusion[0][1], 1);
        assert_eq!(report.confusion[3][0], 1);

        let cooling = report.class(FaultType::Cooling).unwrap();
        assert_eq!(cooling.support, 1);
        assert!((cooling.precision - 0.5).abs() < 1e-12);
        assert_eq!(cooling.recall, 1.0);
        // lubrication and transmission are absent and excluded from macro f1
        let expected_macro = (0.5 + 2.0 / 3.0 + 0.0) / 3.0;
        assert!((report.macro_f1 - expected_macro).abs() < 1e-12);
    }

    #[test]
    fn test_display_mentions_scope() {
        let pairs = vec![(FaultType::Normal, FaultType::Normal)];
        let text = ClassificationReport::from_pairs(EvaluationScope::InSample, &pairs).to_string();
        assert!(text.contains("in-sample"));
        assert!(text.contains("accuracy: 1.0000"));
        assert!(text.contains("transmission"));
    }

    #[test]
    fn test_empty_report() {
        let report = ClassificationReport::from_pairs(EvaluationScope::Batch, &[]);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.macro_f1, 0.0);
    }
}
