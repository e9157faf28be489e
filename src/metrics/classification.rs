//! Classification metrics over class indices.
//!
//! Provides accuracy, per-class precision/recall/F1 and the confusion
//! matrix. Labels are indices into a class list held by the caller.

/// Averaging strategy for multi-class metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Average {
    /// Unweighted mean over classes.
    Macro,
    /// Global TP / FP / FN counts.
    Micro,
    /// Mean weighted by support (number of true instances per class).
    Weighted,
}

/// Per-class tallies from one pass over the predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCounts {
    pub tp: Vec<usize>,
    pub fp: Vec<usize>,
    pub fn_counts: Vec<usize>,
    pub support: Vec<usize>,
}

impl ClassCounts {
    /// Tally `n_classes` classes. Indices outside the range are ignored.
    #[must_use]
    pub fn tally(y_pred: &[usize], y_true: &[usize], n_classes: usize) -> Self {
        let mut counts = Self {
            tp: vec![0; n_classes],
            fp: vec![0; n_classes],
            fn_counts: vec![0; n_classes],
            support: vec![0; n_classes],
        };
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t >= n_classes || p >= n_classes {
                continue;
            }
            counts.support[t] += 1;
            if t == p {
                counts.tp[t] += 1;
            } else {
                counts.fp[p] += 1;
                counts.fn_counts[t] += 1;
            }
        }
        counts
    }

    #[must_use]
    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.tp[class], self.tp[class] + self.fp[class])
    }

    #[must_use]
    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.tp[class], self.tp[class] + self.fn_counts[class])
    }

    #[must_use]
    pub fn f1(&self, class: usize) -> f64 {
        f1_from_prec_rec(self.precision(class), self.recall(class))
    }

    /// Average of a per-class metric.
    #[must_use]
    pub fn average(&self, metric: impl Fn(&Self, usize) -> f64, average: Average) -> f64 {
        let n = self.support.len();
        if n == 0 {
            return 0.0;
        }
        match average {
            Average::Macro => (0..n).map(|i| metric(self, i)).sum::<f64>() / n as f64,
            Average::Weighted => {
                let total: usize = self.support.iter().sum();
                if total == 0 {
                    return 0.0;
                }
                (0..n)
                    .map(|i| metric(self, i) * self.support[i] as f64 / total as f64)
                    .sum()
            }
            Average::Micro => {
                // precision, recall and F1 coincide when pooled over all classes
                let tp: usize = self.tp.iter().sum();
                let fp: usize = self.fp.iter().sum();
                ratio(tp, tp + fp)
            }
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1_from_prec_rec(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Fraction of predictions equal to the true label; 0 for no samples.
///
/// # Examples
///
/// ```
/// use faultsense::metrics::classification::accuracy;
///
/// let y_true = vec![0, 1, 2, 0, 1, 2];
/// let y_pred = vec![0, 2, 1, 0, 0, 1];
/// assert!((accuracy(&y_pred, &y_true) - 1.0 / 3.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    let correct = y_pred.iter().zip(y_true).filter(|(p, t)| p == t).count();
    ratio(correct, n)
}

/// Confusion matrix: `cm[t][p]` counts samples of true class `t`
/// predicted as `p`.
///
/// # Examples
///
/// ```
/// use faultsense::metrics::classification::confusion_matrix;
///
/// let cm = confusion_matrix(&[0, 1, 1, 1, 2, 0], &[0, 0, 1, 1, 2, 2], 3);
/// assert_eq!(cm, vec![vec![1, 1, 0], vec![0, 2, 0], vec![1, 0, 1]]);
/// ```
#[must_use]
pub fn confusion_matrix(y_pred: &[usize], y_true: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut cm = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            cm[t][p] += 1;
        }
    }
    cm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = vec![0, 1, 2, 2, 1];
        let counts = ClassCounts::tally(&y, &y, 3);
        assert_eq!(accuracy(&y, &y), 1.0);
        for class in 0..3 {
            assert_eq!(counts.f1(class), 1.0);
        }
    }

    #[test]
    fn test_per_class_scores() {
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        let counts = ClassCounts::tally(&y_pred, &y_true, 2);
        assert_eq!(counts.precision(0), 1.0);
        assert_eq!(counts.recall(0), 0.5);
        assert!((counts.precision(1) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(counts.recall(1), 1.0);
        assert!((counts.f1(0) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_averages() {
        let y_true = vec![0, 0, 0, 1];
        let y_pred = vec![0, 0, 1, 1];
        let counts = ClassCounts::tally(&y_pred, &y_true, 2);
        let macro_recall = counts.average(ClassCounts::recall, Average::Macro);
        assert!((macro_recall - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-12);
        let weighted_recall = counts.average(ClassCounts::recall, Average::Weighted);
        assert!((weighted_recall - 0.75).abs() < 1e-12);
        assert!((counts.average(ClassCounts::precision, Average::Micro) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_class_without_predictions_scores_zero() {
        let counts = ClassCounts::tally(&[0, 0], &[0, 1], 3);
        assert_eq!(counts.precision(2), 0.0);
        assert_eq!(counts.recall(2), 0.0);
        assert_eq!(counts.f1(1), 0.0);
    }

    #[test]
    fn test_empty_accuracy() {
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
