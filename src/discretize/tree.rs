//! Depth-limited CART classifier over a single feature, used by the
//! `decision_tree` binning strategy.
//!
//! The target is the binary collapse of the fault label (fault vs normal).
//! Only the split thresholds of internal nodes are of interest; they become
//! candidate bin boundaries.

/// Binary classification tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitNode {
    /// Internal node: `value <= threshold` goes left.
    Split {
        threshold: f64,
        left: Box<SplitNode>,
        right: Box<SplitNode>,
    },
    /// Leaf with its sample and positive-class counts.
    Leaf { n_samples: usize, positives: usize },
}

/// Gini impurity of a node with `positives` out of `total` positive samples.
///
/// Formula: Gini = 1 - `Σ(p_i²)` over the two classes.
#[must_use]
pub fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Best split of a slice sorted by value, as `(split_index, threshold)`.
///
/// Rows `[..split_index]` go left. Thresholds sit at the midpoint between
/// adjacent distinct values. Returns `None` when no split lowers impurity.
fn best_split(rows: &[(f64, bool)]) -> Option<(usize, f64)> {
    let n = rows.len();
    let total_pos = rows.iter().filter(|(_, y)| *y).count();
    let parent = gini(total_pos, n);

    let mut best: Option<(usize, f64)> = None;
    let mut best_impurity = parent;
    let mut left_pos = 0;

    for i in 1..n {
        if rows[i - 1].1 {
            left_pos += 1;
        }
        if rows[i - 1].0 >= rows[i].0 {
            continue;
        }
        let right_pos = total_pos - left_pos;
        let weighted = (i as f64 * gini(left_pos, i) + (n - i) as f64 * gini(right_pos, n - i))
            / n as f64;
        if weighted < best_impurity - 1e-12 {
            best_impurity = weighted;
            best = Some((i, (rows[i - 1].0 + rows[i].0) / 2.0));
        }
    }
    best
}

fn build(rows: &[(f64, bool)], depth: usize, max_depth: usize) -> SplitNode {
    let positives = rows.iter().filter(|(_, y)| *y).count();
    let leaf = SplitNode::Leaf {
        n_samples: rows.len(),
        positives,
    };
    if depth >= max_depth || rows.len() < 2 || positives == 0 || positives == rows.len() {
        return leaf;
    }
    match best_split(rows) {
        Some((idx, threshold)) => SplitNode::Split {
            threshold,
            left: Box::new(build(&rows[..idx], depth + 1, max_depth)),
            right: Box::new(build(&rows[idx..], depth + 1, max_depth)),
        },
        None => leaf,
    }
}

/// Single-feature decision tree classifier.
///
/// # Examples
///
/// ```
/// use faultsense::discretize::tree::SplitTree;
///
/// let values = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0];
/// let faults = [false, false, false, true, true, true];
/// let mut tree = SplitTree::new(3);
/// tree.fit(&values, &faults).unwrap();
/// assert_eq!(tree.thresholds(), vec![6.5]);
/// ```
#[derive(Debug, Clone)]
pub struct SplitTree {
    max_depth: usize,
    root: Option<SplitNode>,
}

impl SplitTree {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            root: None,
        }
    }

    /// Fits the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if inputs are empty or differ in length.
    pub fn fit(&mut self, values: &[f64], targets: &[bool]) -> Result<(), &'static str> {
        if values.is_empty() {
            return Err("Cannot fit with zero samples");
        }
        if values.len() != targets.len() {
            return Err("Values and targets must have the same length");
        }
        let mut rows: Vec<(f64, bool)> = values.iter().copied().zip(targets.iter().copied()).collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.root = Some(build(&rows, 0, self.max_depth));
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> Option<&SplitNode> {
        self.root.as_ref()
    }

    /// All internal-node thresholds, ascending.
    #[must_use]
    pub fn thresholds(&self) -> Vec<f64> {
        fn collect(node: &SplitNode, out: &mut Vec<f64>) {
            if let SplitNode::Split {
                threshold,
                left,
                right,
            } = node
            {
                out.push(*threshold);
                collect(left, out);
                collect(right, out);
            }
        }
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            collect(root, &mut out);
        }
        out.sort_by(f64::total_cmp);
        out
    }
}
