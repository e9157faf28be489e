//! Transactions and their one-hot item matrix.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::discretize::DiscreteRow;
use crate::schema::{DEPARTMENT_PREFIX, FAULT_PREFIX};

/// Set of symbolic items derived from one discretized record.
pub type Transaction = BTreeSet<String>;

/// Build one transaction per row.
///
/// Each transaction holds the department item (`部门_<dept>`), the label
/// item (`正常运行` or `故障_<fault>`), and `feature=label` for every
/// feature with a level. Rows without a department or label are skipped
/// with a warning.
#[must_use]
pub fn build_transactions(rows: &[DiscreteRow]) -> Vec<Transaction> {
    let mut skipped = 0usize;
    let transactions: Vec<Transaction> = rows
        .iter()
        .filter_map(|row| {
            let Some(fault) = row.fault else {
                skipped += 1;
                return None;
            };
            if row.department.is_empty() {
                skipped += 1;
                return None;
            }
            let mut items = Transaction::new();
            items.insert(format!("{DEPARTMENT_PREFIX}{}", row.department));
            items.insert(fault.item());
            for (feature, label) in &row.levels {
                items.insert(format!("{feature}={label}"));
            }
            Some(items)
        })
        .collect();
    if skipped > 0 {
        warn!(skipped, "rows without department or label left out of transactions");
    }
    transactions
}

/// Display form of an item: feature items show only their category label.
#[must_use]
pub fn display_label(item: &str) -> &str {
    item.split_once('=').map_or(item, |(_, label)| label)
}

/// Whether an item marks a fault label.
#[must_use]
pub fn is_fault_item(item: &str) -> bool {
    item.starts_with(FAULT_PREFIX)
}

/// Boolean item-presence matrix, stored column-wise as bitsets.
///
/// Items are indexed in sorted order over the union of all transactions.
#[derive(Debug, Clone)]
pub struct ItemMatrix {
    items: Vec<String>,
    columns: Vec<Vec<u64>>,
    n_rows: usize,
}

impl ItemMatrix {
    #[must_use]
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let index: BTreeMap<&str, usize> = transactions
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, item)| (item, i))
            .collect();

        let n_rows = transactions.len();
        let words = n_rows.div_ceil(64);
        let mut columns = vec![vec![0u64; words]; index.len()];
        for (row, transaction) in transactions.iter().enumerate() {
            for item in transaction {
                let col = index[item.as_str()];
                columns[col][row / 64] |= 1 << (row % 64);
            }
        }

        Self {
            items: index.keys().map(|s| (*s).to_string()).collect(),
            columns,
            n_rows,
        }
    }

    #[must_use]
    pub fn n_transactions(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn item(&self, id: usize) -> &str {
        &self.items[id]
    }

    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, row: usize, item: usize) -> bool {
        self.columns[item][row / 64] & (1 << (row % 64)) != 0
    }

    /// Number of transactions containing every item of `itemset`.
    #[must_use]
    pub fn support_count(&self, itemset: &[usize]) -> usize {
        let Some((first, rest)) = itemset.split_first() else {
            return self.n_rows;
        };
        self.columns[*first]
            .iter()
            .enumerate()
            .map(|(w, word)| {
                rest.iter()
                    .fold(*word, |acc, item| acc & self.columns[*item][w])
                    .count_ones() as usize
            })
            .sum()
    }

    /// Fraction of transactions containing every item of `itemset`.
    #[must_use]
    pub fn support(&self, itemset: &[usize]) -> f64 {
        if self.n_rows == 0 {
            return 0.0;
        }
        self.support_count(itemset) as f64 / self.n_rows as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FaultType, Feature};

    fn row(dept: &str, temp: Option<&str>, fault: Option<FaultType>) -> DiscreteRow {
        let mut levels = BTreeMap::new();
        if let Some(t) = temp {
            levels.insert(Feature::Temp, t.to_string());
        }
        levels.insert(Feature::Rpm, "中转速".to_string());
        DiscreteRow {
            department: dept.to_string(),
            levels,
            fault,
        }
    }

    #[test]
    fn test_transaction_items() {
        let rows = vec![
            row("生产部", Some("高温"), Some(FaultType::Cooling)),
            row("研发部", None, Some(FaultType::Normal)),
        ];
        let tx = build_transactions(&rows);
        assert_eq!(tx.len(), 2);
        assert!(tx[0].contains("部门_生产部"));
        assert!(tx[0].contains("故障_散热系统故障"));
        assert!(tx[0].contains("temp=高温"));
        assert!(tx[0].contains("rpm=中转速"));
        assert_eq!(tx[0].len(), 4);
        // missing level contributes no item; normal rows get the normal marker
        assert_eq!(tx[1].len(), 3);
        assert!(tx[1].contains("正常运行"));
    }

    #[test]
    fn test_rows_without_label_or_department_are_skipped() {
        let rows = vec![
            row("生产部", Some("高温"), None),
            row("", Some("高温"), Some(FaultType::Cooling)),
            row("质检部", Some("低温"), Some(FaultType::Normal)),
        ];
        assert_eq!(build_transactions(&rows).len(), 1);
    }

    #[test]
    fn test_display_label_and_fault_marker() {
        assert_eq!(display_label("vibration=高振动"), "高振动");
        assert_eq!(display_label("部门_维修部"), "部门_维修部");
        assert!(is_fault_item("故障_传动系统异常"));
        assert!(!is_fault_item("正常运行"));
    }

    #[test]
    fn test_item_matrix_support() {
        let tx: Vec<Transaction> = vec![
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect(),
            ["a", "b"].iter().map(|s| s.to_string()).collect(),
            ["a", "c"].iter().map(|s| s.to_string()).collect(),
            ["b", "c"].iter().map(|s| s.to_string()).collect(),
        ];
        let m = ItemMatrix::from_transactions(&tx);
        assert_eq!(m.n_items(), 3);
        assert_eq!(m.item(0), "a");
        assert_eq!(m.support_count(&[0]), 3);
        assert_eq!(m.support_count(&[0, 1]), 2);
        assert_eq!(m.support_count(&[0, 1, 2]), 1);
        assert!((m.support(&[1, 2]) - 0.5).abs() < 1e-12);
        assert!(m.contains(3, 2));
        assert!(!m.contains(3, 0));
    }

    #[test]
    fn test_item_matrix_spans_multiple_words() {
        let tx: Vec<Transaction> = (0..130)
            .map(|i| {
                let mut t = Transaction::new();
                t.insert("x".to_string());
                if i % 2 == 0 {
                    t.insert("even".to_string());
                }
                t
            })
            .collect();
        let m = ItemMatrix::from_transactions(&tx);
        assert_eq!(m.support_count(&[0]), 65);
        assert_eq!(m.support_count(&[1]), 130);
        assert_eq!(m.support_count(&[]), 130);
    }
}
