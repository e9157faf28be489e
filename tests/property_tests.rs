//! Property-based tests using proptest.
//!
//! These tests verify invariants of binning, bin lookup and rule metrics.

use faultsense::data::{Dataset, Readings, SensorRecord};
use faultsense::discretize::{
    compute_bins, compute_bins_supervised, BinConfig, FeatureBins, Strategy as BinStrategy,
};
use faultsense::mining::{build_transactions, mine, MiningThresholds};
use faultsense::schema::{FaultType, Feature};
use proptest::prelude::*;

// Values on a half-unit grid with at least two distinct points
fn column_strategy() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec((-2000i32..2000).prop_map(|v| f64::from(v) * 0.5), 2..200).prop_filter(
        "needs two distinct values",
        |values| values.iter().any(|v| *v != values[0]),
    )
}

fn strategy_strategy() -> impl Strategy<Value = BinStrategy> {
    proptest::sample::select(BinStrategy::ALL.to_vec())
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn bins_are_strictly_increasing_and_span_the_column(
        values in column_strategy(),
        strategy in strategy_strategy(),
        num_bins in 2usize..8,
    ) {
        let bins = compute_bins(&values, num_bins, strategy).unwrap();
        let (min, max) = min_max(&values);
        prop_assert_eq!(bins.len(), num_bins + 1);
        prop_assert!(bins.windows(2).all(|w| w[0] < w[1]), "{:?}", bins);
        prop_assert_eq!(bins[0], min);
        prop_assert_eq!(bins[num_bins], max);
    }

    #[test]
    fn supervised_bins_keep_the_same_shape(
        values in column_strategy(),
        seed in any::<u64>(),
    ) {
        let target: Vec<bool> = values
            .iter()
            .enumerate()
            .map(|(i, _)| (seed >> (i % 64)) & 1 == 1)
            .collect();
        let bins = compute_bins_supervised(&values, Some(&target), 5, BinStrategy::DecisionTree).unwrap();
        prop_assert_eq!(bins.len(), 6);
        prop_assert!(bins.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn every_value_resolves_to_a_bin(
        values in column_strategy(),
        strategy in strategy_strategy(),
    ) {
        let bins = compute_bins(&values, 5, strategy).unwrap();
        let feature_bins = FeatureBins::new(bins.clone(), Feature::Temp.labels(5)).unwrap();

        // internal boundaries are left-closed
        for (i, b) in bins.iter().enumerate().take(5).skip(1) {
            prop_assert_eq!(feature_bins.bin_index(*b), Some(i));
        }
        prop_assert_eq!(feature_bins.bin_index(bins[5]), Some(4));
        for v in &values {
            let index = feature_bins.bin_index(*v).unwrap();
            prop_assert!(index < 5);
            prop_assert!(bins[index] <= *v);
        }
        prop_assert_eq!(feature_bins.bin_index(f64::NAN), None);
        prop_assert_eq!(feature_bins.bin_index(bins[0] - 1e6), Some(0));
        prop_assert_eq!(feature_bins.bin_index(bins[5] + 1e6), Some(4));
    }

    #[test]
    fn mined_rule_metrics_are_consistent(
        temps in proptest::collection::vec(0u8..3, 40..120),
        faults in proptest::collection::vec(0u8..3, 120),
    ) {
        let records: Vec<SensorRecord> = temps
            .iter()
            .zip(&faults)
            .map(|(t, f)| {
                let readings = Readings {
                    temp: 40.0 + 30.0 * f64::from(*t),
                    vibration: 2.0,
                    oil_pressure: 10.0,
                    voltage: 220.0,
                    rpm: 2000.0,
                };
                let fault = [FaultType::Normal, FaultType::Cooling, FaultType::Electrical][usize::from(*f)];
                SensorRecord::unlabeled("生产部", readings).with_fault(fault)
            })
            .collect();
        let dataset = Dataset::from_records(records);
        let bins = BinConfig::fit(&dataset, 3, BinStrategy::EqualWidth).unwrap();
        let transactions = build_transactions(&bins.discretize(&dataset));
        let thresholds = MiningThresholds {
            min_support: 0.05,
            min_lift: 1.0,
            min_confidence: 0.3,
            max_itemset_len: 3,
        };
        let outcome = mine(&transactions, &thresholds).unwrap();
        for rule in &outcome.rules {
            prop_assert!(rule.support >= thresholds.min_support - 1e-12);
            prop_assert!(rule.confidence >= thresholds.min_confidence - 1e-12);
            prop_assert!(rule.confidence <= 1.0 + 1e-12);
            prop_assert!(rule.lift >= thresholds.min_lift - 1e-12);
            prop_assert!(rule.support <= rule.confidence + 1e-12);
            prop_assert!(!rule.antecedent.is_empty());
        }
    }
}
