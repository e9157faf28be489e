//! Integration tests for faultsense.
//!
//! These tests verify end-to-end workflows combining multiple components.

use faultsense::mining::{build_transactions, mine};
use faultsense::optimize::{select_best, StrategyTrial};
use faultsense::pipeline::ValidationMode;
use faultsense::predict::is_low_confidence;
use faultsense::prelude::*;
use faultsense::schema::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const DEPARTMENTS: [&str; 4] = ["生产部", "研发部", "质检部", "维修部"];

fn random_label(rng: &mut StdRng) -> FaultType {
    if rng.gen_bool(0.7) {
        FaultType::Normal
    } else {
        [FaultType::Cooling, FaultType::Lubrication, FaultType::Electrical][rng.gen_range(0..3)]
    }
}

/// 1000 rows. 8% carry high temperature and high vibration together and
/// are labeled transmission; another 8% each have only one of the two
/// high. Everything else, labels included, is random.
fn injected_rule_dataset() -> Dataset {
    let mut rng = StdRng::seed_from_u64(7);
    let records = (0..1000)
        .map(|i| {
            let (hot, shaking) = match i % 25 {
                0 | 1 => (true, true),
                2 | 3 => (true, false),
                4 | 5 => (false, true),
                _ => (false, false),
            };
            let readings = Readings {
                temp: if hot { rng.gen_range(92.0..100.0) } else { rng.gen_range(40.0..80.0) },
                vibration: if shaking { rng.gen_range(6.2..7.0) } else { rng.gen_range(1.0..3.0) },
                oil_pressure: rng.gen_range(6.0..14.0),
                voltage: rng.gen_range(200.0..240.0),
                rpm: rng.gen_range(1500.0..2500.0),
            };
            let fault = if hot && shaking {
                FaultType::Transmission
            } else {
                random_label(&mut rng)
            };
            SensorRecord::unlabeled(DEPARTMENTS[rng.gen_range(0..4)], readings).with_fault(fault)
        })
        .collect();
    Dataset::from_records(records)
}

/// Plant with separable faults, as a CSV string.
fn plant_csv(n: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut text =
        String::from("timestamp,device_id,department,temp,vibration,oil_pressure,voltage,rpm,故障类型\n");
    for i in 0..n {
        let mut r = Readings {
            temp: 60.0 + rng.gen_range(-8.0..8.0),
            vibration: 2.0 + rng.gen_range(-0.5..0.5),
            oil_pressure: 10.0 + rng.gen_range(-1.5..1.5),
            voltage: 220.0 + rng.gen_range(-8.0..8.0),
            rpm: 2000.0 + rng.gen_range(-200.0..200.0),
        };
        let fault = match i % 10 {
            0 => {
                r.temp += 35.0;
                FaultType::Cooling
            }
            1 => {
                r.vibration += 3.0;
                r.rpm += 900.0;
                FaultType::Transmission
            }
            2 if i % 20 == 2 => {
                r.oil_pressure -= 6.0;
                FaultType::Lubrication
            }
            2 => {
                r.voltage -= 45.0;
                FaultType::Electrical
            }
            _ => FaultType::Normal,
        };
        text.push_str(&format!(
            "2024-02-{:02} {:02}:00:00,EQ-{:03},{},{},{},{},{},{},{}\n",
            1 + (i / 24) % 28,
            i % 24,
            i % 25,
            DEPARTMENTS[i % 4],
            r.temp,
            r.vibration,
            r.oil_pressure,
            r.voltage,
            r.rpm,
            fault.label()
        ));
    }
    text
}

fn mining_config() -> Config {
    Config {
        mining: MiningThresholds {
            min_support: 0.02,
            min_lift: 1.5,
            min_confidence: 0.5,
            max_itemset_len: 3,
        },
        ..Config::default()
    }
}

fn trained_artifact() -> ModelArtifact {
    let dataset = Dataset::from_csv_bytes(plant_csv(600, 21).as_bytes()).unwrap();
    let config = mining_config();
    let analysis = analyze(&dataset, &config, None, &Reporter::silent()).unwrap();
    let rules = RuleSet::new(analysis.outcome.rules);
    train(&dataset, &rules, &config, &Reporter::silent())
        .unwrap()
        .artifact
}

#[test]
fn test_injected_rule_surfaces_in_top_three() {
    let dataset = injected_rule_dataset();
    let bins = BinConfig::fit(&dataset, 5, Strategy::EqualWidth).unwrap();
    let transactions = build_transactions(&bins.discretize(&dataset));
    let thresholds = MiningThresholds {
        min_support: 0.01,
        min_lift: 1.2,
        min_confidence: 0.5,
        max_itemset_len: 3,
    };
    let outcome = mine(&transactions, &thresholds).unwrap();

    let top_temp = bins.feature(Feature::Temp).unwrap().labels().last().unwrap().clone();
    let top_vib = bins.feature(Feature::Vibration).unwrap().labels().last().unwrap().clone();
    let injected = outcome
        .rules
        .iter()
        .find(|r| {
            r.consequent == FaultType::Transmission
                && r.antecedent.len() == 2
                && r.antecedent.contains(&top_temp)
                && r.antecedent.contains(&top_vib)
        })
        .expect("injected rule mined");

    assert!((injected.support - 0.08).abs() < 1e-9);
    assert!((injected.confidence - 1.0).abs() < 1e-9);
    let outranked = outcome.rules.iter().filter(|r| r.lift > injected.lift).count();
    assert!(outranked < 3, "{outranked} rules have higher lift");
}

#[test]
fn test_train_then_predict() {
    let artifact = trained_artifact();
    assert!(!artifact.is_legacy());
    assert!(artifact.model().contains(NodeId::Fault));

    let predictor = Predictor::new(artifact);
    let normal = Readings {
        temp: 60.0,
        vibration: 2.0,
        oil_pressure: 10.0,
        voltage: 220.0,
        rpm: 2000.0,
    };
    let result = predictor.predict_single(&SensorRecord::unlabeled("生产部", normal));
    assert_eq!(result.probabilities.len(), 5);
    let total: f64 = result.probabilities.iter().map(|(_, p)| p).sum();
    assert!((total - 1.0).abs() < 1e-9);

    // overheating inside the extreme limits is never an override
    let hot = Readings { temp: 94.0, ..normal };
    let hot_result = predictor.predict_single(&SensorRecord::unlabeled("生产部", hot));
    assert_ne!(hot_result.source, PredictionSource::ExtremeOverride);
    if hot_result.source == PredictionSource::Network && result.source == PredictionSource::Network {
        assert!(hot_result.probability(FaultType::Cooling) >= result.probability(FaultType::Cooling));
    }
}

#[test]
fn test_extreme_override_skips_inference() {
    let predictor = Predictor::new(trained_artifact());
    let readings = Readings {
        temp: 299.0,
        vibration: 2.0,
        oil_pressure: 10.0,
        voltage: 220.0,
        rpm: 2000.0,
    };
    let result = predictor.predict_single(&SensorRecord::unlabeled("生产部", readings));
    assert!(result.label.is_fault());
    assert_eq!(result.source, PredictionSource::ExtremeOverride);
    assert_eq!(result.confidence(), 1.0);
    assert!(!result.low_confidence);
}

#[test]
fn test_low_confidence_flag_at_055() {
    let posterior = vec![
        (FaultType::Cooling, 0.55),
        (FaultType::Normal, 0.35),
        (FaultType::Electrical, 0.10),
    ];
    assert!(is_low_confidence(&posterior, 0.6));
}

#[test]
fn test_artifact_round_trip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.fsbn");
    let artifact = trained_artifact();
    artifact.save(&path).unwrap();
    let loaded = ModelArtifact::load(&path).unwrap();

    assert_eq!(loaded.bins(), artifact.bins());
    for (a, b) in artifact.model().cpts().zip(loaded.model().cpts()) {
        assert_eq!(a.node(), b.node());
        for (x, y) in a.values().iter().zip(b.values()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    // re-saving reproduces the same file
    let again = dir.path().join("again.fsbn");
    loaded.save(&again).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&again).unwrap());
}

#[test]
fn test_optimizer_prefers_higher_mean_lift_on_tie() {
    let bins = BinConfig::fit(&injected_rule_dataset(), 5, Strategy::EqualWidth).ok();
    let trial = |strategy, mean_lift| StrategyTrial {
        strategy,
        elapsed: Duration::ZERO,
        rule_count: 7,
        mean_lift,
        status: faultsense::mining::MiningStatus::Found,
        bins: bins.clone(),
        error: None,
    };
    let trials = vec![trial(Strategy::Quantile, 2.5), trial(Strategy::KMeans, 4.0)];
    assert_eq!(select_best(&trials), Some(1));
}

#[test]
fn test_csv_loading_and_in_sample_validation() {
    let csv = plant_csv(300, 5);
    let mut doubled = csv.clone();
    doubled.push_str(csv.lines().nth(1).unwrap());
    doubled.push('\n');
    let dataset = Dataset::from_csv_bytes(doubled.as_bytes()).unwrap();
    assert_eq!(dataset.len(), 300);
    assert_eq!(dataset.report().duplicates_removed, 1);

    let mut config = mining_config();
    config.training.validation = ValidationMode::InSample;
    let analysis = analyze(&dataset, &config, None, &Reporter::silent()).unwrap();
    let report = train(
        &dataset,
        &RuleSet::new(analysis.outcome.rules),
        &config,
        &Reporter::silent(),
    )
    .unwrap();
    assert_eq!(report.validation.samples, 300);
    assert!(report.validation.accuracy >= 0.7, "{}", report.validation);
}

#[test]
fn test_progress_over_channel() {
    let dataset = Dataset::from_csv_bytes(plant_csv(200, 3).as_bytes()).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let sink = ChannelSink::new(tx);
    analyze(&dataset, &mining_config(), None, &Reporter::new(&sink)).unwrap();
    drop(sink);

    let percents: Vec<u8> = rx
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress { percent, .. } => Some(percent),
            PipelineEvent::Log(_) => None,
        })
        .collect();
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}
