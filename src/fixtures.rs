//! Synthetic plant data for unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::{Dataset, Readings, SensorRecord};
use crate::schema::FaultType;

pub(crate) const DEPARTMENTS: [&str; 4] = ["生产部", "研发部", "质检部", "维修部"];

pub(crate) fn normal_readings(rng: &mut StdRng) -> Readings {
    Readings {
        temp: 60.0 + rng.gen_range(-8.0..8.0),
        vibration: 2.0 + rng.gen_range(-0.5..0.5),
        oil_pressure: 10.0 + rng.gen_range(-1.5..1.5),
        voltage: 220.0 + rng.gen_range(-8.0..8.0),
        rpm: 2000.0 + rng.gen_range(-200.0..200.0),
    }
}

/// `n` labeled records: roughly 70% normal, the rest split over four
/// faults, each fault pushing one or two sensors far from normal.
pub(crate) fn plant(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let records = (0..n)
        .map(|i| {
            let mut readings = normal_readings(&mut rng);
            let fault = match i % 10 {
                0 => {
                    readings.temp += 35.0;
                    FaultType::Cooling
                }
                1 => {
                    readings.vibration += 3.0;
                    readings.rpm += 900.0;
                    FaultType::Transmission
                }
                2 if i % 20 == 2 => {
                    readings.oil_pressure -= 6.0;
                    FaultType::Lubrication
                }
                2 => {
                    readings.voltage -= 45.0;
                    FaultType::Electrical
                }
                _ => FaultType::Normal,
            };
            let mut record = SensorRecord::unlabeled(DEPARTMENTS[i % 4], readings).with_fault(fault);
            record.device_id = Some(format!("EQ-{:03}", i % 25));
            record.timestamp = Some(format!("2024-01-{:02} {:02}:00:00", 1 + (i / 24) % 28, i % 24));
            record
        })
        .collect();
    Dataset::from_records(records)
}
