//! Faults command: fault history of one device.

use std::path::Path;

use faultsense::data::{fault_records, Dataset};

use super::validate_path;
use crate::error::Result;
use crate::output;

pub(crate) fn run(data: &Path, device: &str, limit: usize, json: bool) -> Result<()> {
    validate_path(data)?;
    let dataset = Dataset::load(data)?;
    let history = fault_records(&dataset, device);

    if json {
        return output::json(&history);
    }
    output::section(&format!("Faults of {device}"));
    if history.records.is_empty() {
        output::success("no fault records");
        return Ok(());
    }
    for (fault, count) in &history.distribution {
        output::kv(fault.alias(), count);
    }
    println!();
    for record in history.records.iter().take(limit) {
        let r = &record.readings;
        println!(
            "  {:<20}{:<14} temp {:.1}  vib {:.2}  oil {:.2}  volt {:.1}  rpm {:.0}",
            record.timestamp.as_deref().unwrap_or("-"),
            record.fault.map_or("-", |f| f.alias()),
            r.temp,
            r.vibration,
            r.oil_pressure,
            r.voltage,
            r.rpm
        );
    }
    if history.records.len() > limit {
        println!("  ... {} more", history.records.len() - limit);
    }
    Ok(())
}
