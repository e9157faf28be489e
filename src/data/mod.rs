//! Sensor datasets: records, CSV loading and fault history queries.
//!
//! Loading follows the plant export conventions: the encoding is detected
//! (see [`encoding`]), duplicate rows are dropped, and required columns that
//! are not present by name are resolved by case-insensitive substring match.
//!
//! # Example
//!
//! ```
//! use faultsense::data::Dataset;
//!
//! let csv = "department,temp,vibration,oil_pressure,voltage,rpm,故障类型\n\
//!            生产部,60.0,1.2,10.0,220.0,2000.0,正常运行\n\
//!            生产部,60.0,1.2,10.0,220.0,2000.0,正常运行\n";
//! let ds = Dataset::from_csv_bytes(csv.as_bytes()).unwrap();
//! assert_eq!(ds.len(), 1);
//! assert_eq!(ds.report().duplicates_removed, 1);
//! ```

pub mod encoding;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{FaultsenseError, Result};
use crate::schema::{FaultType, Feature, FAULT_NODE};
pub use encoding::TextEncoding;

/// The five continuous readings of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Readings {
    pub temp: f64,
    pub vibration: f64,
    pub oil_pressure: f64,
    pub voltage: f64,
    pub rpm: f64,
}

impl Readings {
    #[must_use]
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Temp => self.temp,
            Feature::Vibration => self.vibration,
            Feature::OilPressure => self.oil_pressure,
            Feature::Voltage => self.voltage,
            Feature::Rpm => self.rpm,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        match feature {
            Feature::Temp => self.temp = value,
            Feature::Vibration => self.vibration = value,
            Feature::OilPressure => self.oil_pressure = value,
            Feature::Voltage => self.voltage = value,
            Feature::Rpm => self.rpm = value,
        }
    }

    /// Build readings by evaluating `f` for every feature.
    pub fn from_fn(mut f: impl FnMut(Feature) -> f64) -> Self {
        Self {
            temp: f(Feature::Temp),
            vibration: f(Feature::Vibration),
            oil_pressure: f(Feature::OilPressure),
            voltage: f(Feature::Voltage),
            rpm: f(Feature::Rpm),
        }
    }
}

/// One observation. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecord {
    pub timestamp: Option<String>,
    pub device_id: Option<String>,
    pub department: String,
    pub readings: Readings,
    /// `None` for unlabeled records submitted for prediction.
    pub fault: Option<FaultType>,
}

impl SensorRecord {
    /// Unlabeled record for prediction.
    #[must_use]
    pub fn unlabeled(department: impl Into<String>, readings: Readings) -> Self {
        Self {
            timestamp: None,
            device_id: None,
            department: department.into(),
            readings,
            fault: None,
        }
    }

    #[must_use]
    pub fn with_fault(mut self, fault: FaultType) -> Self {
        self.fault = Some(fault);
        self
    }
}

/// What happened while loading a dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub encoding: Option<TextEncoding>,
    pub rows_read: usize,
    pub duplicates_removed: usize,
    pub rows_skipped: usize,
    /// `(required column, header it was resolved to)` for fuzzy matches.
    pub fuzzy_matches: Vec<(String, String)>,
}

/// A loaded set of sensor records.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<SensorRecord>,
    report: LoadReport,
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    department: usize,
    features: [usize; 5],
    label: usize,
    timestamp: Option<usize>,
    device_id: Option<usize>,
}

const LABEL_ALIASES: [&str; 2] = [FAULT_NODE, "fault_type"];

/// Find `required` among `headers`: exact, then aliases, then fuzzy
/// containment in either direction.
fn find_column(
    headers: &[String],
    required: &str,
    aliases: &[&str],
    taken: &[usize],
) -> Option<(usize, bool)> {
    let free = |i: &usize| !taken.contains(i);
    if let Some(i) = headers.iter().position(|h| h == required).filter(free) {
        return Some((i, false));
    }
    for alias in aliases {
        if let Some(i) = headers.iter().position(|h| h == alias).filter(free) {
            return Some((i, false));
        }
    }
    let needle = required.to_lowercase();
    headers
        .iter()
        .enumerate()
        .filter(|(i, _)| free(i))
        .find(|(_, h)| {
            let hay = h.to_lowercase();
            !hay.is_empty() && (hay.contains(&needle) || needle.contains(&hay))
        })
        .map(|(i, _)| (i, true))
}

fn resolve_columns(headers: &[String], report: &mut LoadReport) -> Result<ColumnIndex> {
    let mut taken = Vec::new();
    let mut missing = Vec::new();

    let mut resolve = |name: &str, aliases: &[&str], taken: &mut Vec<usize>| -> Option<usize> {
        match find_column(headers, name, aliases, taken) {
            Some((i, fuzzy)) => {
                if fuzzy {
                    warn!(required = name, header = %headers[i], "column resolved by fuzzy match");
                    report
                        .fuzzy_matches
                        .push((name.to_string(), headers[i].clone()));
                }
                taken.push(i);
                Some(i)
            }
            None => {
                missing.push(name.to_string());
                None
            }
        }
    };

    let label = resolve(FAULT_NODE, &LABEL_ALIASES, &mut taken);
    let department = resolve("department", &[], &mut taken);
    let mut features = [0usize; 5];
    let mut all_features = true;
    for (slot, feature) in features.iter_mut().zip(Feature::ALL) {
        match resolve(feature.column(), &[], &mut taken) {
            Some(i) => *slot = i,
            None => all_features = false,
        }
    }
    drop(resolve);

    match (department, label) {
        (Some(department), Some(label)) if all_features => {
            let optional = |name: &str| {
                headers
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case(name))
                    .filter(|i| !taken.contains(i))
            };
            Ok(ColumnIndex {
                department,
                features,
                label,
                timestamp: optional("timestamp"),
                device_id: optional("device_id"),
            })
        }
        _ => Err(FaultsenseError::MissingColumns {
            missing,
            available: headers.to_vec(),
        }),
    }
}

fn parse_value(raw: &str) -> std::result::Result<f64, std::num::ParseFloatError> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(f64::NAN)
    } else {
        raw.parse()
    }
}

fn parse_row(fields: &[String], cols: &ColumnIndex) -> std::result::Result<SensorRecord, String> {
    let field = |i: usize| fields.get(i).map(String::as_str);
    let optional = |i: Option<usize>| {
        i.and_then(field)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut readings = Readings::from_fn(|_| f64::NAN);
    for (feature, idx) in Feature::ALL.into_iter().zip(cols.features) {
        let raw = field(idx).ok_or_else(|| format!("missing {feature} field"))?;
        let value = parse_value(raw).map_err(|e| format!("{feature} = {raw:?}: {e}"))?;
        readings.set(feature, value);
    }
    let raw_label = field(cols.label).ok_or("missing label field")?;
    let fault: FaultType = raw_label.parse().map_err(|e: FaultsenseError| e.to_string())?;

    Ok(SensorRecord {
        timestamp: optional(cols.timestamp),
        device_id: optional(cols.device_id),
        department: field(cols.department).unwrap_or_default().trim().to_string(),
        readings,
        fault: Some(fault),
    })
}

impl Dataset {
    /// Wrap already-built records.
    #[must_use]
    pub fn from_records(records: Vec<SensorRecord>) -> Self {
        let report = LoadReport {
            rows_read: records.len(),
            ..LoadReport::default()
        };
        Self { records, report }
    }

    /// Load a dataset CSV from disk.
    ///
    /// # Errors
    ///
    /// Returns an input error if the file is missing or empty, required
    /// columns cannot be resolved, or no row survives parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let dataset = Self::from_csv_bytes(&bytes)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            encoding = dataset.report.encoding.map_or("?", TextEncoding::name),
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Parse a dataset from raw CSV bytes.
    ///
    /// # Errors
    ///
    /// See [`Dataset::load`].
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let (text, encoding) = encoding::decode(bytes)?;
        let mut report = LoadReport {
            encoding: Some(encoding),
            ..LoadReport::default()
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.iter().all(String::is_empty) {
            return Err(FaultsenseError::empty_input("CSV has no header row"));
        }
        let cols = resolve_columns(&headers, &mut report)?;

        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) if encoding.skips_bad_lines() => {
                    warn!(line = line + 2, error = %e, "skipping malformed line");
                    report.rows_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            report.rows_read += 1;
            let fields: Vec<String> = row.iter().map(str::to_string).collect();
            if !seen.insert(fields.clone()) {
                report.duplicates_removed += 1;
                continue;
            }
            match parse_row(&fields, &cols) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!(line = line + 2, %reason, "skipping row");
                    report.rows_skipped += 1;
                }
            }
        }

        if records.is_empty() {
            return Err(FaultsenseError::empty_input("no usable rows in dataset"));
        }
        debug!(
            duplicates = report.duplicates_removed,
            skipped = report.rows_skipped,
            "dataset parsed"
        );
        Ok(Self { records, report })
    }

    #[must_use]
    pub fn records(&self) -> &[SensorRecord] {
        &self.records
    }

    #[must_use]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All values of one feature, NaN where missing.
    #[must_use]
    pub fn column(&self, feature: Feature) -> Vec<f64> {
        self.records.iter().map(|r| r.readings.get(feature)).collect()
    }

    /// `true` for rows labeled with an actual fault.
    #[must_use]
    pub fn fault_mask(&self) -> Vec<bool> {
        self.records
            .iter()
            .map(|r| r.fault.is_some_and(FaultType::is_fault))
            .collect()
    }

    /// Split into two datasets by row index predicate.
    #[must_use]
    pub fn partition(&self, mut keep_left: impl FnMut(usize) -> bool) -> (Dataset, Dataset) {
        let (left, right): (Vec<_>, Vec<_>) = self
            .records
            .iter()
            .cloned()
            .enumerate()
            .partition(|(i, _)| keep_left(*i));
        (
            Dataset::from_records(left.into_iter().map(|(_, r)| r).collect()),
            Dataset::from_records(right.into_iter().map(|(_, r)| r).collect()),
        )
    }
}

/// Fault history of one device.
#[derive(Debug, Clone, Serialize)]
pub struct FaultHistory {
    pub device_id: String,
    /// Fault records, newest first.
    pub records: Vec<SensorRecord>,
    /// Count of records per fault type.
    pub distribution: BTreeMap<FaultType, usize>,
}

/// Records of `device_id` labeled with a fault, newest first, plus the
/// fault type distribution.
///
/// Records without a timestamp sort after all timestamped ones.
#[must_use]
pub fn fault_records(dataset: &Dataset, device_id: &str) -> FaultHistory {
    let mut records: Vec<SensorRecord> = dataset
        .records()
        .iter()
        .filter(|r| r.device_id.as_deref() == Some(device_id))
        .filter(|r| r.fault.is_some_and(FaultType::is_fault))
        .cloned()
        .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut distribution = BTreeMap::new();
    for fault in records.iter().filter_map(|r| r.fault) {
        *distribution.entry(fault).or_insert(0) += 1;
    }
    FaultHistory {
        device_id: device_id.to_string(),
        records,
        distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "timestamp,device_id,department,temp,vibration,oil_pressure,voltage,rpm,故障类型";

    fn csv(rows: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for row in rows {
            s.push('\n');
            s.push_str(row);
        }
        s
    }

    #[test]
    fn test_loads_and_dedups() {
        let text = csv(&[
            "2024-01-01 08:00,D1,生产部,60,1.2,10,220,2000,正常运行",
            "2024-01-01 08:00,D1,生产部,60,1.2,10,220,2000,正常运行",
            "2024-01-01 09:00,D1,生产部,95,1.2,10,220,2000,散热系统故障",
        ]);
        let ds = Dataset::from_csv_bytes(text.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.report().duplicates_removed, 1);
        assert_eq!(ds.report().encoding, Some(TextEncoding::Utf8));
        assert_eq!(ds.records()[1].fault, Some(FaultType::Cooling));
        assert_eq!(ds.records()[0].device_id.as_deref(), Some("D1"));
        assert_eq!(ds.fault_mask(), vec![false, true]);
    }

    #[test]
    fn test_fuzzy_column_match() {
        let text = "Department,Temperature,vibration,OIL_PRESSURE,voltage,rpm,fault_type\n\
                    研发部,50,1,9,210,1800,normal\n";
        let ds = Dataset::from_csv_bytes(text.as_bytes()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records()[0].readings.temp, 50.0);
        let matched: Vec<&str> = ds
            .report()
            .fuzzy_matches
            .iter()
            .map(|(req, _)| req.as_str())
            .collect();
        assert!(matched.contains(&"temp"));
        assert!(matched.contains(&"department"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let text = "department,temp,vibration,oil_pressure,voltage,故障类型\n生产部,1,1,1,1,正常运行\n";
        let err = Dataset::from_csv_bytes(text.as_bytes()).unwrap_err();
        match err {
            FaultsenseError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["rpm".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let text = csv(&[
            ",D1,生产部,abc,1.2,10,220,2000,正常运行",
            ",D1,生产部,60,1.2,10,220,2000,未知故障",
            ",D1,生产部,,1.2,10,220,2000,正常运行",
        ]);
        let ds = Dataset::from_csv_bytes(text.as_bytes()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.report().rows_skipped, 2);
        assert!(ds.records()[0].readings.temp.is_nan());
        assert!(ds.records()[0].timestamp.is_none());
    }

    #[test]
    fn test_gbk_file() {
        let text = csv(&[",D9,质检部,60,1.2,10,220,2000,润滑系统异常"]);
        let (bytes, _, _) = encoding_rs::GBK.encode(&text);
        let ds = Dataset::from_csv_bytes(&bytes).unwrap();
        assert_eq!(ds.report().encoding, Some(TextEncoding::Gbk));
        assert_eq!(ds.records()[0].department, "质检部");
        assert_eq!(ds.records()[0].fault, Some(FaultType::Lubrication));
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let err = Dataset::from_csv_bytes(HEADER.as_bytes()).unwrap_err();
        assert!(matches!(err, FaultsenseError::EmptyInput { .. }));
    }

    #[test]
    fn test_fault_records_newest_first() {
        let text = csv(&[
            "2024-03-01 10:00,M7,维修部,96,1,10,220,2000,散热系统故障",
            "2024-03-02 10:00,M7,维修部,60,1,10,150,2000,电力供应故障",
            "2024-03-03 10:00,M7,维修部,60,1,10,220,2000,正常运行",
            "2024-03-04 10:00,M8,维修部,97,1,10,220,2000,散热系统故障",
            "2024-03-05 10:00,M7,维修部,98,1,10,220,2000,散热系统故障",
        ]);
        let ds = Dataset::from_csv_bytes(text.as_bytes()).unwrap();
        let history = fault_records(&ds, "M7");
        assert_eq!(history.records.len(), 3);
        assert_eq!(
            history.records[0].timestamp.as_deref(),
            Some("2024-03-05 10:00")
        );
        assert_eq!(history.distribution[&FaultType::Cooling], 2);
        assert_eq!(history.distribution[&FaultType::Electrical], 1);
        assert!(!history.distribution.contains_key(&FaultType::Normal));
    }

    #[test]
    fn test_partition() {
        let text = csv(&[
            ",A,生产部,60,1,10,220,2000,正常运行",
            ",B,生产部,61,1,10,220,2000,正常运行",
            ",C,生产部,62,1,10,220,2000,正常运行",
        ]);
        let ds = Dataset::from_csv_bytes(text.as_bytes()).unwrap();
        let (even, odd) = ds.partition(|i| i % 2 == 0);
        assert_eq!(even.len(), 2);
        assert_eq!(odd.len(), 1);
        assert_eq!(odd.records()[0].device_id.as_deref(), Some("B"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Dataset::load("/nonexistent/faultsense.csv").unwrap_err();
        assert!(err.is_input_error());
    }
}
