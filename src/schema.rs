//! Closed domain vocabulary: sensor features, fault types, item prefixes
//! and the label→node lookup table.
//!
//! Category labels are the ones used in the plant's own datasets, so they are
//! Chinese strings. Everything else in the crate refers to them through the
//! enums in this module.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FaultsenseError, Result};

/// Prefix of department items and department rule tokens.
pub const DEPARTMENT_PREFIX: &str = "部门_";

/// Prefix of fault-marker items. "Contains a fault marker" is a prefix test.
pub const FAULT_PREFIX: &str = "故障_";

/// Name of the label column and of the network's sink node.
pub const FAULT_NODE: &str = "故障类型";

/// Name of the department column and network node.
pub const DEPARTMENT_NODE: &str = "department";

/// One of the five continuous sensor channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Temperature (°C)
    Temp,
    /// Vibration (mm/s)
    Vibration,
    /// Oil pressure (bar)
    OilPressure,
    /// Supply voltage (V)
    Voltage,
    /// Spindle speed (rpm)
    Rpm,
}

impl Feature {
    /// All features in dataset column order.
    pub const ALL: [Feature; 5] = [
        Feature::Temp,
        Feature::Vibration,
        Feature::OilPressure,
        Feature::Voltage,
        Feature::Rpm,
    ];

    /// Dataset column name.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Feature::Temp => "temp",
            Feature::Vibration => "vibration",
            Feature::OilPressure => "oil_pressure",
            Feature::Voltage => "voltage",
            Feature::Rpm => "rpm",
        }
    }

    fn stem(self) -> &'static str {
        match self {
            Feature::Temp => "温",
            Feature::Vibration => "振动",
            Feature::OilPressure => "油压",
            Feature::Voltage => "电力",
            Feature::Rpm => "转速",
        }
    }

    /// Ordinal category labels for `num_bins` bins, lowest first.
    ///
    /// Five bins give the standard "very low … very high" set, e.g.
    /// `极低温, 低温, 中温, 高温, 极高温` for temperature.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultsense::schema::Feature;
    ///
    /// assert_eq!(Feature::Rpm.labels(3), vec!["低转速", "中转速", "高转速"]);
    /// ```
    #[must_use]
    pub fn labels(self, num_bins: usize) -> Vec<String> {
        let stem = self.stem();
        let grades: &[&str] = match num_bins {
            2 => &["低", "高"],
            3 => &["低", "中", "高"],
            4 => &["低", "中低", "中高", "高"],
            5 => &["极低", "低", "中", "高", "极高"],
            _ => {
                return (1..=num_bins).map(|i| format!("{stem}等级{i}")).collect();
            }
        };
        grades.iter().map(|g| format!("{g}{stem}")).collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Feature {
    type Err = FaultsenseError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        Feature::ALL
            .into_iter()
            .find(|f| f.column() == needle)
            .ok_or_else(|| {
                FaultsenseError::invalid_parameter(
                    "feature",
                    s,
                    "one of temp, vibration, oil_pressure, voltage, rpm",
                )
            })
    }
}

/// Equipment state label: normal operation or one of four fault categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    /// 正常运行
    Normal,
    /// 散热系统故障
    Cooling,
    /// 润滑系统异常
    Lubrication,
    /// 电力供应故障
    Electrical,
    /// 传动系统异常
    Transmission,
}

impl FaultType {
    /// Every label, normal first.
    pub const ALL: [FaultType; 5] = [
        FaultType::Normal,
        FaultType::Cooling,
        FaultType::Lubrication,
        FaultType::Electrical,
        FaultType::Transmission,
    ];

    /// Canonical dataset label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FaultType::Normal => "正常运行",
            FaultType::Cooling => "散热系统故障",
            FaultType::Lubrication => "润滑系统异常",
            FaultType::Electrical => "电力供应故障",
            FaultType::Transmission => "传动系统异常",
        }
    }

    /// Short English alias accepted on input.
    #[must_use]
    pub fn alias(self) -> &'static str {
        match self {
            FaultType::Normal => "normal",
            FaultType::Cooling => "cooling",
            FaultType::Lubrication => "lubrication",
            FaultType::Electrical => "electrical",
            FaultType::Transmission => "transmission",
        }
    }

    #[must_use]
    pub fn is_fault(self) -> bool {
        self != FaultType::Normal
    }

    /// Transaction item for this label: the bare label for normal rows,
    /// `故障_<label>` otherwise.
    #[must_use]
    pub fn item(self) -> String {
        if self.is_fault() {
            format!("{FAULT_PREFIX}{}", self.label())
        } else {
            self.label().to_string()
        }
    }

    /// Inverse of [`FaultType::item`] for fault items.
    #[must_use]
    pub fn from_fault_item(item: &str) -> Option<FaultType> {
        item.strip_prefix(FAULT_PREFIX)
            .and_then(|name| name.parse().ok())
            .filter(|f: &FaultType| f.is_fault())
    }

    /// Rank used when several extreme breaches disagree; lower wins.
    #[must_use]
    pub fn override_rank(self) -> u8 {
        match self {
            FaultType::Electrical => 0,
            FaultType::Cooling => 1,
            FaultType::Transmission => 2,
            FaultType::Lubrication => 3,
            FaultType::Normal => 4,
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FaultType {
    type Err = FaultsenseError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lowered = trimmed.to_lowercase();
        if trimmed == "正常" {
            return Ok(FaultType::Normal);
        }
        FaultType::ALL
            .into_iter()
            .find(|f| f.label() == trimmed || f.alias() == lowered)
            .ok_or_else(|| {
                FaultsenseError::invalid_parameter(
                    "fault type",
                    s,
                    "正常运行, 散热系统故障, 润滑系统异常, 电力供应故障 or 传动系统异常",
                )
            })
    }
}

/// Node of the fault network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeId {
    /// Department the equipment belongs to
    Department,
    /// A discretized sensor channel
    Feature(Feature),
    /// The fault label sink
    Fault,
}

impl NodeId {
    /// Column / node name as it appears in data and reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            NodeId::Department => DEPARTMENT_NODE,
            NodeId::Feature(f) => f.column(),
            NodeId::Fault => FAULT_NODE,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Explicit category-string → node table used to read rule antecedents.
///
/// Built from the label sets actually in use, and checked on construction:
/// every feature must contribute labels, and no label may resolve to two
/// different nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    entries: BTreeMap<String, NodeId>,
}

impl LabelMap {
    /// Table for the standard five-bin label sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the five-bin label sets are incomplete or
    /// ambiguous; see [`LabelMap::from_label_sets`].
    pub fn standard() -> Result<Self> {
        Self::from_label_sets(Feature::ALL.map(|f| (f, f.labels(5))))
    }

    /// Table covering the given per-feature label sets plus every fault label.
    ///
    /// # Errors
    ///
    /// Returns an error if a feature is missing or has no labels, or if a
    /// label is claimed by two nodes.
    pub fn from_label_sets<I>(sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Feature, Vec<String>)>,
    {
        let mut entries = BTreeMap::new();
        for fault in FaultType::ALL {
            entries.insert(fault.label().to_string(), NodeId::Fault);
        }

        let mut covered = Vec::new();
        for (feature, labels) in sets {
            if labels.is_empty() {
                return Err(FaultsenseError::invalid_parameter(
                    "label set",
                    feature,
                    "at least one label per feature",
                ));
            }
            for label in labels {
                let node = NodeId::Feature(feature);
                if let Some(previous) = entries.insert(label.clone(), node) {
                    if previous != node {
                        return Err(FaultsenseError::invalid_parameter(
                            "label set",
                            &label,
                            &format!("a label unique to one node, also used by {previous}"),
                        ));
                    }
                }
            }
            covered.push(feature);
        }

        let missing: Vec<String> = Feature::ALL
            .iter()
            .filter(|f| !covered.contains(f))
            .map(|f| f.column().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FaultsenseError::invalid_parameter(
                "label set",
                missing.join(", "),
                "labels for all five features",
            ));
        }

        Ok(Self { entries })
    }

    /// Resolve one rule token to its node.
    ///
    /// Known labels are looked up first. Tokens in raw `feature=label` form
    /// are reduced to their label. Otherwise only `部门_<dept>` tokens
    /// resolve, to the department node.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<NodeId> {
        let token = token.trim();
        let label = token.split_once('=').map_or(token, |(_, l)| l.trim());
        if let Some(node) = self.entries.get(label) {
            return Some(*node);
        }
        if label.starts_with(DEPARTMENT_PREFIX) {
            return Some(NodeId::Department);
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
