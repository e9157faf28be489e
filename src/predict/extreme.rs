//! Extreme-value screen: fixed per-feature limits outside normal operation,
//! and the rule table that turns limit breaches into a fault.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::Readings;
use crate::discretize::BinConfig;
use crate::error::{FaultsenseError, Result};
use crate::schema::{FaultType, Feature};

/// Lower and upper limit of one feature. A missing side is never breached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
}

impl FeatureLimits {
    #[must_use]
    pub const fn new(low: Option<f64>, high: Option<f64>) -> Self {
        Self { low, high }
    }
}

/// Extreme limits for all five features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremeThresholds {
    pub temp: FeatureLimits,
    pub vibration: FeatureLimits,
    pub oil_pressure: FeatureLimits,
    pub voltage: FeatureLimits,
    pub rpm: FeatureLimits,
}

impl Default for ExtremeThresholds {
    fn default() -> Self {
        Self {
            temp: FeatureLimits::new(Some(10.0), Some(95.0)),
            vibration: FeatureLimits::new(None, Some(4.5)),
            oil_pressure: FeatureLimits::new(Some(2.0), Some(19.5)),
            voltage: FeatureLimits::new(Some(170.0), Some(270.0)),
            rpm: FeatureLimits::new(Some(1000.0), Some(3200.0)),
        }
    }
}

impl ExtremeThresholds {
    #[must_use]
    pub fn limits(&self, feature: Feature) -> FeatureLimits {
        match feature {
            Feature::Temp => self.temp,
            Feature::Vibration => self.vibration,
            Feature::OilPressure => self.oil_pressure,
            Feature::Voltage => self.voltage,
            Feature::Rpm => self.rpm,
        }
    }

    pub fn set_limits(&mut self, feature: Feature, limits: FeatureLimits) {
        match feature {
            Feature::Temp => self.temp = limits,
            Feature::Vibration => self.vibration = limits,
            Feature::OilPressure => self.oil_pressure = limits,
            Feature::Voltage => self.voltage = limits,
            Feature::Rpm => self.rpm = limits,
        }
    }

    /// Limits placed outside the outermost learned boundaries, widened by
    /// `margin` times each feature's learned range.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative or non-finite margin.
    pub fn beyond_bins(bins: &BinConfig, margin: f64) -> Result<Self> {
        if !(margin.is_finite() && margin >= 0.0) {
            return Err(FaultsenseError::invalid_parameter("margin", margin, ">= 0"));
        }
        let mut thresholds = Self::default();
        for (feature, fb) in bins.iter() {
            let (Some(first), Some(last)) = (fb.bins().first(), fb.bins().last()) else {
                continue;
            };
            let pad = (last - first) * margin;
            thresholds.set_limits(
                feature,
                FeatureLimits::new(Some(first - pad), Some(last + pad)),
            );
        }
        Ok(thresholds)
    }

    /// # Errors
    ///
    /// Returns an error if a limit is not finite or `low >= high`.
    pub fn validate(&self) -> Result<()> {
        for feature in Feature::ALL {
            let limits = self.limits(feature);
            let finite = limits.low.map_or(true, f64::is_finite)
                && limits.high.map_or(true, f64::is_finite);
            let ordered = match (limits.low, limits.high) {
                (Some(low), Some(high)) => low < high,
                _ => true,
            };
            if !(finite && ordered) {
                return Err(FaultsenseError::invalid_parameter(
                    "extreme thresholds",
                    feature,
                    "finite limits with low < high",
                ));
            }
        }
        Ok(())
    }

    /// Every limit the readings cross. Missing (NaN) readings cross nothing.
    #[must_use]
    pub fn breaches(&self, readings: &Readings) -> Vec<Breach> {
        let mut found = Vec::new();
        for feature in Feature::ALL {
            let value = readings.get(feature);
            if value.is_nan() {
                continue;
            }
            let limits = self.limits(feature);
            if limits.low.is_some_and(|low| value < low) {
                found.push(Breach {
                    feature,
                    side: Side::Low,
                    value,
                });
            }
            if limits.high.is_some_and(|high| value > high) {
                found.push(Breach {
                    feature,
                    side: Side::High,
                    value,
                });
            }
        }
        found
    }
}

/// Which limit was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Low,
    High,
}

/// One crossed limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breach {
    pub feature: Feature,
    pub side: Side,
    pub value: f64,
}

impl Breach {
    /// Fault implied by this breach alone, if any.
    #[must_use]
    pub fn implied_fault(&self) -> Option<FaultType> {
        match (self.feature, self.side) {
            (Feature::Voltage, _) => Some(FaultType::Electrical),
            (Feature::Temp, Side::High) => Some(FaultType::Cooling),
            (Feature::Rpm, _) | (Feature::Vibration, Side::High) => Some(FaultType::Transmission),
            (Feature::OilPressure, Side::Low) => Some(FaultType::Lubrication),
            _ => None,
        }
    }
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Low => "low",
            Side::High => "high",
        };
        write!(f, "extreme {side} {} ({})", self.feature, self.value)
    }
}

/// Classify a set of breaches: the implied fault of highest severity
/// (electrical, cooling, transmission, lubrication), or normal when no
/// breach implies a fault.
#[must_use]
pub fn rule_table(breaches: &[Breach]) -> FaultType {
    breaches
        .iter()
        .filter_map(Breach::implied_fault)
        .min_by_key(|f| f.override_rank())
        .unwrap_or(FaultType::Normal)
}
