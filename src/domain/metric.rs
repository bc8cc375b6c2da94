//! Metric kinds and the canonical vocabulary table
//!
//! Every metric kind that can become a canonical Observation has exactly one
//! row in [`CODE_TABLE`]. A kind without a row is a hard conversion failure.

use super::errors::MeridianError;
use super::result::Result;
use super::units::Unit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// LOINC code system URI
pub const LOINC_SYSTEM: &str = "http://loinc.org";

/// UCUM unit system URI
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// HL7 observation category code system URI
pub const OBSERVATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

/// Platform-agnostic kind of health measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    OxygenSaturation,
    BodyTemperature,
    Steps,
    SleepDuration,
    /// Reported by wearables but absent from the canonical vocabulary
    ActiveEnergy,
}

impl MetricKind {
    /// Every metric kind
    pub const ALL: [MetricKind; 6] = [
        MetricKind::HeartRate,
        MetricKind::OxygenSaturation,
        MetricKind::BodyTemperature,
        MetricKind::Steps,
        MetricKind::SleepDuration,
        MetricKind::ActiveEnergy,
    ];

    /// Stable snake_case tag used in internal records and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::OxygenSaturation => "oxygen_saturation",
            MetricKind::BodyTemperature => "body_temperature",
            MetricKind::Steps => "steps",
            MetricKind::SleepDuration => "sleep_duration",
            MetricKind::ActiveEnergy => "active_energy",
        }
    }

    /// Whether this kind is imported through the sleep aggregation path
    pub fn is_sleep(&self) -> bool {
        matches!(self, MetricKind::SleepDuration)
    }

    /// Vocabulary entry for this kind
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMetric` when the kind has no row in the table.
    pub fn code_entry(&self) -> Result<&'static CodeEntry> {
        CODE_TABLE
            .iter()
            .find(|entry| entry.kind == *self)
            .ok_or_else(|| {
                MeridianError::unsupported_metric(self.as_str(), "no canonical vocabulary entry")
            })
    }

    /// Resolves a coded concept back to its metric kind
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMetric` when no row carries this system and code.
    pub fn from_code(system: &str, code: &str) -> Result<MetricKind> {
        CODE_TABLE
            .iter()
            .find(|entry| entry.system == system && entry.code == code)
            .map(|entry| entry.kind)
            .ok_or_else(|| {
                MeridianError::unsupported_metric(
                    format!("{system}|{code}"),
                    "code is not in the canonical vocabulary",
                )
            })
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MeridianError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "heart_rate" | "heartrate" | "pulse" => Ok(MetricKind::HeartRate),
            "oxygen_saturation" | "spo2" | "blood_oxygen" => Ok(MetricKind::OxygenSaturation),
            "body_temperature" | "temperature" => Ok(MetricKind::BodyTemperature),
            "steps" | "step_count" => Ok(MetricKind::Steps),
            "sleep_duration" | "sleep" => Ok(MetricKind::SleepDuration),
            "active_energy" | "calories" => Ok(MetricKind::ActiveEnergy),
            other => Err(MeridianError::unsupported_metric(
                other,
                "unknown metric kind",
            )),
        }
    }
}

/// Observation category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    VitalSigns,
    Activity,
    Sleep,
}

impl Category {
    /// Category code in the HL7 observation-category system
    pub fn code(&self) -> &'static str {
        match self {
            Category::VitalSigns => "vital-signs",
            Category::Activity => "activity",
            Category::Sleep => "sleep",
        }
    }

    /// Category display text
    pub fn display(&self) -> &'static str {
        match self {
            Category::VitalSigns => "Vital Signs",
            Category::Activity => "Activity",
            Category::Sleep => "Sleep",
        }
    }
}

/// One row of the canonical vocabulary table
#[derive(Debug, Clone, PartialEq)]
pub struct CodeEntry {
    pub kind: MetricKind,
    pub system: &'static str,
    pub code: &'static str,
    pub display: &'static str,
    /// Canonical unit the value is always stored in
    pub unit: Unit,
    pub category: Category,
}

/// The fixed metric-to-code table
pub static CODE_TABLE: [CodeEntry; 5] = [
    CodeEntry {
        kind: MetricKind::HeartRate,
        system: LOINC_SYSTEM,
        code: "8867-4",
        display: "Heart rate",
        unit: Unit::BeatsPerMinute,
        category: Category::VitalSigns,
    },
    CodeEntry {
        kind: MetricKind::OxygenSaturation,
        system: LOINC_SYSTEM,
        code: "59408-5",
        display: "Oxygen saturation in Arterial blood by Pulse oximetry",
        unit: Unit::Percent,
        category: Category::VitalSigns,
    },
    CodeEntry {
        kind: MetricKind::BodyTemperature,
        system: LOINC_SYSTEM,
        code: "8310-5",
        display: "Body temperature",
        unit: Unit::Celsius,
        category: Category::VitalSigns,
    },
    CodeEntry {
        kind: MetricKind::Steps,
        system: LOINC_SYSTEM,
        code: "41950-7",
        display: "Number of steps in 24 hour Measured",
        unit: Unit::Steps,
        category: Category::Activity,
    },
    CodeEntry {
        kind: MetricKind::SleepDuration,
        system: LOINC_SYSTEM,
        code: "93832-4",
        display: "Sleep duration",
        unit: Unit::Minutes,
        category: Category::Sleep,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<_> = CODE_TABLE.iter().map(|e| (e.system, e.code)).collect();
        assert_eq!(codes.len(), CODE_TABLE.len());

        let kinds: HashSet<_> = CODE_TABLE.iter().map(|e| e.kind).collect();
        assert_eq!(kinds.len(), CODE_TABLE.len());
    }

    #[test]
    fn test_heart_rate_entry() {
        let entry = MetricKind::HeartRate.code_entry().unwrap();
        assert_eq!(entry.code, "8867-4");
        assert_eq!(entry.unit.ucum_code(), "/min");
        assert_eq!(entry.unit.display(), "beats/min");
        assert_eq!(entry.category, Category::VitalSigns);
    }

    #[test]
    fn test_missing_entry_is_hard_failure() {
        let err = MetricKind::ActiveEnergy.code_entry().unwrap_err();
        assert!(matches!(err, MeridianError::UnsupportedMetric { .. }));
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(
            MetricKind::from_code(LOINC_SYSTEM, "8310-5").unwrap(),
            MetricKind::BodyTemperature
        );
        assert!(MetricKind::from_code(LOINC_SYSTEM, "0000-0").is_err());
        assert!(MetricKind::from_code("http://snomed.info/sct", "8310-5").is_err());
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!("SpO2".parse::<MetricKind>().unwrap(), MetricKind::OxygenSaturation);
        assert_eq!("sleep".parse::<MetricKind>().unwrap(), MetricKind::SleepDuration);
        assert!("weight".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_serde_matches_tag() {
        for kind in MetricKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
