//! Internal health records and query time ranges

use super::errors::MeridianError;
use super::ids::UserId;
use super::platform::Platform;
use super::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The application's internal representation of one measurement
///
/// This is what the rest of the application stores and displays. The metric
/// is a free-form tag so that records of kinds the engine does not know about
/// reach the converter and fail individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Identifier of the canonical Observation this record came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub user_id: UserId,

    /// Metric kind tag, e.g. `heart_rate`
    pub metric: String,

    pub value: f64,

    /// Unit spelling, e.g. `bpm`, `°F`, `%`
    pub unit: String,

    pub recorded_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Platform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl HealthRecord {
    /// Creates a record with no id, source or device
    pub fn new(
        user_id: UserId,
        metric: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            metric: metric.into(),
            value,
            unit: unit.into(),
            recorded_at,
            source: None,
            device_id: None,
        }
    }

    pub fn with_source(mut self, source: Platform) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Half-open query window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(MeridianError::Validation(format!(
                "time range start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether the instant falls inside the half-open window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}
