//! Google Fit bridge contract and native data point types
//!
//! Data points follow the Fit REST dataset shape: nanosecond timestamps and a
//! `value` array of `{intVal | fpVal}`.

use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Fit data type carrying sleep stages
pub const SLEEP_SEGMENT: &str = "com.google.sleep.segment";

/// One element of a data point's value array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_val: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp_val: Option<f64>,
}

impl FitValue {
    pub fn int(value: i64) -> Self {
        Self {
            int_val: Some(value),
            fp_val: None,
        }
    }

    pub fn fp(value: f64) -> Self {
        Self {
            int_val: None,
            fp_val: Some(value),
        }
    }

    /// Numeric value, preferring the floating point slot
    pub fn as_f64(&self) -> Option<f64> {
        self.fp_val.or(self.int_val.map(|v| v as f64))
    }
}

/// A Google Fit data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitDataPoint {
    /// Data type name, e.g. `com.google.heart_rate.bpm`
    pub data_type_name: String,

    #[serde(deserialize_with = "nanos")]
    pub start_time_nanos: i64,

    #[serde(deserialize_with = "nanos")]
    pub end_time_nanos: i64,

    pub value: Vec<FitValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_data_source_id: Option<String>,
}

impl FitDataPoint {
    pub fn start(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.start_time_nanos)
    }

    pub fn end(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.end_time_nanos)
    }

    /// First value of the point as a number
    pub fn first_value(&self) -> Option<f64> {
        self.value.first().and_then(FitValue::as_f64)
    }
}

/// Fit serializes int64 as strings; accept both forms
fn nanos<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Nanos {
        Number(i64),
        Text(String),
    }

    match Nanos::deserialize(deserializer)? {
        Nanos::Number(n) => Ok(n),
        Nanos::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Access to the Google Fit store
#[async_trait]
pub trait FitBridge: Send + Sync {
    /// Whether Fit data can be read at all
    async fn is_available(&self) -> bool;

    /// Requests read access to the given data types
    async fn request_permissions(&self, data_types: &[&str]) -> Result<bool>;

    /// Data points of one data type starting in `[start, end)`
    async fn read_data_points(
        &self,
        data_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FitDataPoint>>;
}
