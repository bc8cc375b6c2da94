//! HealthKit bridge contract and native sample types

use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A HealthKit quantity sample as handed over by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthKitSample {
    /// Quantity type identifier, e.g. `HKQuantityTypeIdentifierHeartRate`
    pub sample_type: String,

    pub value: f64,

    /// HKUnit string the value is expressed in, e.g. `count/min`, `degF`, `%`
    pub unit: String,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[serde(default)]
    pub uuid: Option<String>,

    /// Name of the recording device, if HealthKit knows it
    #[serde(default)]
    pub source_device: Option<String>,
}

/// A HealthKit sleep analysis category sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthKitSleepSample {
    /// `HKCategoryValueSleepAnalysis` raw value
    pub value: i64,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[serde(default)]
    pub source_device: Option<String>,
}

/// Access to the HealthKit store
///
/// On device this is backed by the native SDK; tests supply fakes and the CLI
/// reads an exported JSON file ([`super::HealthKitExportFile`]).
#[async_trait]
pub trait HealthKitBridge: Send + Sync {
    /// Whether HealthKit data can be read at all
    async fn is_available(&self) -> bool;

    /// Requests read authorization for the given type identifiers
    async fn request_authorization(&self, type_identifiers: &[&str]) -> Result<bool>;

    /// Quantity samples of one type starting in `[start, end)`
    async fn query_quantity_samples(
        &self,
        type_identifier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthKitSample>>;

    /// Sleep analysis samples starting in `[start, end)`
    async fn query_sleep_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthKitSleepSample>>;
}
