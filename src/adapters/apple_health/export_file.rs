//! HealthKit bridge reading a JSON export from disk
//!
//! The export has the shape:
//!
//! ```json
//! {
//!   "quantity_samples": [
//!     {"sample_type": "HKQuantityTypeIdentifierHeartRate", "value": 62, "unit": "count/min",
//!      "start_date": "2024-01-01T08:00:00Z", "end_date": "2024-01-01T08:00:00Z"}
//!   ],
//!   "sleep_samples": [
//!     {"value": 3, "start_date": "2024-01-01T23:10:00Z", "end_date": "2024-01-02T01:00:00Z"}
//!   ]
//! }
//! ```

use super::bridge::{HealthKitBridge, HealthKitSample, HealthKitSleepSample};
use crate::domain::{MeridianError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HealthKitExport {
    #[serde(default)]
    pub quantity_samples: Vec<HealthKitSample>,
    #[serde(default)]
    pub sleep_samples: Vec<HealthKitSleepSample>,
}

/// Read-only HealthKit bridge over an exported file
#[derive(Debug, Clone)]
pub struct HealthKitExportFile {
    path: PathBuf,
}

impl HealthKitExportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<HealthKitExport> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MeridianError::Availability(format!(
                "cannot read HealthKit export {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            MeridianError::Serialization(format!(
                "invalid HealthKit export {}: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl HealthKitBridge for HealthKitExportFile {
    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// An export is already authorized by the user who produced it
    async fn request_authorization(&self, _type_identifiers: &[&str]) -> Result<bool> {
        Ok(self.is_available().await)
    }

    async fn query_quantity_samples(
        &self,
        type_identifier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthKitSample>> {
        let export = self.read().await?;
        Ok(export
            .quantity_samples
            .into_iter()
            .filter(|s| s.sample_type == type_identifier)
            .filter(|s| start <= s.start_date && s.start_date < end)
            .collect())
    }

    async fn query_sleep_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthKitSleepSample>> {
        let export = self.read().await?;
        Ok(export
            .sleep_samples
            .into_iter()
            .filter(|s| start <= s.start_date && s.start_date < end)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EXPORT: &str = r#"{
        "quantity_samples": [
            {"sample_type": "HKQuantityTypeIdentifierHeartRate", "value": 62, "unit": "count/min",
             "start_date": "2024-01-01T08:00:00Z", "end_date": "2024-01-01T08:00:00Z"},
            {"sample_type": "HKQuantityTypeIdentifierHeartRate", "value": 64, "unit": "count/min",
             "start_date": "2024-01-02T08:00:00Z", "end_date": "2024-01-02T08:00:00Z"},
            {"sample_type": "HKQuantityTypeIdentifierStepCount", "value": 900, "unit": "count",
             "start_date": "2024-01-01T09:00:00Z", "end_date": "2024-01-01T10:00:00Z"}
        ],
        "sleep_samples": []
    }"#;

    #[tokio::test]
    async fn test_filters_by_type_and_half_open_range() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();
        let bridge = HealthKitExportFile::new(file.path());

        assert!(bridge.is_available().await);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let samples = bridge
            .query_quantity_samples("HKQuantityTypeIdentifierHeartRate", start, end)
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 62.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let bridge = HealthKitExportFile::new("/nonexistent/healthkit.json");
        assert!(!bridge.is_available().await);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = bridge
            .query_sleep_samples(start, start + chrono::Duration::days(1))
            .await
            .unwrap_err();
        assert!(matches!(err, MeridianError::Availability(_)));
    }
}
