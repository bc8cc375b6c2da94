//! Fit bridge reading a dataset export from disk
//!
//! The export is a Fit REST dataset: `{"point": [FitDataPoint, ...]}`.

use super::bridge::{FitBridge, FitDataPoint};
use crate::domain::{MeridianError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FitDataset {
    #[serde(default)]
    pub point: Vec<FitDataPoint>,
}

/// Read-only Fit bridge over an exported dataset file
#[derive(Debug, Clone)]
pub struct FitExportFile {
    path: PathBuf,
}

impl FitExportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<FitDataset> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MeridianError::Availability(format!(
                "cannot read Fit export {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl FitBridge for FitExportFile {
    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn request_permissions(&self, _data_types: &[&str]) -> Result<bool> {
        Ok(self.is_available().await)
    }

    async fn read_data_points(
        &self,
        data_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FitDataPoint>> {
        let dataset = self.read().await?;
        Ok(dataset
            .point
            .into_iter()
            .filter(|p| p.data_type_name == data_type)
            .filter(|p| {
                let at = p.start();
                start <= at && at < end
            })
            .collect())
    }
}
