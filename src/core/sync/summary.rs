//! Sync results and error reporting
//!
//! Import, export and permission calls never abort on a per-kind or per-item
//! failure; they return their data together with a list of [`SyncError`]s.

use crate::core::transform::ItemFailure;
use crate::domain::{HealthRecord, MeridianError, MetricKind, Observation, Platform};
use std::collections::BTreeMap;
use std::time::Duration;

/// Category of a recorded sync error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncErrorType {
    /// Platform or bridge not reachable
    Availability,
    /// User declined access
    PermissionDenied,
    /// Credentials rejected or token flow failed
    Authentication,
    /// Kind has no mapping on the platform or in the vocabulary
    UnsupportedMetric,
    /// A bridge call exceeded its timeout
    Timeout,
    /// One record could not be converted
    Conversion,
    /// Configuration store failure
    ConfigStore,
    /// HTTP-level gateway failure
    Gateway,
    /// Anything else
    Internal,
}

impl SyncErrorType {
    fn of(error: &MeridianError) -> Self {
        match error {
            MeridianError::Availability(_) => SyncErrorType::Availability,
            MeridianError::PermissionDenied(_) => SyncErrorType::PermissionDenied,
            MeridianError::Authentication(_) => SyncErrorType::Authentication,
            MeridianError::UnsupportedMetric { .. } => SyncErrorType::UnsupportedMetric,
            MeridianError::Timeout { .. } => SyncErrorType::Timeout,
            MeridianError::Conversion(_)
            | MeridianError::Validation(_)
            | MeridianError::Serialization(_) => SyncErrorType::Conversion,
            MeridianError::ConfigStore(_) => SyncErrorType::ConfigStore,
            MeridianError::Gateway(_) => SyncErrorType::Gateway,
            MeridianError::UnsupportedOperation { .. }
            | MeridianError::PlatformDisabled(_)
            | MeridianError::Configuration(_)
            | MeridianError::Io(_) => SyncErrorType::Internal,
        }
    }
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq)]
pub struct SyncError {
    pub error_type: SyncErrorType,
    pub platform: Platform,
    pub metric: Option<String>,
    pub message: String,
    pub retryable: bool,
}

impl SyncError {
    /// Records `error` against a platform and, optionally, a metric
    pub fn from_error(error: &MeridianError, platform: Platform, metric: Option<String>) -> Self {
        Self {
            error_type: SyncErrorType::of(error),
            platform,
            metric,
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }

    /// Records a per-kind failure
    pub fn for_kind(error: &MeridianError, platform: Platform, kind: MetricKind) -> Self {
        Self::from_error(error, platform, Some(kind.to_string()))
    }

    /// Records a per-item conversion or push failure
    pub fn for_item(failure: &ItemFailure, platform: Platform, metric: Option<String>) -> Self {
        let mut error = Self::from_error(&failure.error, platform, metric);
        error.message = format!("{}: {}", failure.item, error.message);
        error
    }
}

fn error_breakdown(errors: &[SyncError]) -> BTreeMap<SyncErrorType, usize> {
    let mut counts = BTreeMap::new();
    for error in errors {
        *counts.entry(error.error_type).or_insert(0) += 1;
    }
    counts
}

/// Outcome of an import
#[derive(Debug)]
pub struct ImportResult {
    pub platform: Platform,

    /// Canonical Observations, deduplicated by content and in a stable order
    pub observations: Vec<Observation>,

    /// The same data as internal records
    pub records: Vec<HealthRecord>,

    pub errors: Vec<SyncError>,

    /// Whether the import stopped early on cancellation
    pub cancelled: bool,

    pub duration: Duration,
}

impl ImportResult {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            observations: Vec::new(),
            records: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    /// Errors recorded against one metric kind
    pub fn errors_for(&self, kind: MetricKind) -> Vec<&SyncError> {
        let name = kind.to_string();
        self.errors
            .iter()
            .filter(|e| e.metric.as_deref() == Some(name.as_str()))
            .collect()
    }

    pub fn log_summary(&self) {
        crate::log_import_complete!(
            self.platform,
            self.observations.len(),
            self.errors.len(),
            self.duration
        );

        if self.cancelled {
            tracing::warn!(platform = %self.platform, "Import was cancelled");
        }

        if !self.errors.is_empty() {
            let breakdown = error_breakdown(&self.errors);
            tracing::warn!(
                error_count = self.errors.len(),
                breakdown = ?breakdown,
                "Import completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    metric = ?error.metric,
                    retryable = error.retryable,
                    message = %error.message,
                    "Import error"
                );
            }
        }
    }
}

/// Outcome of an export
#[derive(Debug)]
pub struct ExportResult {
    pub platform: Platform,

    /// Observations the platform accepted
    pub pushed: usize,

    pub errors: Vec<SyncError>,
}

impl ExportResult {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            pushed: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            platform = %self.platform,
            pushed = self.pushed,
            errors = self.errors.len(),
            "Export completed"
        );
        for error in &self.errors {
            tracing::warn!(
                error_type = ?error.error_type,
                message = %error.message,
                "Export error"
            );
        }
    }
}

/// Outcome of a permission request, per kind
#[derive(Debug)]
pub struct PermissionReport {
    pub platform: Platform,

    /// Kinds the platform granted
    pub granted: Vec<MetricKind>,

    /// Kinds that failed, with the reason
    pub errors: Vec<SyncError>,
}

impl PermissionReport {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            granted: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_granted(&self, kind: MetricKind) -> bool {
        self.granted.contains(&kind)
    }
}
