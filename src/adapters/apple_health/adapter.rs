//! Apple Health adapter

use super::bridge::{HealthKitBridge, HealthKitSample, HealthKitSleepSample};
use crate::adapters::platform::{
    probe_with_timeout, with_timeout, PlatformAdapter, DEFAULT_BRIDGE_TIMEOUT,
};
use crate::adapters::sleep::{aggregate_sleep, SleepSegment, SleepStage};
use crate::core::transform::{measurement_to_observation, source_device, ConversionBatch};
use crate::domain::{
    MeridianError, MetricKind, Observation, Platform, Result, TimeRange, Unit, UserId,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const HEART_RATE: &str = "HKQuantityTypeIdentifierHeartRate";
pub const OXYGEN_SATURATION: &str = "HKQuantityTypeIdentifierOxygenSaturation";
pub const BODY_TEMPERATURE: &str = "HKQuantityTypeIdentifierBodyTemperature";
pub const STEP_COUNT: &str = "HKQuantityTypeIdentifierStepCount";
pub const ACTIVE_ENERGY: &str = "HKQuantityTypeIdentifierActiveEnergyBurned";
pub const SLEEP_ANALYSIS: &str = "HKCategoryTypeIdentifierSleepAnalysis";

/// HealthKit type identifier of each kind
fn type_identifier(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::HeartRate => HEART_RATE,
        MetricKind::OxygenSaturation => OXYGEN_SATURATION,
        MetricKind::BodyTemperature => BODY_TEMPERATURE,
        MetricKind::Steps => STEP_COUNT,
        MetricKind::SleepDuration => SLEEP_ANALYSIS,
        MetricKind::ActiveEnergy => ACTIVE_ENERGY,
    }
}

fn kind_for_type(identifier: &str) -> Option<MetricKind> {
    MetricKind::ALL
        .iter()
        .copied()
        .find(|kind| type_identifier(*kind) == identifier)
}

/// `HKCategoryValueSleepAnalysis` raw values
fn sleep_stage(value: i64) -> Option<SleepStage> {
    match value {
        0 => Some(SleepStage::InBed),
        1 => Some(SleepStage::Asleep),
        2 => Some(SleepStage::Awake),
        3 => Some(SleepStage::Light),
        4 => Some(SleepStage::Deep),
        5 => Some(SleepStage::Rem),
        _ => None,
    }
}

/// HKUnit strings; HealthKit's `%` unit carries a fraction in `[0, 1]`
fn sample_unit(unit: &str) -> Result<Unit> {
    match unit {
        "%" => Ok(Unit::Fraction),
        "count" => Ok(Unit::Steps),
        other => Unit::parse(other),
    }
}

/// Adapter for Apple Health (HealthKit) data
pub struct AppleHealthAdapter {
    bridge: Arc<dyn HealthKitBridge>,
    timeout: Duration,
}

impl AppleHealthAdapter {
    pub fn new(bridge: Arc<dyn HealthKitBridge>) -> Self {
        Self {
            bridge,
            timeout: DEFAULT_BRIDGE_TIMEOUT,
        }
    }

    /// Overrides the bridge call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches quantity samples of one kind
    pub async fn query_records(
        &self,
        kind: MetricKind,
        range: TimeRange,
    ) -> Result<Vec<HealthKitSample>> {
        if kind.is_sleep() {
            return Err(MeridianError::Validation(
                "sleep is queried through query_sleep".to_string(),
            ));
        }
        let identifier = type_identifier(kind);
        tracing::debug!(sample_type = identifier, start = %range.start, end = %range.end, "Querying HealthKit samples");
        with_timeout(
            "apple_health.query_records",
            self.timeout,
            self.bridge
                .query_quantity_samples(identifier, range.start, range.end),
        )
        .await
    }

    /// Fetches sleep analysis samples
    pub async fn query_sleep(&self, range: TimeRange) -> Result<Vec<HealthKitSleepSample>> {
        with_timeout(
            "apple_health.query_sleep",
            self.timeout,
            self.bridge.query_sleep_samples(range.start, range.end),
        )
        .await
    }

    /// Converts quantity samples, skipping unknown sample types as failures
    pub fn convert_to_canonical(
        &self,
        samples: &[HealthKitSample],
        user: &UserId,
    ) -> ConversionBatch<Observation> {
        let mut batch = ConversionBatch::new();
        for (index, sample) in samples.iter().enumerate() {
            let label = sample
                .uuid
                .clone()
                .unwrap_or_else(|| format!("{}@{}", sample.sample_type, sample.start_date));
            match convert_sample(sample, user) {
                Ok(observation) => batch.push(observation),
                Err(e) => {
                    tracing::warn!(
                        sample_type = %sample.sample_type,
                        error = %e,
                        "Skipping HealthKit sample"
                    );
                    batch.fail(index, label, e);
                }
            }
        }
        batch
    }

    /// Converts sleep samples into one Observation per day
    pub fn convert_sleep_to_canonical(
        &self,
        samples: &[HealthKitSleepSample],
        user: &UserId,
    ) -> ConversionBatch<Observation> {
        let mut batch = ConversionBatch::new();
        let mut segments = Vec::with_capacity(samples.len());
        let mut origins = Vec::with_capacity(samples.len());
        for (index, sample) in samples.iter().enumerate() {
            match sleep_stage(sample.value) {
                Some(stage) => {
                    segments.push(SleepSegment::new(stage, sample.start_date, sample.end_date));
                    origins.push(index);
                }
                None => batch.fail(
                    index,
                    format!("sleep@{}", sample.start_date),
                    MeridianError::Conversion(format!(
                        "unknown HealthKit sleep value {}",
                        sample.value
                    )),
                ),
            }
        }
        let mut aggregated = aggregate_sleep(&segments, user);
        // Segment indices point into the input again
        for failure in &mut aggregated.failures {
            failure.index = origins.get(failure.index).copied().unwrap_or(failure.index);
        }
        batch.extend(aggregated);
        batch
    }
}

fn convert_sample(sample: &HealthKitSample, user: &UserId) -> Result<Observation> {
    let kind = kind_for_type(&sample.sample_type)
        .filter(|kind| !kind.is_sleep())
        .ok_or_else(|| {
            MeridianError::unsupported_metric(
                sample.sample_type.clone(),
                "not a known HealthKit quantity type",
            )
        })?;
    let unit = sample_unit(&sample.unit)?;
    let device = source_device(sample.source_device.as_deref());
    measurement_to_observation(kind, sample.value, unit, sample.start_date, user, device)
}

#[async_trait]
impl PlatformAdapter for AppleHealthAdapter {
    fn platform(&self) -> Platform {
        Platform::AppleHealth
    }

    async fn is_available(&self) -> bool {
        probe_with_timeout(Platform::AppleHealth, self.timeout, self.bridge.is_available()).await
    }

    async fn request_permissions(&self, kinds: &[MetricKind]) -> Result<bool> {
        let identifiers: Vec<&str> = kinds.iter().map(|k| type_identifier(*k)).collect();
        with_timeout(
            "apple_health.request_permissions",
            self.timeout,
            self.bridge.request_authorization(&identifiers),
        )
        .await
    }

    fn native_type(&self, kind: MetricKind) -> Option<&'static str> {
        Some(type_identifier(kind))
    }

    async fn import_metric(
        &self,
        kind: MetricKind,
        range: TimeRange,
        user: &UserId,
    ) -> Result<ConversionBatch<Observation>> {
        // Kinds outside the vocabulary cannot become Observations
        kind.code_entry()?;
        if kind.is_sleep() {
            let samples = self.query_sleep(range).await?;
            Ok(self.convert_sleep_to_canonical(&samples, user))
        } else {
            let samples = self.query_records(kind, range).await?;
            Ok(self.convert_to_canonical(&samples, user))
        }
    }
}
