//! Google Fit adapter

use super::bridge::{FitBridge, FitDataPoint, SLEEP_SEGMENT};
use crate::adapters::platform::{
    probe_with_timeout, with_timeout, PlatformAdapter, DEFAULT_BRIDGE_TIMEOUT,
};
use crate::adapters::sleep::{aggregate_sleep, SleepSegment, SleepStage};
use crate::core::transform::{measurement_to_observation, ConversionBatch};
use crate::domain::{
    DeviceId, MeridianError, MetricKind, Observation, Platform, Result, TimeRange, Unit, UserId,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Fit data type name and the unit its values are recorded in
fn data_type(kind: MetricKind) -> (&'static str, Unit) {
    match kind {
        MetricKind::HeartRate => ("com.google.heart_rate.bpm", Unit::BeatsPerMinute),
        MetricKind::OxygenSaturation => ("com.google.oxygen_saturation", Unit::Percent),
        MetricKind::BodyTemperature => ("com.google.body.temperature", Unit::Celsius),
        MetricKind::Steps => ("com.google.step_count.delta", Unit::Steps),
        MetricKind::SleepDuration => (SLEEP_SEGMENT, Unit::Minutes),
        MetricKind::ActiveEnergy => ("com.google.calories.expended", Unit::Kilocalories),
    }
}

fn kind_for_data_type(name: &str) -> Option<(MetricKind, Unit)> {
    MetricKind::ALL.iter().find_map(|kind| {
        let (data_type_name, unit) = data_type(*kind);
        (data_type_name == name).then_some((*kind, unit))
    })
}

/// `com.google.sleep.segment` stage values
fn sleep_stage(value: i64) -> Option<SleepStage> {
    match value {
        1 => Some(SleepStage::Awake),
        2 => Some(SleepStage::Asleep),
        3 => Some(SleepStage::OutOfBed),
        4 => Some(SleepStage::Light),
        5 => Some(SleepStage::Deep),
        6 => Some(SleepStage::Rem),
        _ => None,
    }
}

/// Device id from a Fit data source id (`derived:<type>:<package>:<device>:...`)
fn origin_device(source_id: &str) -> Option<DeviceId> {
    let mut parts = source_id.split(':');
    match (parts.next(), parts.nth(2)) {
        (Some("raw") | Some("derived"), Some(device)) if !device.is_empty() => {
            DeviceId::new(device).ok()
        }
        _ => None,
    }
}

/// Adapter for Google Fit data
pub struct GoogleFitAdapter {
    bridge: Arc<dyn FitBridge>,
    timeout: Duration,
}

impl GoogleFitAdapter {
    pub fn new(bridge: Arc<dyn FitBridge>) -> Self {
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

    /// Fetches data points of one kind
    pub async fn query_records(
        &self,
        kind: MetricKind,
        range: TimeRange,
    ) -> Result<Vec<FitDataPoint>> {
        if kind.is_sleep() {
            return Err(MeridianError::Validation(
                "sleep is queried through query_sleep".to_string(),
            ));
        }
        let (name, _) = data_type(kind);
        with_timeout(
            "google_fit.query_records",
            self.timeout,
            self.bridge.read_data_points(name, range.start, range.end),
        )
        .await
    }

    /// Fetches sleep segments
    pub async fn query_sleep(&self, range: TimeRange) -> Result<Vec<FitDataPoint>> {
        with_timeout(
            "google_fit.query_sleep",
            self.timeout,
            self.bridge
                .read_data_points(SLEEP_SEGMENT, range.start, range.end),
        )
        .await
    }

    /// Converts data points, skipping unknown data types as failures
    pub fn convert_to_canonical(
        &self,
        points: &[FitDataPoint],
        user: &UserId,
    ) -> ConversionBatch<Observation> {
        let mut batch = ConversionBatch::new();
        for (index, point) in points.iter().enumerate() {
            match convert_point(point, user) {
                Ok(observation) => batch.push(observation),
                Err(e) => {
                    tracing::warn!(
                        data_type = %point.data_type_name,
                        error = %e,
                        "Skipping Fit data point"
                    );
                    batch.fail(
                        index,
                        format!("{}@{}", point.data_type_name, point.start()),
                        e,
                    );
                }
            }
        }
        batch
    }

    /// Converts sleep segments into one Observation per day
    pub fn convert_sleep_to_canonical(
        &self,
        points: &[FitDataPoint],
        user: &UserId,
    ) -> ConversionBatch<Observation> {
        let mut batch = ConversionBatch::new();
        let mut segments = Vec::with_capacity(points.len());
        let mut origins = Vec::with_capacity(points.len());
        for (index, point) in points.iter().enumerate() {
            let stage = point
                .value
                .first()
                .and_then(|v| v.int_val)
                .and_then(sleep_stage);
            match stage {
                Some(stage) if point.data_type_name == SLEEP_SEGMENT => {
                    segments.push(SleepSegment::new(stage, point.start(), point.end()));
                    origins.push(index);
                }
                _ => batch.fail(
                    index,
                    format!("sleep@{}", point.start()),
                    MeridianError::Conversion(format!(
                        "unknown Fit sleep segment {:?} of type {}",
                        point.value.first(),
                        point.data_type_name
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

fn convert_point(point: &FitDataPoint, user: &UserId) -> Result<Observation> {
    let (kind, unit) = kind_for_data_type(&point.data_type_name)
        .filter(|(kind, _)| !kind.is_sleep())
        .ok_or_else(|| {
            MeridianError::unsupported_metric(
                point.data_type_name.clone(),
                "not a known Fit data type",
            )
        })?;
    let value = point.first_value().ok_or_else(|| {
        MeridianError::Conversion(format!(
            "{} data point has no numeric value",
            point.data_type_name
        ))
    })?;
    let device = point.origin_data_source_id.as_deref().and_then(origin_device);
    measurement_to_observation(kind, value, unit, point.start(), user, device)
}

#[async_trait]
impl PlatformAdapter for GoogleFitAdapter {
    fn platform(&self) -> Platform {
        Platform::GoogleFit
    }

    async fn is_available(&self) -> bool {
        probe_with_timeout(Platform::GoogleFit, self.timeout, self.bridge.is_available()).await
    }

    async fn request_permissions(&self, kinds: &[MetricKind]) -> Result<bool> {
        let names: Vec<&str> = kinds.iter().map(|k| data_type(*k).0).collect();
        with_timeout(
            "google_fit.request_permissions",
            self.timeout,
            self.bridge.request_permissions(&names),
        )
        .await
    }

    fn native_type(&self, kind: MetricKind) -> Option<&'static str> {
        Some(data_type(kind).0)
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
            let points = self.query_sleep(range).await?;
            Ok(self.convert_sleep_to_canonical(&points, user))
        } else {
            let points = self.query_records(kind, range).await?;
            Ok(self.convert_to_canonical(&points, user))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::google_fit::bridge::FitValue;
    use chrono::{DateTime, TimeZone, Utc};

    struct NoBridge;

    #[async_trait]
    impl FitBridge for NoBridge {
        async fn is_available(&self) -> bool {
            true
        }
        async fn request_permissions(&self, _: &[&str]) -> Result<bool> {
            Ok(true)
        }
        async fn read_data_points(
            &self,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<FitDataPoint>> {
            Ok(Vec::new())
        }
    }

    fn point(name: &str, at: DateTime<Utc>, minutes: i64, value: FitValue) -> FitDataPoint {
        FitDataPoint {
            data_type_name: name.to_string(),
            start_time_nanos: at.timestamp_nanos_opt().unwrap(),
            end_time_nanos: (at + chrono::Duration::minutes(minutes))
                .timestamp_nanos_opt()
                .unwrap(),
            value: vec![value],
            origin_data_source_id: Some(
                "derived:com.google.step_count.delta:com.google.android.gms:pixel7:estimated_steps"
                    .to_string(),
            ),
        }
    }

    #[test]
    fn test_steps_converted_with_device() {
        let user = UserId::new("u1").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let adapter = GoogleFitAdapter::new(Arc::new(NoBridge));
        let batch = adapter.convert_to_canonical(
            &[point("com.google.step_count.delta", at, 60, FitValue::int(1500))],
            &user,
        );

        let obs = &batch.converted[0];
        assert_eq!(obs.primary_coding().unwrap().code, "41950-7");
        assert_eq!(obs.quantity().unwrap().value, 1500.0);
        assert_eq!(obs.device().unwrap().reference, "Device/pixel7");
    }

    #[test]
    fn test_sleep_stages() {
        let user = UserId::new("u1").unwrap();
        let night = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let adapter = GoogleFitAdapter::new(Arc::new(NoBridge));
        let points = vec![
            point(SLEEP_SEGMENT, night, 90, FitValue::int(4)),
            point(SLEEP_SEGMENT, night + chrono::Duration::minutes(90), 30, FitValue::int(1)),
            point(SLEEP_SEGMENT, night + chrono::Duration::minutes(120), 60, FitValue::int(6)),
            point(SLEEP_SEGMENT, night, 10, FitValue::int(99)),
        ];
        let batch = adapter.convert_sleep_to_canonical(&points, &user);

        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.converted.len(), 2);
        assert_eq!(batch.converted[0].quantity().unwrap().value, 90.0);
        assert_eq!(batch.converted[1].quantity().unwrap().value, 60.0);
    }

    #[test]
    fn test_sleep_failures_keep_input_indices() {
        let user = UserId::new("u1").unwrap();
        let night = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let adapter = GoogleFitAdapter::new(Arc::new(NoBridge));
        let points = vec![
            point(SLEEP_SEGMENT, night, 10, FitValue::int(99)),
            point(SLEEP_SEGMENT, night, 60, FitValue::int(4)),
            point(SLEEP_SEGMENT, night, -30, FitValue::int(5)),
        ];
        let batch = adapter.convert_sleep_to_canonical(&points, &user);

        let mut indices: Vec<_> = batch.failures.iter().map(|f| f.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(batch.converted.len(), 1);
    }

    #[test]
    fn test_origin_device_parsing() {
        assert_eq!(
            origin_device("raw:com.google.heart_rate.bpm:com.fitbit:versa:hr")
                .unwrap()
                .as_str(),
            "versa"
        );
        assert!(origin_device("derived:com.google.heart_rate.bpm:com.google.android.gms::merged").is_none());
        assert!(origin_device("garbage").is_none());
    }
}
