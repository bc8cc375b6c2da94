//! Internal record <-> canonical Observation conversion
//!
//! Values are converted into the metric's canonical unit on the way in; the
//! caller's unit is kept as an extension when it differs so the way out can
//! render the value exactly as it was reported.

use super::ConversionBatch;
use crate::domain::units::{self, Unit};
use chrono::{DateTime, Utc};
use crate::domain::{
    DeviceId, HealthRecord, MeridianError, MetricKind, Observation, ObservationValue, Platform,
    Result, UserId,
};

/// Converts internal records into canonical Observations for `user`
///
/// Records of unknown kinds fail with `UnsupportedMetric`; bad units, values
/// outside the plausible range of the kind, and records owned by another user
/// fail with `Conversion`/`Validation`. Failures never abort the batch.
pub fn to_canonical(records: &[HealthRecord], user: &UserId) -> ConversionBatch<Observation> {
    let mut batch = ConversionBatch::new();
    for (index, record) in records.iter().enumerate() {
        match to_canonical_one(record, user) {
            Ok(observation) => batch.push(observation),
            Err(e) => {
                tracing::debug!(
                    index = index,
                    metric = %record.metric,
                    error = %e,
                    "Skipping record that cannot be made canonical"
                );
                let label = record
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}@{}", record.metric, record.recorded_at));
                batch.fail(index, label, e);
            }
        }
    }
    batch
}

/// Converts a single internal record
pub fn to_canonical_one(record: &HealthRecord, user: &UserId) -> Result<Observation> {
    if record.user_id != *user {
        return Err(MeridianError::Validation(format!(
            "record belongs to {}, not {}",
            record.user_id, user
        )));
    }

    let kind: MetricKind = record.metric.parse()?;
    let unit = Unit::parse(&record.unit)?;
    let device = source_device(record.device_id.as_deref());

    measurement_to_observation(kind, record.value, unit, record.recorded_at, user, device)
}

/// Parses a device id reported by a source; an unusable id is dropped and
/// the measurement kept without a device
pub fn source_device(raw: Option<&str>) -> Option<DeviceId> {
    let raw = raw?;
    match DeviceId::new(raw) {
        Ok(device) => Some(device),
        Err(e) => {
            tracing::debug!(device_id = %raw, error = %e, "Ignoring invalid device id");
            None
        }
    }
}

/// Builds a canonical Observation from one measurement in any unit of the
/// kind's dimension
///
/// Shared by the record converter and every platform adapter so that all
/// sources apply the same unit conversion and plausibility rules.
pub fn measurement_to_observation(
    kind: MetricKind,
    value: f64,
    unit: Unit,
    at: DateTime<Utc>,
    user: &UserId,
    device: Option<DeviceId>,
) -> Result<Observation> {
    let entry = kind.code_entry()?;
    let canonical = units::convert(value, unit, entry.unit)?;
    check_plausible(kind, canonical)?;

    Observation::builder(kind)
        .subject(user)
        .effective(at)
        .canonical_quantity(canonical)
        .original_unit(unit)
        .device(device)
        .build()
}

/// Converts canonical Observations back into internal records
///
/// `source` is stamped on every produced record. Observations whose code is
/// outside the vocabulary fail with `UnsupportedMetric`; non-numeric values and
/// malformed subjects fail with `Conversion`.
pub fn from_canonical(
    observations: &[Observation],
    source: Option<Platform>,
) -> ConversionBatch<HealthRecord> {
    let mut batch = ConversionBatch::new();
    for (index, observation) in observations.iter().enumerate() {
        match from_canonical_one(observation, source) {
            Ok(record) => batch.push(record),
            Err(e) => {
                tracing::debug!(
                    index = index,
                    observation_id = %observation.id(),
                    error = %e,
                    "Skipping observation that cannot be mapped to an internal record"
                );
                batch.fail(index, observation.id(), e);
            }
        }
    }
    batch
}

/// Converts a single canonical Observation
pub fn from_canonical_one(
    observation: &Observation,
    source: Option<Platform>,
) -> Result<HealthRecord> {
    let kind = observation.metric_kind()?;
    let entry = kind.code_entry()?;

    let canonical_value = match observation.value() {
        ObservationValue::Quantity(q) => {
            let stored = Unit::parse(&q.code)?;
            if stored != entry.unit {
                return Err(MeridianError::Conversion(format!(
                    "{kind} stored in {stored}, expected {}",
                    entry.unit
                )));
            }
            q.value
        }
        ObservationValue::Integer(i) => *i as f64,
        other => {
            return Err(MeridianError::Conversion(format!(
                "{kind} has a non-numeric value {other:?}"
            )))
        }
    };

    let target = match observation.original_unit() {
        Some(raw) => Unit::parse(raw)?,
        None => entry.unit,
    };
    let value = units::convert(canonical_value, entry.unit, target)?;

    let user = observation
        .subject_user()
        .ok_or_else(|| {
            MeridianError::Conversion(format!(
                "subject '{}' is not a patient reference",
                observation.subject().reference
            ))
        })
        .and_then(|id| UserId::new(id).map_err(MeridianError::Conversion))?;

    Ok(HealthRecord {
        id: Some(observation.id().to_string()),
        user_id: user,
        metric: kind.as_str().to_string(),
        value,
        unit: target.display().to_string(),
        recorded_at: observation.effective_date_time(),
        source,
        device_id: observation.device_id().map(|d| d.as_str().to_string()),
    })
}

/// Rejects canonical values no sensor can produce, which usually means a
/// misdeclared unit (e.g. a fraction labelled as percent)
fn check_plausible(kind: MetricKind, value: f64) -> Result<()> {
    let (min, max) = match kind {
        MetricKind::HeartRate => (1.0, 300.0),
        MetricKind::OxygenSaturation => (1.0, 100.0),
        MetricKind::BodyTemperature => (20.0, 46.0),
        MetricKind::Steps => (0.0, 200_000.0),
        MetricKind::SleepDuration => (0.0, 1440.0),
        MetricKind::ActiveEnergy => (0.0, 20_000.0),
    };
    if value < min || value > max {
        return Err(MeridianError::Conversion(format!(
            "{kind} value {value} outside plausible range [{min}, {max}]"
        )));
    }
    Ok(())
}
