//! Sleep segment aggregation shared by the wearable adapters
//!
//! Wearables report sleep as stage-tagged segments. The canonical model has a
//! single daily sleep-duration Observation, so segments are grouped by the UTC
//! calendar date of their start and the asleep minutes summed per day.

use crate::core::transform::{measurement_to_observation, ConversionBatch};
use crate::domain::{MeridianError, MetricKind, Observation, Unit, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Platform-neutral sleep stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepStage {
    /// In bed, not asleep
    InBed,
    Awake,
    /// Out of bed during the session
    OutOfBed,
    /// Asleep, stage not reported
    Asleep,
    /// Core (Apple) or light (Google) sleep
    Light,
    Deep,
    Rem,
}

impl SleepStage {
    /// Whether minutes in this stage count towards sleep duration
    pub fn is_asleep(&self) -> bool {
        match self {
            SleepStage::Asleep | SleepStage::Light | SleepStage::Deep | SleepStage::Rem => true,
            SleepStage::InBed | SleepStage::Awake | SleepStage::OutOfBed => false,
        }
    }
}

/// One sleep segment after the platform's stage code has been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SleepSegment {
    pub stage: SleepStage,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SleepSegment {
    pub fn new(stage: SleepStage, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { stage, start, end }
    }

    pub fn minutes(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 60.0
    }
}

/// Aggregates segments into one sleep-duration Observation per UTC day
///
/// Days with no asleep minutes produce nothing. A segment that ends before it
/// starts is reported as a failure at its index and contributes nothing. A day
/// whose total cannot be converted fails at the index of its first segment.
pub fn aggregate_sleep(segments: &[SleepSegment], user: &UserId) -> ConversionBatch<Observation> {
    let mut batch = ConversionBatch::new();
    // day -> (index of the day's first segment, asleep minutes)
    let mut days: BTreeMap<NaiveDate, (usize, f64)> = BTreeMap::new();

    for (index, segment) in segments.iter().enumerate() {
        if segment.end < segment.start {
            batch.fail(
                index,
                format!("sleep@{}", segment.start),
                MeridianError::Conversion(format!(
                    "sleep segment ends at {} before it starts at {}",
                    segment.end, segment.start
                )),
            );
            continue;
        }
        if segment.stage.is_asleep() {
            days.entry(segment.start.date_naive())
                .or_insert((index, 0.0))
                .1 += segment.minutes();
        }
    }

    for (day, (first_index, minutes)) in days {
        if minutes <= 0.0 {
            continue;
        }
        let midnight = day.and_time(chrono::NaiveTime::MIN).and_utc();
        match measurement_to_observation(
            MetricKind::SleepDuration,
            minutes,
            Unit::Minutes,
            midnight,
            user,
            None,
        ) {
            Ok(observation) => batch.push(observation),
            Err(e) => batch.fail(first_index, format!("sleep@{day}"), e),
        }
    }

    batch
}
