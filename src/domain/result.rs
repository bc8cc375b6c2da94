//! Result type alias for Meridian

use super::errors::MeridianError;

/// Result of a call-level Meridian operation
///
/// Per-record and per-kind failures inside imports and exports are not
/// carried here; they are collected as `SyncError`s next to the data.
///
/// ```
/// use meridian::domain::{MetricKind, Result};
///
/// fn loinc(kind: MetricKind) -> Result<&'static str> {
///     Ok(kind.code_entry()?.code)
/// }
///
/// assert_eq!(loinc(MetricKind::Steps).unwrap(), "41950-7");
/// assert!(loinc(MetricKind::ActiveEnergy).is_err());
/// ```
pub type Result<T> = std::result::Result<T, MeridianError>;
