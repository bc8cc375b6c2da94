//! Domain models and types for Meridian.
//!
//! This module contains the canonical model of the interchange engine:
//!
//! - **Strongly-typed identifiers** ([`UserId`], [`DeviceId`])
//! - **Vocabulary** ([`MetricKind`], [`CODE_TABLE`]) and **units** ([`Unit`])
//! - **Canonical Observation** ([`Observation`], [`ObservationBuilder`])
//! - **Internal records** ([`HealthRecord`]) and query windows ([`TimeRange`])
//! - **Source configuration** ([`Platform`], [`SourceConfig`])
//! - **Error types** ([`MeridianError`], [`GatewayError`]) and [`Result`]
//!
//! # Building an Observation
//!
//! ```rust
//! use meridian::domain::{MetricKind, Observation, UserId};
//! use chrono::Utc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let user = UserId::new("user-1")?;
//! let observation = Observation::builder(MetricKind::HeartRate)
//!     .subject(&user)
//!     .effective(Utc::now())
//!     .canonical_quantity(72.0)
//!     .build()?;
//!
//! assert_eq!(observation.primary_coding().unwrap().code, "8867-4");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod metric;
pub mod observation;
pub mod platform;
pub mod record;
pub mod result;
pub mod units;

pub use errors::{GatewayError, MeridianError};
pub use ids::{DeviceId, UserId};
pub use metric::{Category, CodeEntry, MetricKind, CODE_TABLE, LOINC_SYSTEM, UCUM_SYSTEM};
pub use observation::{
    CodeableConcept, Coding, Extension, Observation, ObservationBuilder, ObservationStatus,
    ObservationValue, Quantity, Reference,
};
pub use platform::{Platform, SourceConfig, SourceSettings};
pub use record::{HealthRecord, TimeRange};
pub use result::Result;
pub use units::Unit;
