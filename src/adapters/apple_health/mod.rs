//! Apple Health integration
//!
//! HealthKit quantity samples and sleep analysis categories, reached through
//! an injectable [`HealthKitBridge`].

pub mod adapter;
pub mod bridge;
pub mod export_file;

pub use adapter::AppleHealthAdapter;
pub use bridge::{HealthKitBridge, HealthKitSample, HealthKitSleepSample};
pub use export_file::{HealthKitExport, HealthKitExportFile};
