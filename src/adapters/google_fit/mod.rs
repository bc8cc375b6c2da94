//! Google Fit integration
//!
//! Fit data points and sleep segments, reached through an injectable
//! [`FitBridge`].

pub mod adapter;
pub mod bridge;
pub mod export_file;

pub use adapter::GoogleFitAdapter;
pub use bridge::{FitBridge, FitDataPoint, FitValue, SLEEP_SEGMENT};
pub use export_file::{FitDataset, FitExportFile};
