//! External system integrations for Meridian.
//!
//! This module provides one adapter per data source plus the persistence
//! backends for per-user source configuration:
//!
//! - [`platform`] - the [`PlatformAdapter`](platform::PlatformAdapter) contract
//! - [`apple_health`] - HealthKit samples through a `HealthKitBridge`
//! - [`google_fit`] - Fit data points through a `FitBridge`
//! - [`clinical`] - FHIR R4 server through a `FhirGateway`
//! - [`sleep`] - sleep segment aggregation shared by the wearable adapters
//! - [`config_store`] - source configuration persistence
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external systems and
//! enable testing with fake bridges. Each adapter wraps exactly one bridge
//! trait; the production bridges read native exports from disk or talk HTTP.
//!
//! ```rust,no_run
//! use meridian::adapters::google_fit::{FitExportFile, GoogleFitAdapter};
//! use meridian::adapters::platform::PlatformAdapter;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let adapter = GoogleFitAdapter::new(Arc::new(FitExportFile::new("fit-export.json")));
//! if adapter.is_available().await {
//!     // import through the coordinator
//! }
//! # }
//! ```

pub mod apple_health;
pub mod clinical;
pub mod config_store;
pub mod google_fit;
pub mod platform;
pub mod sleep;
