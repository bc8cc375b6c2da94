// Meridian - Health Data Interchange Engine
// Copyright (c) 2025 Meridian Contributors
// Licensed under the MIT License

//! # Meridian - Health Data Interchange Engine
//!
//! Meridian moves health measurements between wearable platforms, clinical
//! FHIR servers and the application's own records, using a FHIR R4
//! Observation as the single canonical form in between.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Importing** measurements from Apple Health, Google Fit and clinical
//!   EHR systems, per metric kind and time window
//! - **Converting** between platform data, canonical Observations and
//!   internal records, with LOINC codes and UCUM units
//! - **Exporting** internal records to writable platforms
//! - **Managing** per-user data source configuration with a persistent store
//!
//! ## Architecture
//!
//! Meridian follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (sync orchestration, registry, transform)
//! - [`adapters`] - External integrations (wearable bridges, FHIR gateway, config store)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meridian::config::load_config;
//! use meridian::core::sync::SyncCoordinator;
//! use meridian::domain::{MetricKind, Platform, TimeRange, UserId};
//! use chrono::{Duration, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("meridian.toml")?;
//!     let coordinator = SyncCoordinator::from_config(&config)?;
//!
//!     let user = UserId::new("user-1")?;
//!     coordinator.configure(&user).await?;
//!     coordinator
//!         .enable_data_source(&user, Platform::GoogleFit, None)
//!         .await?;
//!
//!     let (_cancel_tx, cancel) = tokio::sync::watch::channel(false);
//!     let range = TimeRange::new(Utc::now() - Duration::days(7), Utc::now())?;
//!     let result = coordinator
//!         .import_data(
//!             Platform::GoogleFit,
//!             &[MetricKind::HeartRate, MetricKind::Steps],
//!             &user,
//!             range,
//!             cancel,
//!         )
//!         .await?;
//!
//!     println!("Imported {} observations", result.observations.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Call-level failures use [`domain::MeridianError`]. Imports, exports and
//! permission requests keep going past per-kind and per-record failures and
//! report them as [`core::sync::SyncError`]s next to the data.
//!
//! ## Logging
//!
//! Meridian uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(platform = "google_fit", "Starting import");
//! warn!(metric = "active_energy", "No canonical code");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
