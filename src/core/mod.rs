//! Core business logic for Meridian.
//!
//! This module contains the interchange logic that sits between the adapters
//! and the callers.
//!
//! # Modules
//!
//! - [`registry`] - Per-user source configuration under per-user locks
//! - [`sync`] - Import/export orchestration and result reporting
//! - [`transform`] - Internal record <-> canonical Observation conversion
//!
//! # Import Workflow
//!
//! 1. **Configure**: Load the user's persisted sources into the registry
//! 2. **Check**: Refuse platforms that are not enabled
//! 3. **Query**: Fetch every requested kind concurrently through the adapter
//! 4. **Convert**: Native records become canonical Observations, per item
//! 5. **Merge**: Identical Observations collapse, order is by effective time
//! 6. **Stamp**: Record `last_sync_date` and persist it
//!
//! # Example
//!
//! ```rust,no_run
//! use meridian::adapters::config_store::MemoryConfigStore;
//! use meridian::adapters::google_fit::{FitExportFile, GoogleFitAdapter};
//! use meridian::config::SyncConfig;
//! use meridian::core::sync::SyncCoordinator;
//! use meridian::domain::{MetricKind, Platform, TimeRange, UserId};
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = SyncCoordinator::new(Arc::new(MemoryConfigStore::new()), &SyncConfig::default())
//!     .with_adapter(Arc::new(GoogleFitAdapter::new(Arc::new(FitExportFile::new("fit.json")))));
//!
//! let user = UserId::new("user-1")?;
//! coordinator.configure(&user).await?;
//! coordinator.enable_data_source(&user, Platform::GoogleFit, None).await?;
//!
//! let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
//! let range = TimeRange::new(Utc::now() - Duration::days(7), Utc::now())?;
//! let result = coordinator
//!     .import_data(Platform::GoogleFit, &[MetricKind::Steps], &user, range, cancel_rx)
//!     .await?;
//!
//! println!("Imported {} observations", result.observations.len());
//! # Ok(())
//! # }
//! ```

pub mod registry;
pub mod sync;
pub mod transform;
