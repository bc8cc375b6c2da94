//! Import and export orchestration
//!
//! This module contains the [`SyncCoordinator`] and the result types it hands
//! back to callers.

pub mod coordinator;
pub mod summary;

pub use coordinator::SyncCoordinator;
pub use summary::{ExportResult, ImportResult, PermissionReport, SyncError, SyncErrorType};
