//! CLI command implementations
//!
//! This module contains all CLI command implementations plus the helpers
//! they share for loading configuration and mapping errors to exit codes.

pub mod disable;
pub mod enable;
pub mod export;
pub mod import;
pub mod init;
pub mod permissions;
pub mod sources;
pub mod validate;

use crate::config::{load_config, MeridianConfig};
use crate::core::sync::SyncCoordinator;
use crate::domain::{MeridianError, UserId};

/// Exit code for a successful run
pub const EXIT_OK: i32 = 0;
/// Exit code when the command finished with recorded errors
pub const EXIT_PARTIAL: i32 = 1;
/// Exit code for configuration and usage errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code when a platform or server could not be reached
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code for anything else
pub const EXIT_FATAL: i32 = 5;
/// Exit code after SIGINT/SIGTERM cut an import short
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code matching a call-level failure
pub fn exit_code_for(error: &MeridianError) -> i32 {
    match error {
        MeridianError::Configuration(_)
        | MeridianError::Validation(_)
        | MeridianError::UnsupportedMetric { .. }
        | MeridianError::UnsupportedOperation { .. }
        | MeridianError::PlatformDisabled(_) => EXIT_CONFIG,
        MeridianError::Availability(_)
        | MeridianError::Authentication(_)
        | MeridianError::PermissionDenied(_)
        | MeridianError::Timeout { .. }
        | MeridianError::Gateway(_) => EXIT_CONNECTION,
        MeridianError::Conversion(_)
        | MeridianError::ConfigStore(_)
        | MeridianError::Serialization(_)
        | MeridianError::Io(_) => EXIT_FATAL,
    }
}

/// Loads the configuration, printing what went wrong
pub(crate) fn load_validated_config(config_path: &str) -> Result<MeridianConfig, i32> {
    load_config(config_path).map_err(|e| {
        tracing::error!(config_path = %config_path, error = %e, "Failed to load configuration");
        println!("❌ Failed to load configuration file {config_path}");
        println!("   Error: {e}");
        EXIT_CONFIG
    })
}

/// Builds the coordinator and loads the user's sources into it
pub(crate) async fn configured_coordinator(
    config: &MeridianConfig,
    user: &UserId,
) -> Result<SyncCoordinator, i32> {
    let coordinator = SyncCoordinator::from_config(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize adapters");
        println!("❌ Failed to initialize adapters");
        println!("   Error: {e}");
        exit_code_for(&e)
    })?;
    coordinator.configure(user).await.map_err(|e| {
        tracing::error!(user_id = %user, error = %e, "Failed to load data sources");
        println!("❌ Failed to load data sources for {user}");
        println!("   Error: {e}");
        exit_code_for(&e)
    })?;
    Ok(coordinator)
}
