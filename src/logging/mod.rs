//! Logging and observability
//!
//! Structured logging through `tracing`, with:
//! - Human-readable console output on stderr
//! - JSON-formatted file logs with rotation
//! - Configurable log levels (overridable with `RUST_LOG`)
//!
//! # Example
//!
//! ```no_run
//! use meridian::logging::init_logging;
//! use meridian::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(platform = "clinical", "Import started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of an import
///
/// # Example
///
/// ```no_run
/// use meridian::log_import_start;
/// use meridian::domain::{Platform, UserId};
///
/// let user = UserId::new("user-1").unwrap();
/// log_import_start!(Platform::GoogleFit, &user, 3);
/// ```
#[macro_export]
macro_rules! log_import_start {
    ($platform:expr, $user:expr, $kinds:expr) => {
        tracing::info!(
            platform = %$platform,
            user_id = %$user,
            kinds = $kinds,
            "Starting import"
        );
    };
}

/// Log the completion of an import
///
/// # Example
///
/// ```no_run
/// use meridian::log_import_complete;
/// use meridian::domain::Platform;
/// use std::time::Duration;
///
/// log_import_complete!(Platform::AppleHealth, 42, 1, Duration::from_secs(3));
/// ```
#[macro_export]
macro_rules! log_import_complete {
    ($platform:expr, $observations:expr, $errors:expr, $duration:expr) => {
        tracing::info!(
            platform = %$platform,
            observations = $observations,
            errors = $errors,
            duration_ms = $duration.as_millis() as u64,
            "Import completed"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use meridian::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
