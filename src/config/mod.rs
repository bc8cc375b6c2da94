//! Configuration management for Meridian.
//!
//! Meridian reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MERIDIAN_<SECTION>_<KEY>` environment overrides
//! - Default values for every optional setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use meridian::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("meridian.toml")?;
//!
//! println!("Bridge timeout: {}s", config.sync.timeout_seconds);
//! if let Some(clinical) = &config.clinical {
//!     println!("FHIR server: {}", clinical.base_url);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`SyncConfig`] - Bridge timeout, import concurrency, persistence after import
//! - [`StoreConfig`] - Where per-user source configuration is kept
//! - [`ExportFileConfig`] - Apple Health / Google Fit export files
//! - [`ClinicalConfig`] - FHIR gateway, authentication and retry
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [sync]
//! timeout_seconds = 30
//! max_concurrent_queries = 4
//!
//! [apple_health]
//! export_path = "/data/healthkit-export.json"
//!
//! [clinical]
//! base_url = "https://ehr.example.org/fhir"
//! auth_method = "client_credentials"
//! token_url = "https://ehr.example.org/oauth/token"
//! client_id = "meridian"
//! client_secret = "${MERIDIAN_CLINICAL_SECRET}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, AuthMethod, ClinicalConfig, Environment, ExportFileConfig, LoggingConfig,
    MeridianConfig, RetryConfig, StoreBackend, StoreConfig, SyncConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
