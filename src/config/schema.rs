//! Configuration schema types
//!
//! This module defines the configuration structure for Meridian.

use crate::config::SecretString;
use crate::domain::Platform;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main Meridian configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeridianConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Import/export orchestration settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Source configuration store
    #[serde(default)]
    pub store: StoreConfig,

    /// Apple Health export file bridge
    #[serde(default)]
    pub apple_health: ExportFileConfig,

    /// Google Fit export file bridge
    #[serde(default)]
    pub google_fit: ExportFileConfig,

    /// Clinical FHIR gateway (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical: Option<ClinicalConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MeridianConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.sync.validate()?;
        self.store.validate()?;
        if let Some(ref clinical) = self.clinical {
            clinical.validate(&self.environment)?;
        }
        self.logging.validate()?;
        Ok(())
    }

    /// Platforms with a bridge configured in this file
    pub fn configured_platforms(&self) -> Vec<Platform> {
        let mut platforms = vec![Platform::SelfTracked];
        if self.apple_health.export_path.is_some() {
            platforms.push(Platform::AppleHealth);
        }
        if self.google_fit.export_path.is_some() {
            platforms.push(Platform::GoogleFit);
        }
        if self.clinical.is_some() {
            platforms.push(Platform::Clinical);
        }
        platforms
    }
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            environment: Environment::default(),
            sync: SyncConfig::default(),
            store: StoreConfig::default(),
            apple_health: ExportFileConfig::default(),
            google_fit: ExportFileConfig::default(),
            clinical: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Import/export orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Timeout applied to every bridge call, in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum per-kind queries in flight during one import
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// Write `last_sync_date` back to the store after every import
    #[serde(default = "default_true")]
    pub persist_after_import: bool,
}

impl SyncConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(format!(
                "sync.timeout_seconds must be between 1 and 600, got {}",
                self.timeout_seconds
            ));
        }

        if self.max_concurrent_queries == 0 || self.max_concurrent_queries > 32 {
            return Err(format!(
                "sync.max_concurrent_queries must be between 1 and 32, got {}",
                self.max_concurrent_queries
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_concurrent_queries: default_max_concurrent_queries(),
            persist_after_import: true,
        }
    }
}

/// Backing store for per-user source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON document per user on disk
    File,
    /// Process-local, lost on exit
    Memory,
}

/// Source configuration store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Directory holding the per-user documents (file backend)
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl StoreConfig {
    fn validate(&self) -> Result<(), String> {
        if self.backend == StoreBackend::File && self.path.trim().is_empty() {
            return Err("store.path cannot be empty when backend is 'file'".to_string());
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

/// Wearable bridge backed by a native JSON export on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportFileConfig {
    /// Path of the export file; the platform is unavailable when unset
    #[serde(default)]
    pub export_path: Option<String>,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Backoff before the given retry (1-based), capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let delay_ms = ((self.initial_delay_ms as f64) * factor) as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 || self.max_retries > 10 {
            return Err(format!(
                "clinical.retry.max_retries must be between 1 and 10, got {}",
                self.max_retries
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "clinical.retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// How the clinical adapter obtains its access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// OAuth2 resource owner password grant
    Password,
    /// OAuth2 client credentials grant
    ClientCredentials,
    /// SMART backend services; the token endpoint is discovered from the server
    Smart,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthMethod::Password => "password",
            AuthMethod::ClientCredentials => "client_credentials",
            AuthMethod::Smart => "smart",
        };
        f.write_str(name)
    }
}

/// Clinical FHIR gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalConfig {
    /// FHIR base URL, e.g. `https://ehr.example.org/fhir`
    pub base_url: String,

    #[serde(default = "default_auth_method")]
    pub auth_method: AuthMethod,

    /// Token endpoint; discovered for `smart` when unset
    #[serde(default)]
    pub token_url: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub client_secret: Option<SecretString>,

    #[serde(default)]
    pub username: Option<String>,

    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// OAuth2 scope requested with the token
    #[serde(default)]
    pub scope: Option<String>,

    /// Token lifetime assumed when the provider omits `expires_in`
    #[serde(default = "default_token_lifetime_secs")]
    pub default_token_lifetime_secs: u64,

    /// TLS certificate verification enabled
    ///
    /// Must stay `true` in production (enforced by validation).
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Observations requested per search page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl ClinicalConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.base_url.is_empty() {
            return Err("clinical.base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("clinical.base_url must start with http:// or https://".to_string());
        }

        if self.client_id.as_deref().map(str::is_empty).unwrap_or(true) {
            return Err(format!(
                "clinical.client_id is required when auth_method is '{}'",
                self.auth_method
            ));
        }

        match self.auth_method {
            AuthMethod::Password => {
                if self.token_url.is_none() {
                    return Err(
                        "clinical.token_url is required when auth_method is 'password'".to_string(),
                    );
                }
                if self.username.as_deref().map(str::is_empty).unwrap_or(true) {
                    return Err(
                        "clinical.username cannot be empty when auth_method is 'password'"
                            .to_string(),
                    );
                }
                if self
                    .password
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(
                        "clinical.password cannot be empty when auth_method is 'password'"
                            .to_string(),
                    );
                }
            }
            AuthMethod::ClientCredentials | AuthMethod::Smart => {
                if self.auth_method == AuthMethod::ClientCredentials && self.token_url.is_none() {
                    return Err(
                        "clinical.token_url is required when auth_method is 'client_credentials'"
                            .to_string(),
                    );
                }
                if self
                    .client_secret
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(format!(
                        "clinical.client_secret cannot be empty when auth_method is '{}'",
                        self.auth_method
                    ));
                }
            }
        }

        if self.default_token_lifetime_secs == 0 {
            return Err("clinical.default_token_lifetime_secs must be > 0".to_string());
        }

        if self.page_size == 0 || self.page_size > 1000 {
            return Err(format!(
                "clinical.page_size must be between 1 and 1000, got {}",
                self.page_size
            ));
        }

        if *environment == Environment::Production && !self.tls_verify {
            return Err(
                "TLS certificate verification cannot be disabled in production environments. \
                Set 'tls_verify = true' or switch 'environment' to development or staging."
                    .to_string(),
            );
        }

        self.retry.validate()?;
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_concurrent_queries() -> usize {
    4
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::File
}

fn default_store_path() -> String {
    "./meridian-data/sources".to_string()
}

fn default_auth_method() -> AuthMethod {
    AuthMethod::ClientCredentials
}

fn default_token_lifetime_secs() -> u64 {
    3600
}

fn default_page_size() -> usize {
    100
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_local_path() -> String {
    "./meridian-data/logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
