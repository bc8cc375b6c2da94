//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{AuthMethod, MeridianConfig, StoreBackend};
use super::secret::secret_string;
use crate::domain::errors::MeridianError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MeridianConfig
/// 4. Applies environment variable overrides (MERIDIAN_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use meridian::config::loader::load_config;
///
/// let config = load_config("meridian.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MeridianConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MeridianError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MeridianError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution, overrides and validation
pub fn parse_config(contents: &str) -> Result<MeridianConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MeridianConfig = toml::from_str(&contents)
        .map_err(|e| MeridianError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MeridianError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MeridianError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(MeridianError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Parses a boolean override, rejecting anything but true/false
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    value.trim().parse().map_err(|_| {
        MeridianError::Configuration(format!("{name} must be 'true' or 'false', got '{value}'"))
    })
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MeridianError::Configuration(format!("{name} must be a number, got '{value}'"))
    })
}

/// Applies environment variable overrides using MERIDIAN_* prefix
///
/// Environment variables follow the pattern: MERIDIAN_<SECTION>_<KEY>,
/// for example MERIDIAN_CLINICAL_BASE_URL or MERIDIAN_SYNC_TIMEOUT_SECONDS.
fn apply_env_overrides(config: &mut MeridianConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application
    if let Some(val) = var("MERIDIAN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Sync
    if let Some(val) = var("MERIDIAN_SYNC_TIMEOUT_SECONDS") {
        config.sync.timeout_seconds = parse_number("MERIDIAN_SYNC_TIMEOUT_SECONDS", &val)?;
    }
    if let Some(val) = var("MERIDIAN_SYNC_MAX_CONCURRENT_QUERIES") {
        config.sync.max_concurrent_queries =
            parse_number("MERIDIAN_SYNC_MAX_CONCURRENT_QUERIES", &val)?;
    }
    if let Some(val) = var("MERIDIAN_SYNC_PERSIST_AFTER_IMPORT") {
        config.sync.persist_after_import = parse_bool("MERIDIAN_SYNC_PERSIST_AFTER_IMPORT", &val)?;
    }

    // Store
    if let Some(val) = var("MERIDIAN_STORE_BACKEND") {
        config.store.backend = match val.to_lowercase().as_str() {
            "file" => StoreBackend::File,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(MeridianError::Configuration(format!(
                    "MERIDIAN_STORE_BACKEND must be 'file' or 'memory', got '{other}'"
                )))
            }
        };
    }
    if let Some(val) = var("MERIDIAN_STORE_PATH") {
        config.store.path = val;
    }

    // Wearable export files
    if let Some(val) = var("MERIDIAN_APPLE_HEALTH_EXPORT_PATH") {
        config.apple_health.export_path = Some(val);
    }
    if let Some(val) = var("MERIDIAN_GOOGLE_FIT_EXPORT_PATH") {
        config.google_fit.export_path = Some(val);
    }

    // Clinical (only if the section is configured)
    if let Some(ref mut clinical) = config.clinical {
        if let Some(val) = var("MERIDIAN_CLINICAL_BASE_URL") {
            clinical.base_url = val;
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_AUTH_METHOD") {
            clinical.auth_method = match val.to_lowercase().as_str() {
                "password" => AuthMethod::Password,
                "client_credentials" => AuthMethod::ClientCredentials,
                "smart" => AuthMethod::Smart,
                other => {
                    return Err(MeridianError::Configuration(format!(
                        "MERIDIAN_CLINICAL_AUTH_METHOD must be one of: password, client_credentials, smart; got '{other}'"
                    )))
                }
            };
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_TOKEN_URL") {
            clinical.token_url = Some(val);
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_CLIENT_ID") {
            clinical.client_id = Some(val);
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_CLIENT_SECRET") {
            clinical.client_secret = Some(secret_string(val));
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_USERNAME") {
            clinical.username = Some(val);
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_PASSWORD") {
            clinical.password = Some(secret_string(val));
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_SCOPE") {
            clinical.scope = Some(val);
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_TLS_VERIFY") {
            clinical.tls_verify = parse_bool("MERIDIAN_CLINICAL_TLS_VERIFY", &val)?;
        }
        if let Some(val) = var("MERIDIAN_CLINICAL_TIMEOUT_SECONDS") {
            clinical.timeout_seconds = parse_number("MERIDIAN_CLINICAL_TIMEOUT_SECONDS", &val)?;
        }
    }

    // Logging
    if let Some(val) = var("MERIDIAN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_bool("MERIDIAN_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("MERIDIAN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = var("MERIDIAN_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
