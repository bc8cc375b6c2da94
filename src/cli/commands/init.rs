//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "meridian.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Meridian configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(super::EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Point [apple_health] and [google_fit] at your export files");
                println!("  3. For a clinical server, uncomment [clinical] and create a .env file:");
                println!("     - Set MERIDIAN_CLINICAL_CLIENT_SECRET");
                println!("  4. Validate configuration: meridian validate-config");
                println!("  5. Enable a source: meridian enable --user <id> --platform google_fit");
                println!("  6. Import: meridian import --user <id> --platform google_fit");
                println!();
                Ok(super::EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(super::EXIT_FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Meridian Configuration File
# Health Data Interchange Engine

environment = "development"  # development | staging | production

[application]
log_level = "info"

[sync]
timeout_seconds = 30
max_concurrent_queries = 4
persist_after_import = true

[store]
backend = "file"  # file | memory
path = "./meridian-data/sources"

[apple_health]
# export_path = "./exports/healthkit.json"

[google_fit]
# export_path = "./exports/google-fit.json"

# [clinical]
# base_url = "https://ehr.example.org/fhir"
# auth_method = "client_credentials"  # password | client_credentials | smart
# token_url = "https://ehr.example.org/oauth/token"
# client_id = "meridian"
# client_secret = "${MERIDIAN_CLINICAL_CLIENT_SECRET}"
# scope = "system/Observation.rs system/Patient.r"

[logging]
local_enabled = true
local_path = "./meridian-data/logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Meridian Configuration File
# Health Data Interchange Engine
#
# This file contains all configuration options with examples and explanations.
# Any value can be overridden with MERIDIAN_<SECTION>_<KEY> environment
# variables, and ${VAR} references are substituted when the file is loaded.

# ============================================================================
# Environment
# ============================================================================
# development | staging | production
# TLS verification cannot be disabled in production.
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Sync Settings
# ============================================================================
[sync]
# Timeout applied to every platform call, in seconds (1-600)
timeout_seconds = 30

# Per-metric queries in flight during one import (1-32)
max_concurrent_queries = 4

# Write last_sync_date back to the store after every import
persist_after_import = true

# ============================================================================
# Source Configuration Store
# ============================================================================
[store]
# file: one JSON document per user under `path`
# memory: kept in process, lost on exit
backend = "file"
path = "./meridian-data/sources"

# ============================================================================
# Wearable Platforms
# ============================================================================
# Each platform reads a native JSON export. Leave export_path unset to mark
# the platform unavailable.
[apple_health]
# export_path = "./exports/healthkit.json"

[google_fit]
# export_path = "./exports/google-fit.json"

# ============================================================================
# Clinical FHIR Server
# ============================================================================
# Uncomment to enable the clinical data source.
#
# [clinical]
# # FHIR base URL
# base_url = "https://ehr.example.org/fhir"
#
# # password | client_credentials | smart
# # smart discovers the token endpoint from .well-known/smart-configuration
# auth_method = "client_credentials"
# token_url = "https://ehr.example.org/oauth/token"
# client_id = "meridian"
#
# # Secrets are zeroized on drop; prefer environment variables
# client_secret = "${MERIDIAN_CLINICAL_CLIENT_SECRET}"
#
# # Only for auth_method = "password"
# # username = "clinician"
# # password = "${MERIDIAN_CLINICAL_PASSWORD}"
#
# scope = "system/Observation.rs system/Patient.r"
#
# # Token lifetime assumed when the server omits expires_in
# default_token_lifetime_secs = 3600
#
# tls_verify = true
# timeout_seconds = 30
#
# # Observations per search page (1-1000)
# page_size = 100
#
# [clinical.retry]
# max_retries = 3
# initial_delay_ms = 500
# max_delay_ms = 10000
# backoff_multiplier = 2.0

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to the console output
local_enabled = true
local_path = "./meridian-data/logs"

# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}
