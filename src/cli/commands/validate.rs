//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Meridian configuration file.

use crate::config::{load_config, StoreBackend};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(super::EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Environment: {:?}", config.environment);
        println!("  Bridge Timeout: {}s", config.sync.timeout_seconds);
        println!(
            "  Concurrent Queries: {}",
            config.sync.max_concurrent_queries
        );
        match config.store.backend {
            StoreBackend::File => println!("  Source Store: file ({})", config.store.path),
            StoreBackend::Memory => println!("  Source Store: memory"),
        }
        if let Some(path) = &config.apple_health.export_path {
            println!("  Apple Health Export: {path}");
        }
        if let Some(path) = &config.google_fit.export_path {
            println!("  Google Fit Export: {path}");
        }
        if let Some(clinical) = &config.clinical {
            println!("  Clinical Server: {}", clinical.base_url);
            println!("  Clinical Auth: {}", clinical.auth_method);
            if !clinical.tls_verify {
                println!("  ⚠️  TLS verification disabled");
            }
        }
        let platforms: Vec<&str> = config
            .configured_platforms()
            .iter()
            .map(|p| p.as_str())
            .collect();
        println!("  Platforms: {}", platforms.join(", "));
        println!();
        Ok(super::EXIT_OK)
    }
}
