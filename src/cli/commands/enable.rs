//! Enable command implementation
//!
//! Probes a platform, marks it enabled for the user and saves the result.

use crate::domain::{Platform, SourceSettings, UserId};
use clap::Args;

/// Arguments for the enable command
#[derive(Args, Debug)]
pub struct EnableArgs {
    /// User to enable the source for
    #[arg(short, long)]
    pub user: UserId,

    /// Platform to enable (apple_health, google_fit, clinical)
    #[arg(short, long)]
    pub platform: Platform,

    /// Platform setting as key=value, repeatable (e.g. patient_id=p-17)
    #[arg(short, long)]
    pub setting: Vec<String>,
}

impl EnableArgs {
    /// Execute the enable command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let settings = match parse_settings(&self.setting) {
            Ok(settings) => settings,
            Err(e) => {
                println!("❌ {e}");
                return Ok(super::EXIT_CONFIG);
            }
        };

        let config = match super::load_validated_config(config_path) {
            Ok(config) => config,
            Err(code) => return Ok(code),
        };
        let coordinator = match super::configured_coordinator(&config, &self.user).await {
            Ok(coordinator) => coordinator,
            Err(code) => return Ok(code),
        };

        match coordinator
            .enable_data_source(&self.user, self.platform, settings)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                println!(
                    "❌ {} is not available; check its configuration",
                    self.platform.display_name()
                );
                return Ok(super::EXIT_CONNECTION);
            }
            Err(e) => {
                println!("❌ Failed to enable {}", self.platform.display_name());
                println!("   Error: {e}");
                return Ok(super::exit_code_for(&e));
            }
        }

        if let Err(e) = coordinator.save_data_source_configs(&self.user).await {
            println!("❌ Failed to save data sources");
            println!("   Error: {e}");
            return Ok(super::exit_code_for(&e));
        }

        println!(
            "✅ Enabled {} for {}",
            self.platform.display_name(),
            self.user
        );
        Ok(super::EXIT_OK)
    }
}

/// Parses repeated `key=value` pairs; no pairs means "keep stored settings"
fn parse_settings(pairs: &[String]) -> Result<Option<SourceSettings>, String> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut settings = SourceSettings::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                settings.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => return Err(format!("Invalid setting '{pair}', expected key=value")),
        }
    }
    Ok(Some(settings))
}
