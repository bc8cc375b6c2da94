//! Sources command implementation
//!
//! Lists a user's data source configurations and, with `--probe`, which
//! platforms are reachable right now.

use crate::domain::UserId;
use clap::Args;

/// Arguments for the sources command
#[derive(Args, Debug)]
pub struct SourcesArgs {
    /// User whose sources to list
    #[arg(short, long)]
    pub user: UserId,

    /// Also probe every configured platform for availability
    #[arg(long)]
    pub probe: bool,
}

impl SourcesArgs {
    /// Execute the sources command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match super::load_validated_config(config_path) {
            Ok(config) => config,
            Err(code) => return Ok(code),
        };
        let coordinator = match super::configured_coordinator(&config, &self.user).await {
            Ok(coordinator) => coordinator,
            Err(code) => return Ok(code),
        };

        println!("📋 Data sources for {}", self.user);
        println!();
        for source in coordinator.data_sources(&self.user).await {
            let state = if source.enabled { "enabled" } else { "disabled" };
            let last_sync = source
                .last_sync_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<14} {:<9} last sync: {}",
                source.platform.as_str(),
                state,
                last_sync
            );
            for (key, value) in &source.settings {
                println!("  {:<14} {key} = {value}", "");
            }
        }

        if self.probe {
            println!();
            println!("🔍 Probing platforms...");
            let available = coordinator.get_available_data_sources().await;
            for platform in config.configured_platforms() {
                let mark = if available.contains(&platform) {
                    "✅"
                } else {
                    "❌"
                };
                println!("  {mark} {}", platform.display_name());
            }
        }
        println!();
        Ok(super::EXIT_OK)
    }
}
