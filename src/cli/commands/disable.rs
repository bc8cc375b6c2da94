//! Disable command implementation

use crate::domain::{Platform, UserId};
use clap::Args;

/// Arguments for the disable command
#[derive(Args, Debug)]
pub struct DisableArgs {
    /// User to disable the source for
    #[arg(short, long)]
    pub user: UserId,

    /// Platform to disable
    #[arg(short, long)]
    pub platform: Platform,
}

impl DisableArgs {
    /// Execute the disable command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match super::load_validated_config(config_path) {
            Ok(config) => config,
            Err(code) => return Ok(code),
        };
        let coordinator = match super::configured_coordinator(&config, &self.user).await {
            Ok(coordinator) => coordinator,
            Err(code) => return Ok(code),
        };

        let saved = async {
            coordinator
                .disable_data_source(&self.user, self.platform)
                .await?;
            coordinator.save_data_source_configs(&self.user).await
        };
        if let Err(e) = saved.await {
            println!("❌ Failed to disable {}", self.platform.display_name());
            println!("   Error: {e}");
            return Ok(super::exit_code_for(&e));
        }

        println!(
            "✅ Disabled {} for {} (history kept)",
            self.platform.display_name(),
            self.user
        );
        Ok(super::EXIT_OK)
    }
}
