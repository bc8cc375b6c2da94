//! Export command implementation
//!
//! This module implements the `export` command: push internal records from a
//! JSON file to a writable platform as canonical Observations.

use crate::domain::{HealthRecord, Platform, UserId};
use clap::Args;
use std::fs;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// User whose records are exported
    #[arg(short, long)]
    pub user: UserId,

    /// Platform to push to
    #[arg(short, long, default_value = "clinical")]
    pub platform: Platform,

    /// JSON file holding an array of internal records
    #[arg(short, long)]
    pub input: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(user_id = %self.user, platform = %self.platform, "Starting export command");

        let records = match read_records(&self.input) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(input = %self.input, error = %e, "Failed to read records");
                println!("❌ Failed to read {}", self.input);
                println!("   Error: {e}");
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

        if !self.yes {
            println!("Export Configuration:");
            println!("  User: {}", self.user);
            println!("  Platform: {}", self.platform.display_name());
            println!("  Records: {}", records.len());
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(super::EXIT_OK);
            }
        }

        println!("🚀 Starting export...");
        let result = match coordinator
            .export_data(self.platform, &records, &self.user)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                println!("❌ Export failed");
                println!("   Error: {e}");
                return Ok(super::exit_code_for(&e));
            }
        };

        println!();
        println!("📊 Export Summary:");
        println!("  Records: {}", records.len());
        println!("  Pushed: {}", result.pushed);
        println!("  Failed: {}", result.errors.len());
        println!();

        if !result.errors.is_empty() {
            println!("⚠️  Errors encountered:");
            for error in &result.errors {
                println!("  - {:?}: {}", error.error_type, error.message);
            }
            println!();
        }

        if result.is_clean() {
            println!("✅ Export completed successfully!");
            Ok(super::EXIT_OK)
        } else {
            println!("⚠️  Export completed with failures");
            Ok(super::EXIT_PARTIAL)
        }
    }
}

fn read_records(path: &str) -> anyhow::Result<Vec<HealthRecord>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
