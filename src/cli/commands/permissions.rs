//! Permissions command implementation
//!
//! Requests read access to metric kinds on one platform and reports the
//! outcome per kind.

use crate::core::sync::SyncCoordinator;
use crate::domain::{MetricKind, Platform};
use clap::Args;

/// Arguments for the permissions command
#[derive(Args, Debug)]
pub struct PermissionsArgs {
    /// Platform to request access on
    #[arg(short, long)]
    pub platform: Platform,

    /// Comma-separated metric kinds (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub metrics: Vec<MetricKind>,
}

impl PermissionsArgs {
    /// Execute the permissions command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match super::load_validated_config(config_path) {
            Ok(config) => config,
            Err(code) => return Ok(code),
        };
        let coordinator = match SyncCoordinator::from_config(&config) {
            Ok(coordinator) => coordinator,
            Err(e) => {
                println!("❌ Failed to initialize adapters");
                println!("   Error: {e}");
                return Ok(super::exit_code_for(&e));
            }
        };

        let kinds = if self.metrics.is_empty() {
            MetricKind::ALL.to_vec()
        } else {
            self.metrics.clone()
        };

        println!(
            "🔐 Requesting access on {} for {} metric kinds",
            self.platform.display_name(),
            kinds.len()
        );
        let report = match coordinator.request_permissions(self.platform, &kinds).await {
            Ok(report) => report,
            Err(e) => {
                println!("❌ Permission request failed");
                println!("   Error: {e}");
                return Ok(super::exit_code_for(&e));
            }
        };

        for kind in &report.granted {
            println!("  ✅ {kind}");
        }
        for error in &report.errors {
            println!(
                "  ❌ {}: {}",
                error.metric.as_deref().unwrap_or("-"),
                error.message
            );
        }
        println!();

        if report.errors.is_empty() {
            Ok(super::EXIT_OK)
        } else {
            Ok(super::EXIT_PARTIAL)
        }
    }
}
