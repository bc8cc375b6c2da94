//! Import command implementation
//!
//! This module implements the `import` command: pull measurements of the
//! requested metric kinds from one enabled platform and print or save them.

use crate::core::sync::ImportResult;
use crate::domain::{MetricKind, Platform, TimeRange, UserId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// User to import for
    #[arg(short, long)]
    pub user: UserId,

    /// Platform to import from
    #[arg(short, long)]
    pub platform: Platform,

    /// Comma-separated metric kinds (default: every kind the platform maps)
    #[arg(short, long, value_delimiter = ',')]
    pub metrics: Vec<MetricKind>,

    /// Import the last N days (ignored when --start is given)
    #[arg(long, default_value_t = 7)]
    pub since: i64,

    /// Window start (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339, default: now)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Write the imported records to this JSON file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write canonical Observations instead of internal records
    #[arg(long)]
    pub observations: bool,
}

impl ImportArgs {
    /// Resolves the query window from the arguments
    pub fn time_range(&self, now: DateTime<Utc>) -> crate::domain::Result<TimeRange> {
        let end = self.end.unwrap_or(now);
        let start = self
            .start
            .unwrap_or_else(|| end - ChronoDuration::days(self.since.max(1)));
        TimeRange::new(start, end)
    }

    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(user_id = %self.user, platform = %self.platform, "Starting import command");

        let range = match self.time_range(Utc::now()) {
            Ok(range) => range,
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

        let kinds = if self.metrics.is_empty() {
            match coordinator.adapter(self.platform) {
                Some(adapter) => MetricKind::ALL
                    .into_iter()
                    .filter(|k| adapter.native_type(*k).is_some())
                    .collect(),
                None => MetricKind::ALL.to_vec(),
            }
        } else {
            self.metrics.clone()
        };

        println!(
            "🚀 Importing {} metric kinds from {} ({} to {})",
            kinds.len(),
            self.platform.display_name(),
            range.start.to_rfc3339(),
            range.end.to_rfc3339()
        );
        println!();

        let result = match coordinator
            .import_data(self.platform, &kinds, &self.user, range, shutdown_signal)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Import failed");
                println!("❌ Import failed");
                println!("   Error: {e}");
                return Ok(super::exit_code_for(&e));
            }
        };

        if let Some(path) = &self.output {
            if let Err(e) = self.write_output(path, &result) {
                tracing::error!(output = %path, error = %e, "Failed to write import output");
                println!("❌ Failed to write {path}");
                println!("   Error: {e}");
                return Ok(super::EXIT_FATAL);
            }
            println!("💾 Wrote {path}");
        }

        print_summary(&result);
        Ok(exit_code(&result))
    }

    fn write_output(&self, path: &str, result: &ImportResult) -> anyhow::Result<()> {
        let json = if self.observations {
            serde_json::to_string_pretty(&result.observations)?
        } else {
            serde_json::to_string_pretty(&result.records)?
        };
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn print_summary(result: &ImportResult) {
    println!();
    println!("📊 Import Summary:");
    println!("  Platform: {}", result.platform.display_name());
    println!("  Observations: {}", result.observations.len());
    println!("  Errors: {}", result.errors.len());
    println!("  Duration: {:.2}s", result.duration.as_secs_f64());
    println!();

    if !result.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &result.errors {
            println!(
                "  - {:?} [{}]: {}",
                error.error_type,
                error.metric.as_deref().unwrap_or("-"),
                error.message
            );
        }
        println!();
    }
}

fn exit_code(result: &ImportResult) -> i32 {
    if result.cancelled {
        println!("⚠️  Import interrupted. Finished metric kinds were kept.");
        tracing::info!("Import interrupted by user signal");
        super::EXIT_INTERRUPTED
    } else if result.is_clean() {
        println!("✅ Import completed successfully!");
        super::EXIT_OK
    } else {
        println!("⚠️  Import completed with errors");
        super::EXIT_PARTIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args() -> ImportArgs {
        ImportArgs {
            user: UserId::new("u1").unwrap(),
            platform: Platform::GoogleFit,
            metrics: vec![MetricKind::HeartRate],
            since: 7,
            start: None,
            end: None,
            output: None,
            observations: false,
        }
    }

    #[test]
    fn test_time_range_defaults_to_last_days() {
        let now = Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap();
        let range = args().time_range(now).unwrap();
        assert_eq!(range.end, now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_time_range_rejects_inverted_window() {
        let mut args = args();
        args.start = Some(Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap());
        args.end = Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        assert!(args.time_range(Utc::now()).is_err());
    }

    #[test]
    fn test_cancelled_import_exit_code() {
        let mut result = ImportResult::new(Platform::GoogleFit);
        assert_eq!(exit_code(&result), 0);
        result.cancelled = true;
        assert_eq!(exit_code(&result), super::super::EXIT_INTERRUPTED);
    }
}
