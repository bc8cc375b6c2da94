//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Meridian using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Meridian - Health Data Interchange Engine
#[derive(Parser, Debug)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
#[command(author = "Meridian Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "meridian.toml", env = "MERIDIAN_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MERIDIAN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// List a user's data sources and which platforms are reachable
    Sources(commands::sources::SourcesArgs),

    /// Enable a data source for a user
    Enable(commands::enable::EnableArgs),

    /// Disable a data source for a user
    Disable(commands::disable::DisableArgs),

    /// Request read access to metric kinds on a platform
    Permissions(commands::permissions::PermissionsArgs),

    /// Import measurements from a platform
    Import(commands::import::ImportArgs),

    /// Export internal records to a writable platform
    Export(commands::export::ExportArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from([
            "meridian",
            "import",
            "--user",
            "u1",
            "--platform",
            "google_fit",
            "--metrics",
            "heart_rate,steps",
        ]);
        assert_eq!(cli.config, "meridian.toml");
        assert!(matches!(cli.command, Commands::Import(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["meridian", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["meridian", "--log-level", "debug", "init"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["meridian", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_enable_with_settings() {
        let cli = Cli::parse_from([
            "meridian",
            "enable",
            "--user",
            "u1",
            "--platform",
            "clinical",
            "--setting",
            "patient_id=p-17",
        ]);
        match cli.command {
            Commands::Enable(args) => assert_eq!(args.setting, vec!["patient_id=p-17"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_export() {
        let cli = Cli::parse_from([
            "meridian",
            "export",
            "--user",
            "u1",
            "--input",
            "records.json",
        ]);
        assert!(matches!(cli.command, Commands::Export(_)));
    }
}
