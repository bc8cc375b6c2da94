// Meridian - Health Data Interchange Engine
// Copyright (c) 2025 Meridian Contributors
// Licensed under the MIT License

use meridian::cli::{Cli, Commands};
use meridian::config::{load_config, LoggingConfig};
use meridian::logging::init_logging;
use clap::Parser;
use std::process;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // File logging follows the config file when it loads; otherwise console only
    let file_config = match &cli.command {
        Commands::Init(_) | Commands::ValidateConfig(_) => None,
        _ => load_config(&cli.config).ok(),
    };
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| file_config.as_ref().map(|c| c.application.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let logging_config = file_config
        .map(|c| c.logging)
        .unwrap_or_else(|| LoggingConfig {
            local_enabled: false,
            local_path: String::new(),
            local_rotation: "daily".to_string(),
        });
    let logging_guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Meridian - Health Data Interchange Engine"
    );

    // Create shutdown signal channel for cancelling imports
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    if tokio::signal::ctrl_c().await.is_ok() {
                        println!("\n⚠️  Shutdown signal received, cancelling import...");
                        let _ = shutdown_tx.send(true);
                    }
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT (Ctrl+C), cancelling in-flight work...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, cancelling in-flight work...");
                }
            }
            println!("\n⚠️  Shutdown signal received, cancelling import...");
            let _ = shutdown_tx.send(true);
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            } else {
                tracing::info!("Received SIGINT (Ctrl+C), cancelling in-flight work...");
                println!("\n⚠️  Shutdown signal received, cancelling import...");
                let _ = shutdown_tx.send(true);
            }
        }
    });

    let exit_code = match execute_command(&cli, shutdown_rx).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5
        }
    };

    // process::exit skips destructors, so flush the log writer first
    drop(logging_guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, shutdown_signal: watch::Receiver<bool>) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
        Commands::Sources(args) => args.execute(&cli.config).await,
        Commands::Enable(args) => args.execute(&cli.config).await,
        Commands::Disable(args) => args.execute(&cli.config).await,
        Commands::Permissions(args) => args.execute(&cli.config).await,
        Commands::Import(args) => args.execute(&cli.config, shutdown_signal).await,
        Commands::Export(args) => args.execute(&cli.config).await,
    }
}
