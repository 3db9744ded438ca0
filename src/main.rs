// geosync - Layer Synchronization Tool
// Copyright (c) 2025 Geosync Contributors
// Licensed under the MIT License

use clap::Parser;
use geosync::cli::{Cli, Commands};
use geosync::config::{load_config, LoggingConfig};
use geosync::core::state::DatasetPaths;
use geosync::domain::{DatasetName, GeosyncError};
use geosync::log_error_with_context;
use geosync::logging::init_logging;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    // This is optional - if .env doesn't exist, it's silently ignored
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Logging follows the configuration when it loads; commands report
    // configuration errors themselves
    let config = load_config(&cli.config).ok();
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| config.as_ref().map(|c| c.application.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let (logging_config, log_dir) = match &config {
        Some(config) => {
            let dir = match cli.dataset().and_then(|d| DatasetName::new(d).ok()) {
                Some(name) => DatasetPaths::new(&config.storage.data_dir, &name).logs_dir(),
                None => config.storage.data_dir.join("logs"),
            };
            (config.logging.clone(), dir)
        }
        None => (
            LoggingConfig {
                local_enabled: false,
                ..LoggingConfig::default()
            },
            PathBuf::from("logs"),
        ),
    };

    let guard = match init_logging(&log_level, &logging_config, &log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(e.exit_code());
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "geosync - layer synchronization tool"
    );

    // Execute command and get exit code
    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            let geosync_error = e.downcast_ref::<GeosyncError>();
            log_error_with_context!(e, "Command execution failed");
            eprintln!("Error: {e}");
            if let Some(body) = geosync_error.and_then(GeosyncError::raw_body) {
                tracing::error!(body = %body, "Raw service response");
                eprintln!("Service response:\n{body}");
            }
            geosync_error.map_or(5, GeosyncError::exit_code)
        }
    };

    // Flush file logs before exiting
    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Init(args) => args.execute(&cli.config).await,
        Commands::Full(args) => args.execute_full(&cli.config).await,
        Commands::Changeset(args) => args.execute_changeset(&cli.config).await,
        Commands::Resume(args) => args.execute(&cli.config).await,
        Commands::Replay(args) => args.execute(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
    }
}
