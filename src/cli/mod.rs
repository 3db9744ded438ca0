//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for geosync using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// geosync - dataset synchronization tool
#[derive(Parser, Debug)]
#[command(name = "geosync")]
#[command(version, about, long_about = None)]
#[command(author = "Geosync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "geosync.toml", env = "GEOSYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GEOSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dataset the command works on, if it names exactly one
    pub fn dataset(&self) -> Option<&str> {
        match &self.command {
            Commands::Full(args) | Commands::Changeset(args) => Some(&args.dataset),
            Commands::Resume(args) => Some(&args.sync.dataset),
            Commands::Replay(args) => Some(&args.sync.dataset),
            Commands::Init(args) => args.dataset.as_deref(),
            Commands::Status(args) => args.dataset.as_deref(),
            Commands::ValidateConfig(_) => None,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the dataset directories, canonical store and cursor
    Init(commands::init::InitArgs),

    /// Request, poll and download a full export, then replace the canonical store
    Full(commands::sync::SyncArgs),

    /// Apply the changes since the last sync
    Changeset(commands::sync::SyncArgs),

    /// Resume polling an export job requested earlier
    Resume(commands::sync::ResumeArgs),

    /// Re-run the pipeline from a previously downloaded file
    Replay(commands::sync::ReplayArgs),

    /// Show cursors and canonical store sizes
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_changeset() {
        let cli = Cli::parse_from(["geosync", "changeset", "parcels"]);
        assert_eq!(cli.config, "geosync.toml");
        assert_eq!(cli.dataset(), Some("parcels"));
        assert!(matches!(cli.command, Commands::Changeset(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["geosync", "--config", "custom.toml", "full", "parcels"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["geosync", "--log-level", "debug", "status"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert_eq!(cli.dataset(), None);
    }

    #[test]
    fn test_cli_parse_purge() {
        let cli = Cli::parse_from(["geosync", "full", "parcels", "--purge", "--retain", "2"]);
        let Commands::Full(args) = cli.command else {
            panic!("expected full");
        };
        assert!(args.purge);
        assert_eq!(args.retain, Some(2));
    }

    #[test]
    fn test_cli_parse_resume() {
        let cli = Cli::parse_from(["geosync", "resume", "parcels", "901"]);
        let Commands::Resume(args) = cli.command else {
            panic!("expected resume");
        };
        assert_eq!(args.job_id, "901");
        assert_eq!(args.sync.dataset, "parcels");
    }

    #[test]
    fn test_cli_replay_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "geosync",
            "replay",
            "parcels",
            "--archive",
            "a.zip",
            "--changeset",
            "b.json",
        ]);
        assert!(result.is_err());
        assert!(Cli::try_parse_from(["geosync", "replay", "parcels"]).is_err());

        let cli = Cli::parse_from(["geosync", "replay", "parcels", "--changeset", "b.json"]);
        assert!(matches!(cli.command, Commands::Replay(_)));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["geosync", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["geosync", "init", "--write-config"]);
        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert!(args.write_config);
        assert!(args.dataset.is_none());
    }
}
