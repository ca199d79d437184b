//! Command-line interface for numerolog.
//!
//! This module provides the CLI structure for the `numerolog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, MigrateReportsCommand, NotifyCommand, ProfileCommand, ServeCommand,
    StatusCommand, WebhookCommand,
};

/// numerolog - Numerology chat bot and mini-app backend
///
/// Runs the webhook and REST API, sends daily forecasts and manages the
/// bot's storage.
#[derive(Debug, Parser)]
#[command(name = "numerolog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the webhook and mini-app API server
    Serve(ServeCommand),

    /// Send daily forecasts for one delivery hour
    Notify(NotifyCommand),

    /// Manage the bot webhook
    #[command(subcommand)]
    Webhook(WebhookCommand),

    /// Show storage statistics
    Status(StatusCommand),

    /// Move legacy single-slot reports to instance rows
    MigrateReports(MigrateReportsCommand),

    /// Print the numerology profile for a name and birth date
    Profile(ProfileCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "numerolog");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        use crate::logging::Verbosity;
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(3, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["numerolog", "serve", "--bind", "127.0.0.1:9000"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.as_deref(), Some("127.0.0.1:9000")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_notify_hour_range() {
        let cli = Cli::try_parse_from(["numerolog", "notify", "--hour", "8"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Notify(NotifyCommand { hour: Some(8) })
        ));
        assert!(Cli::try_parse_from(["numerolog", "notify", "--hour", "24"]).is_err());
    }

    #[test]
    fn test_parse_webhook() {
        let cli =
            Cli::try_parse_from(["numerolog", "webhook", "set", "https://bot.example.com/webhook"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Webhook(WebhookCommand::Set { ref url }) if url == "https://bot.example.com/webhook"
        ));

        let cli = Cli::try_parse_from(["numerolog", "webhook", "delete"]).unwrap();
        assert!(matches!(cli.command, Command::Webhook(WebhookCommand::Delete)));
    }

    #[test]
    fn test_parse_migrate_reports_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["numerolog", "migrate-reports"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::MigrateReports(MigrateReportsCommand { apply: false })
        ));
    }

    #[test]
    fn test_parse_profile() {
        let cli =
            Cli::try_parse_from(["numerolog", "profile", "Anna", "15.03.1990", "--json"]).unwrap();
        match cli.command {
            Command::Profile(cmd) => {
                assert_eq!(cmd.name, "Anna");
                assert_eq!(cmd.date, "15.03.1990");
                assert!(cmd.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli =
            Cli::try_parse_from(["numerolog", "-c", "/custom/config.toml", "-v", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbose, 1);

        let cli = Cli::try_parse_from(["numerolog", "status", "-q"]).unwrap();
        assert!(cli.quiet);
    }
}
