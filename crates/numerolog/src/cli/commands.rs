//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind_address`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Notify command arguments.
#[derive(Debug, Args)]
pub struct NotifyCommand {
    /// Delivery hour to send forecasts for (default: current UTC hour)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub hour: Option<u32>,
}

/// Webhook management commands.
#[derive(Debug, Subcommand)]
pub enum WebhookCommand {
    /// Point the bot at a webhook URL
    Set {
        /// Public URL of the `/webhook` endpoint
        url: String,
    },

    /// Remove the webhook
    Delete,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Legacy report migration arguments.
#[derive(Debug, Args)]
pub struct MigrateReportsCommand {
    /// Write the changes (default is a dry run)
    #[arg(long)]
    pub apply: bool,
}

/// Profile command arguments.
#[derive(Debug, Args)]
pub struct ProfileCommand {
    /// Full name
    pub name: String,

    /// Birth date (DD.MM.YYYY or YYYY-MM-DD)
    pub date: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
