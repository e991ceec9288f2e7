// ABOUTME: Command-line interface definition.
// ABOUTME: Global --config/--log-format flags plus start, jobs and check-config subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Chat-driven build automation relay")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file path (defaults to ./relay.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Connect to Slack and relay commands (default if no subcommand given)
    Start,
    /// Load the job catalog from the configured backend and print it
    Jobs,
    /// Load and validate configuration, then print it with secrets redacted
    CheckConfig,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// The subcommand to run, `start` when none was given
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Start)
    }
}
