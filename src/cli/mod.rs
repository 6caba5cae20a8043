//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    ActionsCommand, HistoryCommand, InvokeCommand, LocateCommand, RunCommand, ValidateCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Continuous integration server
#[derive(Debug, Parser, Clone)]
#[command(name = "cruise")]
#[command(version)]
#[command(about = "Runs projects, queues and triggers from a YAML server configuration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the history database (defaults to the user data folder)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the server until interrupted, or integrate every project once
    Run(RunCommand),

    /// Validate a server configuration
    Validate(ValidateCommand),

    /// Resolve a universal name against a configuration
    Locate(LocateCommand),

    /// List the remote actions available on an item
    Actions(ActionsCommand),

    /// Invoke a remote action on an item
    Invoke(InvokeCommand),

    /// Show integration history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
