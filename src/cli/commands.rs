//! CLI command definitions

use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

/// Run the server
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to server YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Force one integration of every project and exit
    #[arg(long)]
    pub once: bool,

    /// Don't record integrations in history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a server configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to server YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Resolve a universal name
#[derive(Debug, Args, Clone)]
pub struct LocateCommand {
    /// Path to server YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Universal name, e.g. urn:ccnet:Local:Project
    pub name: String,
}

/// List remote actions on an item
#[derive(Debug, Args, Clone)]
pub struct ActionsCommand {
    /// Path to server YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Universal name of the item
    pub name: String,
}

/// Invoke a remote action
#[derive(Debug, Args, Clone)]
pub struct InvokeCommand {
    /// Path to server YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Universal name of the item
    pub name: String,

    /// Action to invoke
    pub action: String,

    /// Input message as JSON
    #[arg(long, value_parser = parse_json)]
    pub message: Option<Value>,
}

/// Show integration history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Project name to filter by
    #[arg(short, long)]
    pub project: Option<String>,

    /// Number of recent integrations to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse a JSON message argument
pub fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|err| format!("Invalid JSON message: {}", err))
}
