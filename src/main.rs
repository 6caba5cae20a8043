use anyhow::{Context, Result};
use cruise::cli::commands::{
    ActionsCommand, HistoryCommand, InvokeCommand, LocateCommand, RunCommand, ValidateCommand,
};
use cruise::cli::output::*;
use cruise::cli::{Cli, Command};
use cruise::core::config::ServerConfig;
use cruise::core::{IntegrationOutcome, IntegrationStatus, ValidationLog};
use cruise::execution::ServerEngine;
use cruise::persistence::{InMemoryPersistence, IntegrationSummary, PersistenceBackend};
use cruise::ActionInvoker;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the default level
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_server(cmd, &cli).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Locate(cmd) => locate_item(cmd)?,
        Command::Actions(cmd) => list_actions(cmd)?,
        Command::Invoke(cmd) => invoke_action(cmd)?,
        Command::History(cmd) => show_history(cmd, &cli).await?,
    }

    Ok(())
}

async fn open_store(database: Option<&Path>) -> Result<Arc<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    {
        use cruise::persistence::SqliteStateStore;
        let store = match database {
            Some(path) => SqliteStateStore::new(path).await?,
            None => SqliteStateStore::with_default_path().await?,
        };
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = database;
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}

async fn run_server(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let config = ServerConfig::from_file(&cmd.file).context("Failed to load server config")?;
    println!("{}Loaded server: {}", INFO, style(&config.name).bold());

    let server = config.build()?;
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_store(cli.database.as_deref()).await?
    };

    let engine = ServerEngine::new(server, config.engine_settings())?.with_persistence(store);
    engine.add_event_handler(|event| println!("{}", format_integration_event(&event)));

    if let Err(err) = engine.validate() {
        println!("{}{}", CROSS, style(&err).red());
        std::process::exit(1);
    }

    if cmd.once {
        let outcomes = engine.integrate_all_once("Command line").await?;
        let failed = outcomes.iter().any(|outcome| match outcome {
            IntegrationOutcome::Completed(summary) => summary.status != IntegrationStatus::Success,
            IntegrationOutcome::Abandoned => true,
        });
        if failed {
            println!("\n{}{} {}", CROSS, style(&config.name).bold(), style("failed").red());
            std::process::exit(1);
        }
        println!(
            "\n{}{} completed {}",
            CHECK,
            style(&config.name).bold(),
            style("successfully").green()
        );
        return Ok(());
    }

    engine.start()?;
    println!("{}Server running, press Ctrl+C to stop", ROCKET);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{}Stopping...", INFO);
    engine.stop().await?;
    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{}Validating server configuration...", INFO);

    let config = match ServerConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(err) => {
            println!("{}Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", err)).red());
            std::process::exit(1);
        }
    };

    let server = config.build()?;
    let mut log = ValidationLog::new();
    server.validate(&mut log);

    for line in format_validation_log(&log) {
        println!("  {}", line);
    }

    if log.number_of_errors() > 0 {
        println!(
            "{}Configuration has {} error(s) and {} warning(s)",
            CROSS,
            style(log.number_of_errors()).red(),
            style(log.number_of_warnings()).yellow()
        );
        std::process::exit(1);
    }

    println!("{}Server configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Projects: {}", style(server.projects().len()).cyan());
    println!("  Warnings: {}", style(log.number_of_warnings()).cyan());

    if cmd.json {
        println!("\n{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}

fn locate_item(cmd: &LocateCommand) -> Result<()> {
    let server = ServerConfig::from_file(&cmd.file)?.build()?;
    match server.locate(&cmd.name) {
        Some(item) => {
            println!("{}", format_located(&item));
            Ok(())
        }
        None => {
            println!("{}Nothing found at {}", CROSS, style(&cmd.name).red());
            std::process::exit(1);
        }
    }
}

fn list_actions(cmd: &ActionsCommand) -> Result<()> {
    let server = ServerConfig::from_file(&cmd.file)?.build()?;
    let invoker = ActionInvoker::with_defaults(server);
    let actions = invoker.list(&cmd.name)?;

    if actions.is_empty() {
        println!("{}No actions available on {}", INFO, style(&cmd.name).bold());
        return Ok(());
    }
    println!("{}Actions on {}:", INFO, style(&cmd.name).bold());
    for action in &actions {
        println!("{}", format_action(action));
    }
    Ok(())
}

fn invoke_action(cmd: &InvokeCommand) -> Result<()> {
    let server = ServerConfig::from_file(&cmd.file)?.build()?;
    let invoker = ActionInvoker::with_defaults(server);
    let message = cmd.message.clone().unwrap_or(Value::Null);

    match invoker.invoke(&cmd.name, &cmd.action, message) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            error!("{}", err);
            println!("{}{}", CROSS, style(&err).red());
            std::process::exit(1);
        }
    }
}

async fn show_history(cmd: &HistoryCommand, cli: &Cli) -> Result<()> {
    let store = open_store(cli.database.as_deref()).await?;

    let integrations: Vec<IntegrationSummary> = match &cmd.project {
        Some(project) => store.list_integrations(project).await?,
        None => {
            let mut all = Vec::new();
            for project in store.list_projects().await? {
                all.extend(store.list_integrations(&project).await?);
            }
            all.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            all
        }
    }
    .into_iter()
    .take(cmd.limit)
    .collect();

    if integrations.is_empty() {
        println!("{}No integrations found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "integrations": integrations });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{}Integration history (showing latest {}):", INFO, cmd.limit);
    for summary in &integrations {
        println!("  {}", format_integration_summary(summary));
    }
    Ok(())
}
