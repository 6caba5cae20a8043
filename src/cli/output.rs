//! CLI output formatting

use crate::{
    core::{IntegrationStatus, IntegrationSummary, Located, ProjectState, Severity, ValidationLog},
    dispatch::RemoteActionDefinition,
    execution::IntegrationEvent,
};
use console::Emoji;

pub use console::style;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format an integration status for display
pub fn format_status(status: IntegrationStatus) -> String {
    match status {
        IntegrationStatus::Unknown => style("UNKNOWN").dim().to_string(),
        IntegrationStatus::Success => style("SUCCESS").green().to_string(),
        IntegrationStatus::Failure => style("FAILURE").red().to_string(),
        IntegrationStatus::Error => style("ERROR").red().bold().to_string(),
        IntegrationStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

pub fn format_project_state(state: ProjectState) -> String {
    match state {
        ProjectState::Stopped => style("STOPPED").dim().to_string(),
        ProjectState::Starting => style("STARTING").yellow().to_string(),
        ProjectState::Running => style("RUNNING").green().to_string(),
        ProjectState::Stopping => style("STOPPING").yellow().to_string(),
    }
}

fn status_icon(status: IntegrationStatus) -> Emoji<'static, 'static> {
    match status {
        IntegrationStatus::Success => CHECK,
        IntegrationStatus::Failure | IntegrationStatus::Error => CROSS,
        _ => INFO,
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// One-line summary of an integration
pub fn format_integration_summary(summary: &IntegrationSummary) -> String {
    format!(
        "{}{} - {} - {} - {} ({}) - {}",
        status_icon(summary.status),
        style(&summary.request_id.to_string()[..8]).dim(),
        style(&summary.project).bold(),
        format_status(summary.status),
        style(&summary.source_trigger).cyan(),
        style(summary.start_time.format("%Y-%m-%d %H:%M:%S")).dim(),
        format_duration(summary.duration())
    )
}

/// Format an integration event for display
pub fn format_integration_event(event: &IntegrationEvent) -> String {
    match event {
        IntegrationEvent::ProjectStarted { project } => {
            format!("{}Project {} started", ROCKET, style(project).bold())
        }
        IntegrationEvent::ProjectStopped { project } => {
            format!("{}Project {} stopped", INFO, style(project).dim())
        }
        IntegrationEvent::IntegrationRequested { project, source } => format!(
            "{}{} requested by {}",
            SPINNER,
            style(project).cyan(),
            style(source).dim()
        ),
        IntegrationEvent::IntegrationStarted { project, request_id } => format!(
            "{}{} integrating ({})",
            SPINNER,
            style(project).cyan(),
            style(&request_id.to_string()[..8]).dim()
        ),
        IntegrationEvent::IntegrationCompleted { summary } => format!(
            "{}{} {} in {}",
            status_icon(summary.status),
            style(&summary.project).bold(),
            format_status(summary.status),
            format_duration(summary.duration())
        ),
        IntegrationEvent::IntegrationAbandoned { project } => format!(
            "{}{} abandoned: the host did not allow it",
            WARN,
            style(project).yellow()
        ),
        IntegrationEvent::ProjectFailed { project, error } => {
            format!("{}{}: {}", CROSS, style(project).red(), style(error).dim())
        }
    }
}

/// Format every entry of a validation log, errors first
pub fn format_validation_log(log: &ValidationLog) -> Vec<String> {
    let errors = log
        .messages(Severity::Error)
        .into_iter()
        .map(|message| format!("{}{}", CROSS, style(message).red()));
    let warnings = log
        .messages(Severity::Warning)
        .into_iter()
        .map(|message| format!("{}{}", WARN, style(message).yellow()));
    errors.chain(warnings).collect()
}

pub fn format_located(item: &Located) -> String {
    format!(
        "{}{} {}",
        CHECK,
        style(item.item_type()).cyan(),
        style(item.universal_name()).bold()
    )
}

pub fn format_action(action: &RemoteActionDefinition) -> String {
    format!(
        "  {} ({} -> {}) {}",
        style(&action.name).bold(),
        action.input_message.as_deref().unwrap_or("-"),
        action.output_message.as_deref().unwrap_or("-"),
        style(&action.description).dim()
    )
}
