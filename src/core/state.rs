//! Execution state models

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Task has been built from configuration
    Loaded,
    /// Task configuration has been checked
    Validated,
    /// Task is initialised and waiting to run
    Pending,
    /// Task conditions are being evaluated
    CheckingConditions,
    /// Task is running
    Executing,
    /// Task finished and its follow-on tasks were drained
    Completed,
    /// Task was skipped (conditions failed or integration ended first)
    Skipped,
    /// Task was interrupted while checking conditions or executing
    Terminated,
}

impl TaskState {
    /// Check if task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Skipped | TaskState::Terminated
        )
    }

    /// State a task ends up in when an integration is cleaned up
    pub fn after_interruption(self) -> TaskState {
        match self {
            TaskState::Pending => TaskState::Skipped,
            TaskState::CheckingConditions | TaskState::Executing => TaskState::Terminated,
            other => other,
        }
    }
}

/// Running state of a project's scheduling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Outcome of an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationStatus {
    /// Outcome not yet known
    Unknown,
    /// Every executed task succeeded
    Success,
    /// At least one task failed
    Failure,
    /// The integration crashed outside of a task
    Error,
    /// The integration was refused or abandoned
    Cancelled,
}

impl IntegrationStatus {
    /// Parse a status name, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "unknown" => Some(IntegrationStatus::Unknown),
            "success" => Some(IntegrationStatus::Success),
            "failure" => Some(IntegrationStatus::Failure),
            "error" => Some(IntegrationStatus::Error),
            "cancelled" => Some(IntegrationStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
