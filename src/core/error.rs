//! Error types for the integration core

use thiserror::Error;

/// Errors raised by tasks, triggers, hosts and the action dispatcher
#[derive(Debug, Error)]
pub enum CruiseError {
    #[error("Task '{task}' failed: {message}")]
    Task { task: String, message: String },

    #[error("Trigger '{trigger}' failed: {message}")]
    Trigger { trigger: String, message: String },

    #[error("Condition failed: {0}")]
    Condition(String),

    #[error("'{item}' is in an invalid state: {message}")]
    InvalidState { item: String, message: String },

    #[error("Unable to find item with name '{0}'")]
    ItemNotFound(String),

    #[error("Unable to find action '{action}' on {item_type}")]
    ActionNotFound { item_type: String, action: String },

    #[error("Invalid input message: {0}")]
    InvalidMessage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CruiseError {
    /// Shorthand for a task failure
    pub fn task(task: impl Into<String>, message: impl Into<String>) -> Self {
        CruiseError::Task {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a trigger failure
    pub fn trigger(trigger: impl Into<String>, message: impl Into<String>) -> Self {
        CruiseError::Trigger {
            trigger: trigger.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an invalid lifecycle transition
    pub fn invalid_state(item: impl Into<String>, message: impl Into<String>) -> Self {
        CruiseError::InvalidState {
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, CruiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CruiseError::task("Compile", "exit code 2");
        assert_eq!(err.to_string(), "Task 'Compile' failed: exit code 2");

        let err = CruiseError::ActionNotFound {
            item_type: "Project".to_string(),
            action: "Explode".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to find action 'Explode' on Project");
    }
}
