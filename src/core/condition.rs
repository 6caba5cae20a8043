//! Task gates and failure hooks

use crate::core::{
    context::TaskExecutionContext, error::Result, state::IntegrationStatus,
    validation::ValidationLog,
};
use regex::Regex;

/// A gate evaluated before a task runs
pub trait TaskCondition: Send + Sync {
    /// Type name used in logs and validation messages
    fn type_name(&self) -> &'static str;

    /// Decide whether the task may run
    fn evaluate(&self, context: &TaskExecutionContext) -> Result<bool>;

    fn validate(&self, _log: &mut ValidationLog) {}
}

/// Hook applied by the orchestrator after a task fails
pub trait TaskFailureAction: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn validate(&self, _log: &mut ValidationLog) {}

    /// React to the failure of `task`
    fn on_failure(&self, _task: &str, _error: &str, _context: &TaskExecutionContext) -> Result<()> {
        Ok(())
    }
}

/// Pattern for matching build parameter values
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Simple string contains match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
    /// A regular expression that failed to compile; never matches
    Invalid { pattern: String, error: String },
}

impl ConditionPattern {
    /// Build a pattern. A regex that does not compile is kept as
    /// [`ConditionPattern::Invalid`] and reported during validation.
    pub fn new(pattern: &str, use_regex: bool) -> Self {
        if use_regex {
            match Regex::new(pattern) {
                Ok(regex) => ConditionPattern::Regex(regex),
                Err(err) => ConditionPattern::Invalid {
                    pattern: pattern.to_string(),
                    error: err.to_string(),
                },
            }
        } else {
            ConditionPattern::Simple(pattern.to_string())
        }
    }

    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text.contains(pattern.as_str()),
            ConditionPattern::Regex(regex) => regex.is_match(text),
            ConditionPattern::Invalid { .. } => false,
        }
    }
}

/// Passes when the integration currently has the given status
#[derive(Debug, Clone)]
pub struct StatusCondition {
    pub value: IntegrationStatus,
}

impl TaskCondition for StatusCondition {
    fn type_name(&self) -> &'static str {
        "StatusCondition"
    }

    fn evaluate(&self, context: &TaskExecutionContext) -> Result<bool> {
        Ok(context.current_status() == self.value)
    }
}

/// Passes when a build parameter exists and matches a pattern
#[derive(Debug, Clone)]
pub struct PropertyCondition {
    pub name: String,
    pub pattern: ConditionPattern,
}

impl TaskCondition for PropertyCondition {
    fn type_name(&self) -> &'static str {
        "PropertyCondition"
    }

    fn evaluate(&self, context: &TaskExecutionContext) -> Result<bool> {
        Ok(context
            .parameter(&self.name)
            .is_some_and(|value| self.pattern.matches(&value)))
    }

    fn validate(&self, log: &mut ValidationLog) {
        if self.name.trim().is_empty() {
            log.add_error("PropertyCondition has no property name specified.");
        }
        if let ConditionPattern::Invalid { pattern, error } = &self.pattern {
            log.add_error(format!(
                "PropertyCondition pattern '{}' is not a valid regular expression: {}",
                pattern, error
            ));
        }
    }
}

/// Writes a line to the build log when a task fails
#[derive(Debug, Clone)]
pub struct LogFailure {
    pub message: String,
}

impl TaskFailureAction for LogFailure {
    fn type_name(&self) -> &'static str {
        "LogFailure"
    }

    fn validate(&self, log: &mut ValidationLog) {
        if self.message.is_empty() {
            log.add_warning("LogFailure has an empty message.");
        }
    }

    fn on_failure(&self, task: &str, error: &str, context: &TaskExecutionContext) -> Result<()> {
        context.add_entry_to_build_log(format!("{} ({}: {})", self.message, task, error));
        Ok(())
    }
}
