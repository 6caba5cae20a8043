//! Validation log shared by every configurable item

use serde::{Deserialize, Serialize};

/// Severity of a validation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// The configuration cannot be used
    Error,
    /// The configuration works but may not behave as expected
    Warning,
}

/// A single validation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub severity: Severity,
    pub message: String,
}

/// Collects configuration problems found while validating the entity tree
///
/// Validation never fails; callers inspect the counts afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationLog {
    entries: Vec<ValidationEntry>,
}

impl ValidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fatal configuration error
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.entries.push(ValidationEntry {
            severity: Severity::Error,
            message: message.into(),
        });
    }

    /// Record a non-fatal warning
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.entries.push(ValidationEntry {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn number_of_errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn number_of_warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// All entries in the order they were reported
    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    /// Messages of the given severity
    pub fn messages(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Clear all entries
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }
}
