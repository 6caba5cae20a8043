//! Triggers decide when a project should integrate

use crate::core::{
    error::Result,
    integration::IntegrationRequest,
    naming::{child_name, URN_PREFIX},
    project::Project,
    validation::ValidationLog,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::debug;

/// The policy behind a trigger
pub trait TriggerPolicy: Send {
    fn type_name(&self) -> &'static str;

    /// Decide whether an integration is due. Called at most once per
    /// pending request.
    fn on_check(&mut self, source: &str) -> Result<Option<IntegrationRequest>>;

    /// Arm for the next cycle
    fn on_reset(&mut self) {}

    fn on_clean_up(&mut self) {}

    /// Hint for when the trigger will next fire
    fn next_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn validate(&self, _log: &mut ValidationLog) {}
}

/// Caches the request raised by its policy until reset
pub struct Trigger {
    name: Option<String>,
    type_name: &'static str,
    pending: Mutex<Option<IntegrationRequest>>,
    policy: Mutex<Box<dyn TriggerPolicy>>,
    project: RwLock<Weak<Project>>,
}

impl Trigger {
    pub fn new<P: TriggerPolicy + 'static>(policy: P) -> Self {
        Self {
            name: None,
            type_name: policy.type_name(),
            pending: Mutex::new(None),
            policy: Mutex::new(Box::new(policy)),
            project: RwLock::new(Weak::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name_or_type(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.type_name.to_string())
    }

    pub fn project(&self) -> Option<Arc<Project>> {
        self.project.read().upgrade()
    }

    pub(crate) fn attach(&self, project: &Weak<Project>) {
        *self.project.write() = project.clone();
    }

    pub fn universal_name(&self) -> String {
        let parent = self
            .project()
            .map(|project| project.universal_name())
            .unwrap_or_else(|| URN_PREFIX.to_string());
        child_name(&parent, &self.name_or_type())
    }

    pub fn validate(&self, log: &mut ValidationLog) {
        self.policy.lock().validate(log);
    }

    /// Prepare for the first cycle
    pub fn initialise(&self) {
        self.reset();
    }

    /// Return the pending request, asking the policy only when none is cached
    pub fn check(&self) -> Result<Option<IntegrationRequest>> {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            *pending = self.policy.lock().on_check(&self.name_or_type())?;
            if let Some(request) = pending.as_ref() {
                debug!(
                    "Trigger {} raised request {}",
                    self.name_or_type(),
                    request.id
                );
            }
        }
        Ok(pending.clone())
    }

    /// Forget the pending request and re-arm the policy
    pub fn reset(&self) {
        *self.pending.lock() = None;
        self.policy.lock().on_reset();
    }

    pub fn clean_up(&self) {
        self.policy.lock().on_clean_up();
    }

    pub fn next_time(&self) -> Option<DateTime<Utc>> {
        self.policy.lock().next_time()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("pending", &self.has_pending())
            .finish()
    }
}
