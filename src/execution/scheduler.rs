//! Project scheduler - the polling loop that turns trigger decisions into integrations

use crate::{
    core::{IntegrationOutcome, Project, ProjectState},
    execution::engine::{EventBus, IntegrationEvent},
    persistence::PersistenceBackend,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often triggers are polled by default
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest accepted poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Drives one project: polls its triggers and integrates when one fires
///
/// Integrations run on tokio's blocking pool because asking a host for
/// permission parks the calling thread.
pub struct ProjectScheduler {
    project: Arc<Project>,
    poll_interval: Duration,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    events: EventBus,
}

impl ProjectScheduler {
    pub fn new(project: Arc<Project>) -> Self {
        Self {
            project,
            poll_interval: DEFAULT_POLL_INTERVAL,
            persistence: None,
            events: EventBus::default(),
        }
    }

    /// Set the poll interval, raised to [`MIN_POLL_INTERVAL`] if shorter
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceBackend>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    /// Restore the project's persisted state, if a backend is configured
    pub async fn load_state(&self) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            if let Some(state) = persistence
                .load_project_state(self.project.name())
                .await
                .with_context(|| format!("Failed to load state for '{}'", self.project.name()))?
            {
                self.project.restore_persisted_state(state);
            }
        }
        Ok(())
    }

    /// Poll until the project is asked to stop
    ///
    /// An error while checking triggers stops the project and is returned.
    pub async fn run(self) -> Result<()> {
        let name = self.project.name().to_string();
        if let Err(err) = self.load_state().await {
            warn!("{:#}", err);
        }

        if !self.project.mark_running() {
            self.project.mark_stopped();
            debug!("Project '{}' was stopped before it started", name);
            return Ok(());
        }
        self.project.initialise_triggers();
        self.events.emit(IntegrationEvent::ProjectStarted {
            project: name.clone(),
        });
        debug!("Project '{}' has started", name);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            ticker.tick().await;
            if self.project.state() != ProjectState::Running {
                break Ok(());
            }
            if let Err(err) = self.poll_once().await {
                error!("An error has occurred in project '{}': {:#}", name, err);
                self.events.emit(IntegrationEvent::ProjectFailed {
                    project: name.clone(),
                    error: format!("{:#}", err),
                });
                break Err(err);
            }
        };

        self.project.clean_up_triggers();
        self.project.mark_stopped();
        self.events.emit(IntegrationEvent::ProjectStopped {
            project: name.clone(),
        });
        debug!("Project '{}' has stopped", name);
        result
    }

    /// Check the triggers once and integrate if one has fired
    pub async fn poll_once(&self) -> Result<Option<IntegrationOutcome>> {
        let Some(request) = self.project.check_for_request()? else {
            return Ok(None);
        };

        let name = self.project.name().to_string();
        self.events.emit(IntegrationEvent::IntegrationRequested {
            project: name.clone(),
            source: request.source_trigger.clone(),
        });

        let project = self.project.clone();
        let events = self.events.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            project.request_integration_with(&request, || {
                events.emit(IntegrationEvent::IntegrationStarted {
                    project: project.name().to_string(),
                    request_id: request.id,
                })
            })
        })
        .await
        .context("Integration thread panicked")?;

        match &outcome {
            IntegrationOutcome::Completed(summary) => {
                self.record(summary).await;
                self.events.emit(IntegrationEvent::IntegrationCompleted {
                    summary: summary.clone(),
                });
            }
            IntegrationOutcome::Abandoned => {
                info!("Integration for '{}' was abandoned", name);
                self.events
                    .emit(IntegrationEvent::IntegrationAbandoned { project: name });
            }
        }

        self.project.reset_triggers();
        Ok(Some(outcome))
    }

    async fn record(&self, summary: &crate::core::IntegrationSummary) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if let Err(err) = persistence.save_integration(summary).await {
            warn!("Failed to record integration for '{}': {:#}", summary.project, err);
        }
        let state = self.project.persisted_state();
        if let Err(err) = persistence
            .save_project_state(self.project.name(), &state)
            .await
        {
            warn!("Failed to save state for '{}': {:#}", summary.project, err);
        }
    }
}
