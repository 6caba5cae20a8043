//! Server engine - starts, stops and observes every project on a server

use crate::{
    core::{
        IntegrationOutcome, IntegrationSummary, Project, Server, Severity, ValidationLog,
    },
    dispatch::{expect_project, ActionInvoker, ActionRegistry, ProjectMessage},
    execution::scheduler::{ProjectScheduler, DEFAULT_POLL_INTERVAL},
    persistence::PersistenceBackend,
};
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events raised while projects run
#[derive(Debug, Clone)]
pub enum IntegrationEvent {
    ProjectStarted {
        project: String,
    },
    ProjectStopped {
        project: String,
    },
    IntegrationRequested {
        project: String,
        source: String,
    },
    IntegrationStarted {
        project: String,
        request_id: Uuid,
    },
    IntegrationCompleted {
        summary: IntegrationSummary,
    },
    IntegrationAbandoned {
        project: String,
    },
    ProjectFailed {
        project: String,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(IntegrationEvent) + Send + Sync>;

/// Fans events out to every registered handler
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(IntegrationEvent) + Send + Sync + 'static,
    {
        self.handlers.write().push(Arc::new(handler));
    }

    pub fn emit(&self, event: IntegrationEvent) {
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

/// Settings shared by every project scheduler
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Spawns project schedulers onto the runtime and tracks them
#[derive(Clone)]
struct Launcher {
    runtime: Handle,
    settings: EngineSettings,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    events: EventBus,
    running: Arc<Mutex<HashMap<String, JoinHandle<Result<()>>>>>,
}

impl Launcher {
    fn scheduler(&self, project: Arc<Project>) -> ProjectScheduler {
        let scheduler = ProjectScheduler::new(project)
            .with_poll_interval(self.settings.poll_interval)
            .with_events(self.events.clone());
        match &self.persistence {
            Some(persistence) => scheduler.with_persistence(persistence.clone()),
            None => scheduler,
        }
    }

    fn launch(&self, project: &Arc<Project>) -> crate::core::Result<()> {
        project.start()?;
        let handle = self.runtime.spawn(self.scheduler(project.clone()).run());
        if let Some(previous) = self
            .running
            .lock()
            .insert(project.name().to_string(), handle)
        {
            // The earlier loop has already exited or is about to
            previous.abort();
        }
        Ok(())
    }
}

/// Owns the running state of a server
pub struct ServerEngine {
    server: Arc<Server>,
    launcher: Launcher,
}

impl ServerEngine {
    /// Create an engine bound to the current tokio runtime
    pub fn new(server: Arc<Server>, settings: EngineSettings) -> Result<Self> {
        let runtime = Handle::try_current().context("ServerEngine requires a tokio runtime")?;
        Ok(Self {
            server,
            launcher: Launcher {
                runtime,
                settings,
                persistence: None,
                events: EventBus::default(),
                running: Arc::new(Mutex::new(HashMap::new())),
            },
        })
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceBackend>) -> Self {
        self.launcher.persistence = Some(persistence);
        self
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    pub fn events(&self) -> &EventBus {
        &self.launcher.events
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(IntegrationEvent) + Send + Sync + 'static,
    {
        self.launcher.events.subscribe(handler);
    }

    /// Validate the whole tree; errors are fatal, warnings are logged
    pub fn validate(&self) -> Result<ValidationLog> {
        let started = std::time::Instant::now();
        let mut log = ValidationLog::new();
        self.server.validate(&mut log);
        debug!("Validated configuration in {:?}", started.elapsed());

        for warning in log.messages(Severity::Warning) {
            warn!("Configuration warning: {}", warning);
        }
        if log.number_of_errors() > 0 {
            for message in log.messages(Severity::Error) {
                error!("Configuration error: {}", message);
            }
            anyhow::bail!(
                "Configuration has {} error(s) and {} warning(s)",
                log.number_of_errors(),
                log.number_of_warnings()
            );
        }
        Ok(log)
    }

    /// Start every project that is able to start
    pub fn start(&self) -> Result<()> {
        info!("Starting server '{}'", self.server.name());
        for project in self.server.projects() {
            if project.can_start() {
                self.launcher
                    .launch(&project)
                    .with_context(|| format!("Failed to start project '{}'", project.name()))?;
            }
        }
        Ok(())
    }

    pub fn start_project(&self, name: &str) -> Result<()> {
        let project = self
            .server
            .find_project(name)
            .with_context(|| format!("Unknown project '{}'", name))?;
        self.launcher.launch(&project)?;
        Ok(())
    }

    /// Ask every running project to stop and wait for their loops to exit
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping server '{}'", self.server.name());
        for project in self.server.projects() {
            if project.request_stop() {
                debug!("Asked project '{}' to stop", project.name());
            }
        }

        let handles: Vec<_> = self.launcher.running.lock().drain().collect();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => debug!("Project '{}' loop exited", name),
                Ok(Err(err)) => warn!("Project '{}' stopped with error: {:#}", name, err),
                Err(err) if err.is_cancelled() => debug!("Project '{}' loop was aborted", name),
                Err(err) => error!("Project '{}' loop panicked: {}", name, err),
            }
        }
        Ok(())
    }

    /// Names of projects with a scheduling loop
    pub fn running_projects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.launcher.running.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Force one integration of every project and wait for the results
    pub async fn integrate_all_once(&self, source: &str) -> Result<Vec<IntegrationOutcome>> {
        let mut outcomes = Vec::new();
        for project in self.server.projects() {
            let scheduler = self.launcher.scheduler(project.clone());
            scheduler.load_state().await?;
            project.force_build(source);
            if let Some(outcome) = scheduler.poll_once().await? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Remote action invoker, including the `Start` action for projects
    pub fn invoker(&self) -> ActionInvoker {
        let mut registry = ActionRegistry::with_defaults();
        let launcher = self.launcher.clone();
        registry.register_typed(
            "Project",
            "Start",
            "Starts a project if it is not already started.",
            move |item, _: ProjectMessage| {
                let project = expect_project(item)?;
                launcher.launch(project)?;
                Ok(ProjectMessage {
                    project_name: Some(project.name().to_string()),
                })
            },
        );
        ActionInvoker::new(self.server.clone(), Arc::new(registry))
    }
}
