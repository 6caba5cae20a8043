//! Projects - the unit that integrates
//!
//! A project owns a list of tasks and the triggers that decide when to run
//! them. [`Project::request_integration`] is the orchestration entry point:
//! it asks the project's host for permission (when there is one), runs the
//! task tree and records an [`IntegrationSummary`].

use crate::core::{
    context::{BuildLogEntry, TaskExecutionContext, TaskExecutionParameters},
    environment::{Clock, FileSystem, LocalFileSystem, SystemClock},
    error::{CruiseError, Result},
    integration::{IntegrationContext, IntegrationRequest, IntegrationSummary, PersistedProjectState},
    item::IntegrationHost,
    naming::{child_name, eq_ignore_case, scope_remainder, Located, URN_PREFIX},
    server::Server,
    state::{IntegrationStatus, ProjectState, TaskState},
    task::TaskRef,
    trigger::Trigger,
    validation::ValidationLog,
};
use crate::execution::executor::TaskExecutor;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long a project waits for its host by default (seven days)
pub const DEFAULT_INTEGRATION_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Services and limits used while integrating
#[derive(Clone)]
pub struct ProjectSettings {
    /// Upper bound on waiting for the host to admit a request
    pub integration_timeout: Duration,
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub artifact_root: PathBuf,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            integration_timeout: DEFAULT_INTEGRATION_TIMEOUT,
            clock: Arc::new(SystemClock),
            file_system: Arc::new(LocalFileSystem),
            artifact_root: PathBuf::from("artifacts"),
        }
    }
}

/// Result of asking a project to integrate
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationOutcome {
    /// The integration ran
    Completed(IntegrationSummary),
    /// The host refused the request or did not answer in time
    Abandoned,
}

impl IntegrationOutcome {
    pub fn summary(&self) -> Option<&IntegrationSummary> {
        match self {
            IntegrationOutcome::Completed(summary) => Some(summary),
            IntegrationOutcome::Abandoned => None,
        }
    }
}

/// Completes an integration context when dropped, unwinding included
struct CompleteOnDrop<'a>(&'a IntegrationContext);

impl Drop for CompleteOnDrop<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Builder for [`Project`]
pub struct ProjectBuilder {
    name: String,
    tasks: Vec<TaskRef>,
    triggers: Vec<Arc<Trigger>>,
    settings: ProjectSettings,
}

impl ProjectBuilder {
    pub fn task(mut self, task: impl Into<TaskRef>) -> Self {
        self.tasks.push(task.into());
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = TaskRef>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn trigger(mut self, trigger: impl Into<Arc<Trigger>>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    pub fn integration_timeout(mut self, timeout: Duration) -> Self {
        self.settings.integration_timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.settings.clock = clock;
        self
    }

    pub fn file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.settings.file_system = file_system;
        self
    }

    pub fn artifact_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.settings.artifact_root = root.into();
        self
    }

    pub fn settings(mut self, settings: ProjectSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Create the project and link its tasks and triggers back to it
    pub fn build(self) -> Arc<Project> {
        Arc::new_cyclic(|me| {
            for task in &self.tasks {
                task.attach(me);
            }
            for trigger in &self.triggers {
                trigger.attach(me);
            }

            Project {
                name: self.name,
                tasks: self.tasks,
                triggers: self.triggers,
                settings: self.settings,
                host: RwLock::new(None),
                server: RwLock::new(Weak::new()),
                state: Mutex::new(ProjectState::Stopped),
                persisted: Mutex::new(PersistedProjectState::default()),
                forced: Mutex::new(None),
                last_build_log: Mutex::new(Vec::new()),
                integrating: Mutex::new(()),
            }
        })
    }
}

/// A buildable project
pub struct Project {
    name: String,
    tasks: Vec<TaskRef>,
    triggers: Vec<Arc<Trigger>>,
    settings: ProjectSettings,
    host: RwLock<Option<Weak<dyn IntegrationHost>>>,
    server: RwLock<Weak<Server>>,
    state: Mutex<ProjectState>,
    persisted: Mutex<PersistedProjectState>,
    forced: Mutex<Option<IntegrationRequest>>,
    last_build_log: Mutex<Vec<BuildLogEntry>>,
    integrating: Mutex<()>,
}

impl Project {
    pub fn builder(name: impl Into<String>) -> ProjectBuilder {
        ProjectBuilder {
            name: name.into(),
            tasks: Vec::new(),
            triggers: Vec::new(),
            settings: ProjectSettings::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    pub fn triggers(&self) -> &[Arc<Trigger>] {
        &self.triggers
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn host(&self) -> Option<Arc<dyn IntegrationHost>> {
        self.host.read().as_ref().and_then(Weak::upgrade)
    }

    /// Route future integration requests through `host`
    pub fn set_host(&self, host: Option<Weak<dyn IntegrationHost>>) {
        *self.host.write() = host;
    }

    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.read().upgrade()
    }

    pub(crate) fn attach_server(&self, server: &Weak<Server>) {
        *self.server.write() = server.clone();
    }

    /// Server universal name plus the project name
    pub fn universal_name(&self) -> String {
        let parent = self
            .server()
            .map(|server| server.universal_name())
            .unwrap_or_else(|| URN_PREFIX.to_string());
        child_name(&parent, &self.name)
    }

    /// Address of the project below its host, when it has one
    fn hosted_name(&self) -> Option<String> {
        self.host()
            .map(|host| child_name(&host.universal_name(), &self.name))
    }

    /// Resolve a universal name to this project, one of its tasks or triggers
    ///
    /// Both the server-rooted name and the name below the host are accepted.
    pub fn locate(self: &Arc<Self>, name: &str) -> Option<Located> {
        let own = self.universal_name();
        let hosted = self.hosted_name();
        let rest = scope_remainder(name, &own).or_else(|| {
            hosted
                .as_deref()
                .and_then(|hosted| scope_remainder(name, hosted))
        })?;

        if rest.is_empty() {
            return Some(Located::Project(self.clone()));
        }

        // Rebase the remainder onto the name the children are addressed by
        let target = format!("{}{}", own, rest);
        self.tasks
            .iter()
            .find_map(|task| task.locate(&target))
            .or_else(|| {
                self.triggers
                    .iter()
                    .find(|trigger| eq_ignore_case(&trigger.universal_name(), &target))
                    .map(|trigger| Located::Trigger(trigger.clone()))
            })
    }

    pub fn validate(&self, log: &mut ValidationLog) {
        debug!("Validating project '{}'", self.name);
        if self.name.trim().is_empty() {
            log.add_error("The Project has no name specified.");
        }
        for task in &self.tasks {
            task.validate(log);
        }
        for trigger in &self.triggers {
            trigger.validate(log);
        }
    }

    pub fn state(&self) -> ProjectState {
        *self.state.lock()
    }

    pub fn can_start(&self) -> bool {
        !matches!(self.state(), ProjectState::Running | ProjectState::Starting)
    }

    pub fn can_stop(&self) -> bool {
        !matches!(self.state(), ProjectState::Stopped | ProjectState::Stopping)
    }

    /// Move to `Starting`. The scheduling loop moves it on to `Running`.
    pub fn start(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            let message = "Cannot start a project without a name";
            error!("{}", message);
            return Err(CruiseError::invalid_state("", message));
        }

        let mut state = self.state.lock();
        if *state != ProjectState::Stopped {
            let message = "The project must be in a stopped state before it can be started";
            warn!("{} ('{}')", message, self.name);
            return Err(CruiseError::invalid_state(&self.name, message));
        }

        info!("Starting project '{}'", self.name);
        *state = ProjectState::Starting;
        Ok(())
    }

    /// Ask the scheduling loop to stop
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != ProjectState::Running {
            return Err(CruiseError::invalid_state(
                &self.name,
                "The project must be in a running state before it can be stopped",
            ));
        }

        info!("Stopping project '{}'", self.name);
        *state = ProjectState::Stopping;
        Ok(())
    }

    /// Enter `Running` unless a stop was requested while starting
    pub(crate) fn mark_running(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ProjectState::Stopping {
            return false;
        }
        *state = ProjectState::Running;
        true
    }

    /// Stop during shutdown, including a project that is still starting
    pub(crate) fn request_stop(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ProjectState::Starting | ProjectState::Running => {
                *state = ProjectState::Stopping;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_stopped(&self) {
        *self.state.lock() = ProjectState::Stopped;
    }

    /// Queue a one-shot request that wins over every trigger
    pub fn force_build(&self, source: impl Into<String>) -> IntegrationRequest {
        let request = IntegrationRequest::at(source, self.settings.clock.now());
        info!(
            "Force build requested by '{}' for '{}'",
            request.source_trigger, self.name
        );
        *self.forced.lock() = Some(request.clone());
        request
    }

    /// The forced request if any, else the first trigger that fires
    pub fn check_for_request(&self) -> Result<Option<IntegrationRequest>> {
        if let Some(request) = self.forced.lock().take() {
            return Ok(Some(request));
        }
        for trigger in &self.triggers {
            if let Some(request) = trigger.check()? {
                return Ok(Some(request));
            }
        }
        Ok(None)
    }

    pub fn initialise_triggers(&self) {
        for trigger in &self.triggers {
            trigger.initialise();
        }
    }

    pub fn reset_triggers(&self) {
        for trigger in &self.triggers {
            trigger.reset();
        }
    }

    pub fn clean_up_triggers(&self) {
        for trigger in &self.triggers {
            trigger.clean_up();
        }
    }

    /// Integrate, asking the host for permission first when there is one
    pub fn request_integration(&self, request: &IntegrationRequest) -> IntegrationOutcome {
        self.request_integration_with(request, || {})
    }

    /// Like [`Project::request_integration`], calling `on_started` once the
    /// integration is allowed to run
    pub fn request_integration_with<F>(
        &self,
        request: &IntegrationRequest,
        on_started: F,
    ) -> IntegrationOutcome
    where
        F: FnOnce(),
    {
        info!(
            "Received integration request from '{}' for '{}'",
            request.source_trigger, self.name
        );

        let Some(host) = self.host() else {
            on_started();
            return IntegrationOutcome::Completed(self.integrate(request));
        };

        let context = IntegrationContext::new(self.universal_name());
        context.lock();
        debug!("Asking host if '{}' can integrate", self.name);
        host.ask_to_integrate(context.clone());

        if context.wait(self.settings.integration_timeout) {
            // The host admits its next request on completion
            let _completion = CompleteOnDrop(&context);
            on_started();
            IntegrationOutcome::Completed(self.integrate(request))
        } else {
            info!("Cancelling integration for '{}'", self.name);
            // The host may still hold the context; make sure it lets go
            context.cancel();
            context.complete();
            IntegrationOutcome::Abandoned
        }
    }

    /// Run the task tree once and record the result
    pub fn integrate(&self, request: &IntegrationRequest) -> IntegrationSummary {
        let _running = self.integrating.lock();
        let started = Instant::now();
        let start_time = self.settings.clock.now();
        info!("Starting integration for '{}'", self.name);

        let mut log = ValidationLog::new();
        for task in &self.tasks {
            if task.state() == TaskState::Loaded {
                task.validate(&mut log);
            }
        }
        for message in log.entries() {
            warn!("Validation problem in '{}': {}", self.name, message.message);
        }

        let mut context = TaskExecutionContext::new(TaskExecutionParameters {
            request: Some(request.clone()),
            project: self.name.clone(),
            build_name: None,
            clock: self.settings.clock.clone(),
            file_system: self.settings.file_system.clone(),
            artifact_root: self.settings.artifact_root.clone(),
        });

        let run = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
            self.initialise_tasks()?;
            debug!("Running tasks for '{}'", self.name);
            TaskExecutor::new().run_tasks(&context, &self.tasks);
            Ok(())
        }));
        match run {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!("An unhandled error occurred during initialisation: {}", err);
                context.add_entry_to_build_log(format!("Initialisation failed: {}", err));
                context.set_status(IntegrationStatus::Error);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Integration for '{}' panicked: {}", self.name, message);
                context.add_entry_to_build_log(format!("Integration panicked: {}", message));
                context.set_status(IntegrationStatus::Error);
            }
        }
        context.complete();
        let status = context.current_status();

        debug!("Cleaning up after integration for '{}'", self.name);
        for task in &self.tasks {
            match panic::catch_unwind(AssertUnwindSafe(|| task.clean_up())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("Unhandled error during task clean up: {}", err),
                Err(payload) => error!(
                    "Task clean up panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }

        let summary = IntegrationSummary {
            request_id: request.id,
            project: self.name.clone(),
            build_name: context.build_name().to_string(),
            source_trigger: request.source_trigger.clone(),
            start_time,
            finish_time: self.settings.clock.now(),
            status,
        };
        self.persisted.lock().last_integration = Some(summary.clone());
        *self.last_build_log.lock() = context.build_log();

        info!(
            "Completed integration for '{}' with status {} in {:.3}s",
            self.name,
            status,
            started.elapsed().as_secs_f64()
        );
        summary
    }

    fn initialise_tasks(&self) -> Result<()> {
        for task in &self.tasks {
            task.initialise()?;
        }
        Ok(())
    }

    pub fn last_integration(&self) -> Option<IntegrationSummary> {
        self.persisted.lock().last_integration.clone()
    }

    /// Build log of the most recent integration
    pub fn last_build_log(&self) -> Vec<BuildLogEntry> {
        self.last_build_log.lock().clone()
    }

    pub fn persisted_state(&self) -> PersistedProjectState {
        self.persisted.lock().clone()
    }

    pub fn restore_persisted_state(&self, state: PersistedProjectState) {
        debug!("Loaded project state for '{}'", self.name);
        *self.persisted.lock() = state;
    }

    pub fn set_value(&self, key: impl Into<String>, value: impl Into<String>) {
        self.persisted.lock().values.insert(key.into(), value.into());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.persisted.lock().values.get(key).cloned()
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("triggers", &self.triggers.len())
            .field("state", &self.state())
            .finish()
    }
}
