//! Task execution context - build log, status and services for one integration
//!
//! A root context is created per integration and a child context is started
//! for every task that runs. Children share the build log, the status and the
//! parameters of the root.

use crate::core::{
    environment::{Clock, FileSystem, LocalFileSystem, SystemClock},
    error::Result,
    integration::IntegrationRequest,
    state::IntegrationStatus,
    task::Task,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One structured entry in the build log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildLogEntry {
    /// When the entry was written
    pub time: DateTime<Utc>,

    /// Nesting level (0 = integration, 1 = top-level task, ...)
    pub depth: usize,

    pub kind: BuildLogKind,
}

/// What a build log entry records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildLogKind {
    IntegrationStarted { project: String, build: String },
    TaskStarted { name: String, task_type: String },
    TaskFinished { name: String },
    Entry { message: String },
    File { name: String },
    IntegrationFinished { status: IntegrationStatus },
}

/// Inputs for a root execution context
pub struct TaskExecutionParameters {
    pub request: Option<IntegrationRequest>,
    pub project: String,
    pub build_name: Option<String>,
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    /// Directory under which `<project>/<build>` artifact folders are created
    pub artifact_root: PathBuf,
}

impl Default for TaskExecutionParameters {
    fn default() -> Self {
        Self {
            request: None,
            project: String::new(),
            build_name: None,
            clock: Arc::new(SystemClock),
            file_system: Arc::new(LocalFileSystem),
            artifact_root: PathBuf::from("."),
        }
    }
}

#[derive(Debug)]
struct SharedState {
    log: Mutex<Vec<BuildLogEntry>>,
    status: Mutex<IntegrationStatus>,
    parameters: Mutex<HashMap<String, String>>,
}

/// Per-invocation handle to logging and services, propagated down the task tree
pub struct TaskExecutionContext {
    request: Option<IntegrationRequest>,
    project: String,
    build_name: String,
    depth: usize,
    task_name: Option<String>,
    shared: Arc<SharedState>,
    clock: Arc<dyn Clock>,
    file_system: Arc<dyn FileSystem>,
    artifact_root: PathBuf,
    completed: bool,
}

impl TaskExecutionContext {
    /// Start a root context; writes the integration start entry
    pub fn new(parameters: TaskExecutionParameters) -> Self {
        let now = parameters.clock.now();
        let build_name = parameters
            .build_name
            .unwrap_or_else(|| now.format("%Y%m%d%H%M%S").to_string());

        let context = Self {
            request: parameters.request,
            project: parameters.project,
            build_name,
            depth: 0,
            task_name: None,
            shared: Arc::new(SharedState {
                log: Mutex::new(Vec::new()),
                status: Mutex::new(IntegrationStatus::Success),
                parameters: Mutex::new(HashMap::new()),
            }),
            clock: parameters.clock,
            file_system: parameters.file_system,
            artifact_root: parameters.artifact_root,
            completed: false,
        };
        context.write(BuildLogKind::IntegrationStarted {
            project: context.project.clone(),
            build: context.build_name.clone(),
        });
        context
    }

    /// Start a child context for a task that is about to run
    pub fn start_child(&self, task: &Task) -> TaskExecutionContext {
        let name = task.name_or_type();
        let child = Self {
            request: self.request.clone(),
            project: self.project.clone(),
            build_name: self.build_name.clone(),
            depth: self.depth + 1,
            task_name: Some(name.clone()),
            shared: self.shared.clone(),
            clock: self.clock.clone(),
            file_system: self.file_system.clone(),
            artifact_root: self.artifact_root.clone(),
            completed: false,
        };
        child.write(BuildLogKind::TaskStarted {
            name,
            task_type: task.type_name().to_string(),
        });
        child
    }

    /// Close this context. Only the first call has any effect.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;

        let kind = match &self.task_name {
            Some(name) => BuildLogKind::TaskFinished { name: name.clone() },
            None => BuildLogKind::IntegrationFinished {
                status: self.current_status(),
            },
        };
        self.write(kind);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Append a free-text entry to the build log
    pub fn add_entry_to_build_log(&self, message: impl Into<String>) {
        self.write(BuildLogKind::Entry {
            message: message.into(),
        });
    }

    /// Copy (or move, when `delete` is set) a file into this build's artifact folder
    pub fn import_file(&self, source: &Path, delete: bool) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", source.display()),
            )
        })?;
        let destination = self.artifact_folder().join(file_name);

        if delete {
            self.file_system.move_file(source, &destination)?;
        } else {
            self.file_system.copy_file(source, &destination)?;
        }

        self.write(BuildLogKind::File {
            name: file_name.to_string_lossy().into_owned(),
        });
        Ok(destination)
    }

    /// Folder holding artifacts for this build
    pub fn artifact_folder(&self) -> PathBuf {
        self.artifact_root.join(&self.project).join(&self.build_name)
    }

    pub fn current_status(&self) -> IntegrationStatus {
        *self.shared.status.lock()
    }

    pub fn set_status(&self, status: IntegrationStatus) {
        *self.shared.status.lock() = status;
    }

    /// Set a build parameter visible to every task in this integration
    pub fn set_parameter(&self, key: impl Into<String>, value: impl Into<String>) {
        self.shared.parameters.lock().insert(key.into(), value.into());
    }

    pub fn parameter(&self, key: &str) -> Option<String> {
        self.shared.parameters.lock().get(key).cloned()
    }

    /// Snapshot of the build log so far
    pub fn build_log(&self) -> Vec<BuildLogEntry> {
        self.shared.log.lock().clone()
    }

    pub fn request(&self) -> Option<&IntegrationRequest> {
        self.request.as_ref()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn build_name(&self) -> &str {
        &self.build_name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.file_system.as_ref()
    }

    fn write(&self, kind: BuildLogKind) {
        let entry = BuildLogEntry {
            time: self.clock.now(),
            depth: self.depth,
            kind,
        };
        self.shared.log.lock().push(entry);
    }
}

impl Default for TaskExecutionContext {
    fn default() -> Self {
        Self::new(TaskExecutionParameters::default())
    }
}

impl std::fmt::Debug for TaskExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutionContext")
            .field("project", &self.project)
            .field("build_name", &self.build_name)
            .field("depth", &self.depth)
            .field("task_name", &self.task_name)
            .field("completed", &self.completed)
            .finish()
    }
}
