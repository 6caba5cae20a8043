//! Server configuration from YAML
//!
//! A configuration file describes the whole entity tree. Queues and projects
//! are tagged by kind, tasks and triggers by their `type`:
//!
//! ```yaml
//! name: Local
//! children:
//!   - queue:
//!       name: Builds
//!       allowed_active: 1
//!       children:
//!         - project:
//!             name: Core
//!             tasks:
//!               - type: comment
//!                 message: Building core
//!             triggers:
//!               - type: interval
//!                 seconds: 60
//! ```

use crate::builtins::{
    tasks::{Comment, Fail, Sequence},
    triggers::IntervalTrigger,
};
use crate::core::{
    condition::{ConditionPattern, LogFailure, PropertyCondition, StatusCondition},
    item::ServerItem,
    project::{Project, DEFAULT_INTEGRATION_TIMEOUT},
    queue::Queue,
    server::Server,
    state::IntegrationStatus,
    task::{Task, TaskRef},
    trigger::Trigger,
};
use crate::execution::{EngineSettings, DEFAULT_POLL_INTERVAL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn default_integration_timeout() -> u64 {
    DEFAULT_INTEGRATION_TIMEOUT.as_secs()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_allowed_active() -> usize {
    1
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name
    pub name: String,

    /// How long a project waits for its host (in seconds)
    #[serde(default = "default_integration_timeout")]
    pub integration_timeout_secs: u64,

    /// How often triggers are polled (in milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Root folder for build artifacts, laid out as `<project>/<build>`
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Items are written as single-key maps (`- project: ..`, `- queue: ..`)
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub children: Vec<ItemConfig>,
}

/// A direct child of the server or of a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemConfig {
    Project(ProjectConfig),
    Queue(QueueConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    #[serde(default)]
    pub tasks: Vec<TaskConfig>,

    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,

    /// Number of integrations the queue lets run at once
    #[serde(default = "default_allowed_active")]
    pub allowed_active: usize,

    #[serde(default)]
    pub children: Vec<ItemConfig>,
}

/// Task configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Optional name; the type name is used when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Gates that must all pass for the task to run
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,

    /// Hooks applied when the task fails
    #[serde(default)]
    pub on_failure: Vec<FailureActionConfig>,

    #[serde(flatten)]
    pub kind: TaskKindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKindConfig {
    Comment {
        message: String,
    },
    Sequence {
        #[serde(default)]
        tasks: Vec<TaskConfig>,
    },
    Fail {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionConfig {
    /// Passes when the integration status equals `value`
    Status { value: String },
    /// Passes when a build parameter matches `pattern`
    Property {
        name: String,
        pattern: String,
        #[serde(default)]
        use_regex: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureActionConfig {
    Log { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    Interval {
        #[serde(default)]
        name: Option<String>,
        seconds: u64,
    },
}

impl ServerConfig {
    /// Load server configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration '{}'", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration '{}'", path.display()))
    }

    /// Parse server configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Reject values the live tree cannot represent. Everything else is
    /// left to tree validation.
    fn check(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        for project in self.project_configs() {
            for task in &project.tasks {
                task.check()?;
            }
        }
        Ok(())
    }

    /// Every project configuration, queues flattened
    pub fn project_configs(&self) -> Vec<&ProjectConfig> {
        fn collect<'a>(items: &'a [ItemConfig], out: &mut Vec<&'a ProjectConfig>) {
            for item in items {
                match item {
                    ItemConfig::Project(project) => out.push(project),
                    ItemConfig::Queue(queue) => collect(&queue.children, out),
                }
            }
        }

        let mut projects = Vec::new();
        collect(&self.children, &mut projects);
        projects
    }

    pub fn integration_timeout(&self) -> Duration {
        Duration::from_secs(self.integration_timeout_secs)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Build the live entity tree
    pub fn build(&self) -> Result<Arc<Server>> {
        let children = self
            .children
            .iter()
            .map(|item| self.build_item(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Server::new(self.name.clone(), children))
    }

    fn build_item(&self, item: &ItemConfig) -> Result<ServerItem> {
        Ok(match item {
            ItemConfig::Project(project) => self.build_project(project)?.into(),
            ItemConfig::Queue(queue) => {
                let children = queue
                    .children
                    .iter()
                    .map(|child| self.build_item(child))
                    .collect::<Result<Vec<_>>>()?;
                Queue::with_allowed_active(queue.name.clone(), queue.allowed_active, children)
                    .into()
            }
        })
    }

    fn build_project(&self, config: &ProjectConfig) -> Result<Arc<Project>> {
        let tasks = config
            .tasks
            .iter()
            .map(TaskConfig::build)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid task in project '{}'", config.name))?;

        let mut builder = Project::builder(config.name.clone())
            .tasks(tasks)
            .integration_timeout(self.integration_timeout())
            .artifact_root(self.artifact_dir.clone());
        for trigger in &config.triggers {
            builder = builder.trigger(trigger.build());
        }
        Ok(builder.build())
    }
}

impl TaskConfig {
    fn check(&self) -> Result<()> {
        for condition in &self.conditions {
            if let ConditionConfig::Status { value } = condition {
                if IntegrationStatus::parse(value).is_none() {
                    anyhow::bail!("Unknown integration status '{}'", value);
                }
            }
        }
        if let TaskKindConfig::Sequence { tasks } = &self.kind {
            for task in tasks {
                task.check()?;
            }
        }
        Ok(())
    }

    /// Build a fresh task; each call creates new task instances
    pub fn build(&self) -> Result<TaskRef> {
        let mut task = match &self.kind {
            TaskKindConfig::Comment { message } => Task::new(Comment::new(message.clone())),
            TaskKindConfig::Fail { message } => Task::new(Fail::new(message.clone())),
            TaskKindConfig::Sequence { tasks } => {
                let children = tasks
                    .iter()
                    .map(TaskConfig::build)
                    .collect::<Result<Vec<_>>>()?;
                Task::new(Sequence::new(children))
            }
        };

        if let Some(name) = &self.name {
            task = task.named(name.clone());
        }

        for condition in &self.conditions {
            task = match condition {
                ConditionConfig::Status { value } => {
                    let value = IntegrationStatus::parse(value)
                        .with_context(|| format!("Unknown integration status '{}'", value))?;
                    task.with_condition(StatusCondition { value })
                }
                ConditionConfig::Property {
                    name,
                    pattern,
                    use_regex,
                } => task.with_condition(PropertyCondition {
                    name: name.clone(),
                    pattern: ConditionPattern::new(pattern, *use_regex),
                }),
            };
        }

        for action in &self.on_failure {
            task = match action {
                FailureActionConfig::Log { message } => task.with_failure_action(LogFailure {
                    message: message.clone(),
                }),
            };
        }

        Ok(task.into_ref())
    }
}

impl TriggerConfig {
    pub fn build(&self) -> Trigger {
        match self {
            TriggerConfig::Interval { name, seconds } => {
                let trigger = Trigger::new(IntervalTrigger::new(Duration::from_secs(*seconds)));
                match name {
                    Some(name) => trigger.named(name.clone()),
                    None => trigger,
                }
            }
        }
    }
}
