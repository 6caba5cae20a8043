//! cruise - integration scheduling and task execution for a continuous integration server

pub mod builtins;
pub mod cli;
pub mod core;
pub mod dispatch;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use crate::core::{
    CruiseError, IntegrationContext, IntegrationHost, IntegrationOutcome, IntegrationRequest,
    IntegrationStatus, IntegrationSummary, Located, Project, ProjectState, Queue, Server,
    ServerItem, Task, TaskState, Trigger, ValidationLog,
};
pub use crate::core::config::ServerConfig;
pub use dispatch::{ActionInvoker, ActionRegistry};
pub use execution::{EngineSettings, IntegrationEvent, ProjectScheduler, ServerEngine, TaskExecutor};
pub use persistence::{InMemoryPersistence, PersistenceBackend};
