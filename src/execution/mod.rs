//! Integration execution: walking task trees, polling projects and running the server

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EngineSettings, EventBus, IntegrationEvent, ServerEngine};
pub use executor::{ExecutionResult, TaskExecutor};
pub use scheduler::{ProjectScheduler, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
