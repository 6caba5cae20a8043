//! Scenario-based tests for cruise

mod helpers;

mod config_loading;
mod host_handshake;
mod locate;
mod nested_queues;
mod project_integration;
mod task_lifecycle;
