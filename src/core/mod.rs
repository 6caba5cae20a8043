//! Core domain model for the integration server
//!
//! This module defines the entity tree (server, queues, projects, tasks and
//! triggers), the host handshake and the state machines that drive an
//! integration.

pub mod condition;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod integration;
pub mod item;
pub mod naming;
pub mod project;
pub mod queue;
pub mod server;
pub mod state;
pub mod task;
pub mod trigger;
pub mod validation;

pub use condition::*;
pub use context::*;
pub use environment::*;
pub use error::{CruiseError, Result};
pub use integration::*;
pub use item::*;
pub use naming::*;
pub use project::*;
pub use queue::Queue;
pub use server::Server;
pub use state::*;
pub use task::*;
pub use trigger::*;
pub use validation::*;
