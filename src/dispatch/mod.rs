//! Remote action dispatch
//!
//! Remote callers address an item by universal name and name an action to
//! run on it. Actions are registered per item kind in an [`ActionRegistry`]
//! and exchange JSON-encoded messages.

pub mod invoker;
pub mod messages;
pub mod registry;

pub use invoker::{expect_project, ActionInvoker};
pub use messages::*;
pub use registry::{ActionHandler, ActionRegistry, RemoteActionDefinition};
