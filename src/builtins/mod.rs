//! Task and trigger kinds that ship with the server

pub mod tasks;
pub mod triggers;

pub use tasks::{Comment, Fail, Sequence};
pub use triggers::IntervalTrigger;
