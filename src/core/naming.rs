//! Universal names and resolution results
//!
//! Every entity in a validated configuration has a URN-style address such as
//! `urn:ccnet:Local:Project1:Compile`. Names are matched ignoring case,
//! character by character using Unicode lowercase mappings, so `Ünit` and
//! `ünit` are the same name. Mappings that change the character count
//! (such as `ß` and `SS`) are not folded.

use crate::core::{project::Project, queue::Queue, server::Server, task::TaskRef, trigger::Trigger};
use std::sync::Arc;

/// Prefix of every universal name
pub const URN_PREFIX: &str = "urn:ccnet:";

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// The rest of `name` after `prefix`, ignoring case
pub fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = name.chars();
    for expected in prefix.chars() {
        let actual = rest.next()?;
        if !chars_eq_ignore_case(actual, expected) {
            return None;
        }
    }
    Some(rest.as_str())
}

/// Check whether `name` starts with `prefix`, ignoring case
pub fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    strip_prefix_ignore_case(name, prefix).is_some()
}

/// Compare two names ignoring case
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    strip_prefix_ignore_case(a, b).is_some_and(str::is_empty)
}

/// The part of `name` below `scope`: empty for `scope` itself, else
/// starting with `:`. `None` when `name` is outside `scope`.
pub fn scope_remainder<'a>(name: &'a str, scope: &str) -> Option<&'a str> {
    strip_prefix_ignore_case(name, scope)
        .filter(|rest| rest.is_empty() || rest.starts_with(':'))
}

/// Check whether `name` is `scope` itself or an address below it
pub fn is_within(name: &str, scope: &str) -> bool {
    scope_remainder(name, scope).is_some()
}

/// Join a parent universal name and a child segment
pub fn child_name(parent: &str, segment: &str) -> String {
    if parent.ends_with(':') {
        format!("{}{}", parent, segment)
    } else {
        format!("{}:{}", parent, segment)
    }
}

/// A live entity found by `locate`
#[derive(Clone)]
pub enum Located {
    Server(Arc<Server>),
    Queue(Arc<Queue>),
    Project(Arc<Project>),
    Task(TaskRef),
    Trigger(Arc<Trigger>),
}

impl Located {
    /// Broad category used to key remote actions
    pub fn kind(&self) -> &'static str {
        match self {
            Located::Server(_) => "Server",
            Located::Queue(_) => "Queue",
            Located::Project(_) => "Project",
            Located::Task(_) => "Task",
            Located::Trigger(_) => "Trigger",
        }
    }

    /// Concrete type name of the entity
    pub fn item_type(&self) -> &'static str {
        match self {
            Located::Task(task) => task.type_name(),
            Located::Trigger(trigger) => trigger.type_name(),
            other => other.kind(),
        }
    }

    pub fn universal_name(&self) -> String {
        match self {
            Located::Server(server) => server.universal_name(),
            Located::Queue(queue) => queue.universal_name(),
            Located::Project(project) => project.universal_name(),
            Located::Task(task) => task.universal_name(),
            Located::Trigger(trigger) => trigger.universal_name(),
        }
    }
}

impl std::fmt::Debug for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.item_type(), self.universal_name())
    }
}
