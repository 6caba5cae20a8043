//! Built-in task kinds

use crate::core::{
    context::TaskExecutionContext,
    error::{CruiseError, Result},
    task::{no_children, ChildTasks, TaskBehaviour, TaskRef},
    validation::ValidationLog,
};

/// Writes a message to the build log
#[derive(Debug, Clone)]
pub struct Comment {
    pub message: String,
}

impl Comment {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TaskBehaviour for Comment {
    fn type_name(&self) -> &'static str {
        "Comment"
    }

    fn on_validate(&self, log: &mut ValidationLog) {
        if self.message.is_empty() {
            log.add_warning("Comment has no message.");
        }
    }

    fn on_run(&mut self, context: &TaskExecutionContext) -> Result<ChildTasks> {
        context.add_entry_to_build_log(self.message.clone());
        Ok(no_children())
    }
}

/// Runs its tasks in order as follow-on tasks
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    tasks: Vec<TaskRef>,
}

impl Sequence {
    pub fn new(tasks: Vec<TaskRef>) -> Self {
        Self { tasks }
    }
}

impl TaskBehaviour for Sequence {
    fn type_name(&self) -> &'static str {
        "Sequence"
    }

    fn children(&self) -> Vec<TaskRef> {
        self.tasks.clone()
    }

    fn on_validate(&self, log: &mut ValidationLog) {
        if self.tasks.is_empty() {
            log.add_warning("Sequence has no tasks.");
        }
    }

    fn on_run(&mut self, _context: &TaskExecutionContext) -> Result<ChildTasks> {
        Ok(Box::new(self.tasks.clone().into_iter().map(Ok)))
    }
}

/// Always fails with the configured message
#[derive(Debug, Clone)]
pub struct Fail {
    pub message: String,
}

impl Fail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TaskBehaviour for Fail {
    fn type_name(&self) -> &'static str {
        "Fail"
    }

    fn on_run(&mut self, _context: &TaskExecutionContext) -> Result<ChildTasks> {
        Err(CruiseError::task("Fail", self.message.clone()))
    }
}
