//! Task executor - walks a task tree for one integration

use crate::core::{
    context::TaskExecutionContext,
    error::{CruiseError, Result},
    state::IntegrationStatus,
    task::{Task, TaskRef},
};
use tracing::{debug, error, warn};

/// Result of executing one task and its follow-on tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The task ran and every follow-on task succeeded or was skipped
    Completed,
    /// The task's conditions did not pass
    Skipped,
    /// The task (or one below it) failed; the integration stops here
    Failed { task: String, error: String },
}

impl ExecutionResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, ExecutionResult::Failed { .. })
    }
}

/// Runs tasks depth first
///
/// For each task: check its conditions, skip it or start a child context,
/// run it and execute every follow-on task it yields. The first failure is
/// recorded on the context, the task's failure actions are applied and no
/// further tasks are started.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskExecutor;

impl TaskExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute `tasks` in order, stopping at the first failure
    pub fn run_tasks(&self, context: &TaskExecutionContext, tasks: &[TaskRef]) -> ExecutionResult {
        for task in tasks {
            let result = self.execute_task(context, task);
            if result.is_failed() {
                return result;
            }
        }
        ExecutionResult::Completed
    }

    /// Execute a single task and everything it yields
    pub fn execute_task(&self, context: &TaskExecutionContext, task: &TaskRef) -> ExecutionResult {
        match self.try_execute(context, task) {
            Ok(result) => result,
            Err(err) => self.fail(context, task, &err),
        }
    }

    fn try_execute(&self, context: &TaskExecutionContext, task: &TaskRef) -> Result<ExecutionResult> {
        if !task.can_run(context)? {
            debug!("Skipping task {}", task.name_or_type());
            task.skip(context)?;
            return Ok(ExecutionResult::Skipped);
        }

        debug!("Running task {}", task.name_or_type());
        let mut child_context = context.start_child(task);
        let result = self.run_follow_on(&child_context, task);
        child_context.complete();
        result
    }

    fn run_follow_on(&self, context: &TaskExecutionContext, task: &TaskRef) -> Result<ExecutionResult> {
        for next in task.run(context)? {
            let next = next?;
            task.adopt(&next)?;
            let result = self.execute_task(context, &next);
            if result.is_failed() {
                // Abandon the rest of the run; the parent never completes
                return Ok(result);
            }
        }
        Ok(ExecutionResult::Completed)
    }

    /// Record a failure that originated in `task`
    fn fail(&self, context: &TaskExecutionContext, task: &Task, err: &CruiseError) -> ExecutionResult {
        let name = task.name_or_type();
        error!("Task {} failed: {}", name, err);
        context.set_status(IntegrationStatus::Failure);
        context.add_entry_to_build_log(format!("Task '{}' failed: {}", name, err));

        let message = err.to_string();
        for action in task.failure_actions() {
            if let Err(action_err) = action.on_failure(&name, &message, context) {
                warn!(
                    "Failure action {} for task {} failed: {}",
                    action.type_name(),
                    name,
                    action_err
                );
            }
        }

        ExecutionResult::Failed {
            task: name,
            error: message,
        }
    }
}
