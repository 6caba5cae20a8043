//! Task domain model and its execution state machine
//!
//! A [`Task`] wraps a [`TaskBehaviour`] (the concrete work) with the pieces
//! every task shares: a name, gating conditions, failure actions and a
//! [`TaskState`]. The state only moves along these transitions:
//!
//! ```text
//! Loaded -> Validated -> Pending -> CheckingConditions -> Executing -> Completed
//!                        Pending -> Skipped
//! clean_up: Pending -> Skipped, CheckingConditions | Executing -> Terminated
//! ```

use crate::core::{
    condition::{TaskCondition, TaskFailureAction},
    context::TaskExecutionContext,
    error::Result,
    naming::{child_name, scope_remainder, Located, URN_PREFIX},
    project::Project,
    state::TaskState,
    validation::ValidationLog,
};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Shared handle to a task in the tree
pub type TaskRef = Arc<Task>;

/// Lazily produced follow-on tasks returned by a run
pub type ChildTasks = Box<dyn Iterator<Item = Result<TaskRef>> + Send>;

/// An empty follow-on sequence
pub fn no_children() -> ChildTasks {
    Box::new(std::iter::empty())
}

/// AND over the conditions in declared order, stopping at the first `false`
pub fn evaluate_all(
    conditions: &[Box<dyn TaskCondition>],
    context: &TaskExecutionContext,
) -> Result<bool> {
    for condition in conditions {
        if !condition.evaluate(context)? {
            debug!("Condition {} failed", condition.type_name());
            return Ok(false);
        }
    }
    Ok(true)
}

/// The concrete work of a task
///
/// Only `type_name` and `on_run` are required; the remaining hooks default
/// to doing nothing.
pub trait TaskBehaviour: Send {
    fn type_name(&self) -> &'static str;

    /// Statically declared sub-tasks (validated, initialised and cleaned up with this task)
    fn children(&self) -> Vec<TaskRef> {
        Vec::new()
    }

    fn on_validate(&self, _log: &mut ValidationLog) {}

    fn on_initialise(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_can_run(
        &self,
        conditions: &[Box<dyn TaskCondition>],
        context: &TaskExecutionContext,
    ) -> Result<bool> {
        evaluate_all(conditions, context)
    }

    /// Do the work and return the tasks to run next
    fn on_run(&mut self, context: &TaskExecutionContext) -> Result<ChildTasks>;

    fn on_skip(&mut self, _context: &TaskExecutionContext) -> Result<()> {
        Ok(())
    }

    fn on_clean_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A single step in a project's build pipeline
pub struct Task {
    name: Option<String>,
    type_name: &'static str,
    conditions: Vec<Box<dyn TaskCondition>>,
    failure_actions: Vec<Box<dyn TaskFailureAction>>,
    state: Mutex<TaskState>,
    behaviour: Mutex<Box<dyn TaskBehaviour>>,
    project: RwLock<Weak<Project>>,
    parent: RwLock<Weak<Task>>,
    /// Tasks created while this task ran, cleaned up with it
    yielded: Mutex<Vec<TaskRef>>,
}

impl Task {
    /// Create an unnamed task in the `Loaded` state
    pub fn new<B: TaskBehaviour + 'static>(behaviour: B) -> Self {
        Self {
            name: None,
            type_name: behaviour.type_name(),
            conditions: Vec::new(),
            failure_actions: Vec::new(),
            state: Mutex::new(TaskState::Loaded),
            behaviour: Mutex::new(Box::new(behaviour)),
            project: RwLock::new(Weak::new()),
            parent: RwLock::new(Weak::new()),
            yielded: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    pub fn with_condition<C: TaskCondition + 'static>(mut self, condition: C) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    pub fn with_failure_action<A: TaskFailureAction + 'static>(mut self, action: A) -> Self {
        self.failure_actions.push(Box::new(action));
        self
    }

    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The name if set, else the type name
    pub fn name_or_type(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.type_name.to_string())
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub fn conditions(&self) -> &[Box<dyn TaskCondition>] {
        &self.conditions
    }

    pub fn failure_actions(&self) -> &[Box<dyn TaskFailureAction>] {
        &self.failure_actions
    }

    /// Statically declared sub-tasks
    pub fn children(&self) -> Vec<TaskRef> {
        self.behaviour.lock().children()
    }

    pub fn project(&self) -> Option<Arc<Project>> {
        self.project.read().upgrade()
    }

    pub fn parent(&self) -> Option<TaskRef> {
        self.parent.read().upgrade()
    }

    /// Parent's universal name plus this task's name (or type)
    pub fn universal_name(&self) -> String {
        let parent = match self.parent() {
            Some(parent) => parent.universal_name(),
            None => match self.project() {
                Some(project) => project.universal_name(),
                None => URN_PREFIX.to_string(),
            },
        };
        child_name(&parent, &self.name_or_type())
    }

    /// Link this task (and its declared sub-tasks) to the owning project
    pub(crate) fn attach(self: &Arc<Self>, project: &Weak<Project>) {
        *self.project.write() = project.clone();
        for child in self.children() {
            *child.parent.write() = Arc::downgrade(self);
            child.attach(project);
        }
    }

    /// Resolve a universal name to this task or one of its sub-tasks
    pub fn locate(self: &Arc<Self>, name: &str) -> Option<Located> {
        let own = self.universal_name();
        let rest = scope_remainder(name, &own)?;
        if rest.is_empty() {
            return Some(Located::Task(self.clone()));
        }
        self.children().iter().find_map(|child| child.locate(name))
    }

    /// Check the configuration; reports problems to the log and never fails
    pub fn validate(&self, log: &mut ValidationLog) {
        for condition in &self.conditions {
            condition.validate(log);
        }
        for action in &self.failure_actions {
            action.validate(log);
        }
        for child in self.children() {
            child.validate(log);
        }
        self.behaviour.lock().on_validate(log);
        self.set_state(TaskState::Validated);
    }

    /// Prepare for a new integration
    pub fn initialise(&self) -> Result<()> {
        self.yielded.lock().clear();
        self.set_state(TaskState::Pending);
        self.behaviour.lock().on_initialise()?;
        for child in self.children() {
            child.initialise()?;
        }
        Ok(())
    }

    /// Evaluate the gating conditions
    pub fn can_run(&self, context: &TaskExecutionContext) -> Result<bool> {
        self.set_state(TaskState::CheckingConditions);
        self.behaviour.lock().on_can_run(&self.conditions, context)
    }

    /// Execute the task.
    ///
    /// The returned iterator yields follow-on tasks; the task only reaches
    /// `Completed` once the iterator has been drained.
    pub fn run(&self, context: &TaskExecutionContext) -> Result<TaskRun<'_>> {
        self.set_state(TaskState::Executing);
        let children = self.behaviour.lock().on_run(context)?;
        Ok(TaskRun {
            task: self,
            children,
            finished: false,
        })
    }

    /// Mark the task as not run
    pub fn skip(&self, context: &TaskExecutionContext) -> Result<()> {
        self.set_state(TaskState::Skipped);
        self.behaviour.lock().on_skip(context)
    }

    /// Recover after an integration, marking interrupted tasks
    ///
    /// Sub-tasks are cleaned up even when this task's hook fails; the first
    /// error is returned.
    pub fn clean_up(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            *state = state.after_interruption();
        }
        let mut result = self.behaviour.lock().on_clean_up();
        let yielded = std::mem::take(&mut *self.yielded.lock());
        for child in self.children().into_iter().chain(yielded) {
            let child_result = child.clean_up();
            if result.is_ok() {
                result = child_result;
            }
        }
        result
    }

    /// Take charge of a follow-on task yielded by this task's run
    ///
    /// A task created at run time is linked below this task, validated and
    /// initialised when still `Loaded`, and cleaned up together with this
    /// task. Declared sub-tasks are left alone.
    pub fn adopt(self: &Arc<Self>, child: &TaskRef) -> Result<()> {
        if self.children().iter().any(|known| Arc::ptr_eq(known, child)) {
            return Ok(());
        }

        if child.parent().is_none() {
            *child.parent.write() = Arc::downgrade(self);
            let project = self.project.read().clone();
            child.attach(&project);
        }
        {
            let mut yielded = self.yielded.lock();
            if !yielded.iter().any(|known| Arc::ptr_eq(known, child)) {
                yielded.push(child.clone());
            }
        }

        if child.state() == TaskState::Loaded {
            let mut log = ValidationLog::new();
            child.validate(&mut log);
            for entry in log.entries() {
                warn!("Validation problem in {}: {}", child.name_or_type(), entry.message);
            }
            child.initialise()?;
        }
        Ok(())
    }

    fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("state", &self.state())
            .finish()
    }
}

/// Follow-on tasks of a running task
///
/// Drives the `Executing -> Completed` transition when exhausted. An error
/// ends the sequence and leaves the task `Executing`.
pub struct TaskRun<'a> {
    task: &'a Task,
    children: ChildTasks,
    finished: bool,
}

impl std::fmt::Debug for TaskRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRun")
            .field("task", &self.task.name_or_type())
            .field("finished", &self.finished)
            .finish()
    }
}

impl Iterator for TaskRun<'_> {
    type Item = Result<TaskRef>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.children.next() {
            Some(Ok(child)) => Some(Ok(child)),
            Some(Err(error)) => {
                self.finished = true;
                Some(Err(error))
            }
            None => {
                self.finished = true;
                self.task.set_state(TaskState::Completed);
                None
            }
        }
    }
}
