//! Test utility functions for cruise scenarios

#![allow(dead_code)]

use cruise::core::{
    no_children, ChildTasks, IntegrationContext, IntegrationHost, IntegrationRequest, Result,
    TaskBehaviour, TaskCondition, TaskExecutionContext, TaskRef, TriggerPolicy, ValidationLog,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared list of hook calls, in call order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().clone()
}

/// Task behaviour recording every hook it sees
pub struct Recorder {
    label: String,
    log: CallLog,
}

impl Recorder {
    pub fn new(label: impl Into<String>, log: &CallLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
        }
    }

    fn record(&self, hook: &str) {
        self.log.lock().push(format!("{}:{}", self.label, hook));
    }
}

impl TaskBehaviour for Recorder {
    fn type_name(&self) -> &'static str {
        "Recorder"
    }

    fn on_validate(&self, _log: &mut ValidationLog) {
        self.record("validate");
    }

    fn on_initialise(&mut self) -> Result<()> {
        self.record("initialise");
        Ok(())
    }

    fn on_run(&mut self, context: &TaskExecutionContext) -> Result<ChildTasks> {
        self.record("run");
        context.add_entry_to_build_log(format!("{} ran", self.label));
        Ok(no_children())
    }

    fn on_skip(&mut self, _context: &TaskExecutionContext) -> Result<()> {
        self.record("skip");
        Ok(())
    }

    fn on_clean_up(&mut self) -> Result<()> {
        self.record("clean_up");
        Ok(())
    }
}

/// Task behaviour that creates fresh follow-on tasks every time it runs
pub struct Spawner {
    make: Box<dyn FnMut() -> Vec<TaskRef> + Send>,
    spawned: Arc<Mutex<Vec<TaskRef>>>,
}

impl Spawner {
    pub fn new(
        make: impl FnMut() -> Vec<TaskRef> + Send + 'static,
    ) -> (Self, Arc<Mutex<Vec<TaskRef>>>) {
        let spawned = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                make: Box::new(make),
                spawned: spawned.clone(),
            },
            spawned,
        )
    }
}

impl TaskBehaviour for Spawner {
    fn type_name(&self) -> &'static str {
        "Spawner"
    }

    fn on_run(&mut self, _context: &TaskExecutionContext) -> Result<ChildTasks> {
        let tasks = (self.make)();
        self.spawned.lock().extend(tasks.iter().cloned());
        Ok(Box::new(tasks.into_iter().map(Ok)))
    }
}

/// Task behaviour that panics when run
pub struct Panicking;

impl TaskBehaviour for Panicking {
    fn type_name(&self) -> &'static str {
        "Panicking"
    }

    fn on_run(&mut self, _context: &TaskExecutionContext) -> Result<ChildTasks> {
        panic!("task exploded")
    }
}

/// Condition returning a fixed answer and counting evaluations
pub struct CountingCondition {
    result: bool,
    calls: Arc<AtomicUsize>,
}

impl CountingCondition {
    pub fn new(result: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                result,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl TaskCondition for CountingCondition {
    fn type_name(&self) -> &'static str {
        "CountingCondition"
    }

    fn evaluate(&self, _context: &TaskExecutionContext) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }
}

/// Trigger policy that fires on every check and counts how often it was asked
pub struct CountingPolicy {
    pub checks: Arc<AtomicUsize>,
    pub resets: Arc<AtomicUsize>,
}

impl CountingPolicy {
    pub fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let checks = Arc::new(AtomicUsize::new(0));
        let resets = Arc::new(AtomicUsize::new(0));
        (
            Self {
                checks: checks.clone(),
                resets: resets.clone(),
            },
            checks,
            resets,
        )
    }
}

impl TriggerPolicy for CountingPolicy {
    fn type_name(&self) -> &'static str {
        "CountingPolicy"
    }

    fn on_check(&mut self, source: &str) -> Result<Option<IntegrationRequest>> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(Some(IntegrationRequest::new(source)))
    }

    fn on_reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Host that keeps every request and never answers
#[derive(Default)]
pub struct SilentHost {
    pub requests: Mutex<Vec<IntegrationContext>>,
}

impl IntegrationHost for SilentHost {
    fn ask_to_integrate(&self, context: IntegrationContext) {
        context.lock();
        self.requests.lock().push(context);
    }

    fn universal_name(&self) -> String {
        "urn:ccnet:Silent".to_string()
    }
}

/// Host that refuses every request
#[derive(Default)]
pub struct RefusingHost;

impl IntegrationHost for RefusingHost {
    fn ask_to_integrate(&self, context: IntegrationContext) {
        context.cancel();
    }

    fn universal_name(&self) -> String {
        "urn:ccnet:Refusing".to_string()
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
