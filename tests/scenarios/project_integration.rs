//! Scenarios: end-to-end integrations of a single project

use crate::helpers::*;
use cruise::builtins::{Comment, Fail, Sequence};
use cruise::core::{
    BuildLogKind, IntegrationHost, IntegrationOutcome, IntegrationRequest, IntegrationStatus,
    LogFailure, Project, StatusCondition, Task, TaskState, Trigger,
};
use cruise::execution::ProjectScheduler;
use cruise::persistence::{InMemoryPersistence, PersistenceBackend};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_project_without_host_integrates_directly() {
    let log = call_log();
    let (condition, condition_calls) = CountingCondition::new(true);
    let task = Task::new(Recorder::new("TaskA", &log))
        .with_condition(condition)
        .into_ref();
    let project = Project::builder("P1").task(task.clone()).build();
    assert!(project.host().is_none());
    assert_eq!(task.state(), TaskState::Loaded);

    let outcome = project.request_integration(&IntegrationRequest::new("test"));

    let summary = outcome.summary().expect("integration should run");
    assert_eq!(summary.status, IntegrationStatus::Success);
    assert_eq!(summary.project, "P1");
    assert_eq!(condition_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        calls(&log),
        vec!["TaskA:validate", "TaskA:initialise", "TaskA:run", "TaskA:clean_up"]
    );
    assert_eq!(task.state(), TaskState::Completed);
    assert_eq!(project.last_integration().as_ref(), Some(summary));
}

#[test]
fn test_silent_host_times_out_without_integrating() {
    let log = call_log();
    let project = Project::builder("P2")
        .task(Task::new(Recorder::new("TaskA", &log)))
        .integration_timeout(Duration::from_millis(50))
        .build();
    let host = Arc::new(SilentHost::default());
    let dyn_host: Arc<dyn IntegrationHost> = host.clone();
    project.set_host(Some(Arc::downgrade(&dyn_host)));

    let started = Instant::now();
    let outcome = project.request_integration(&IntegrationRequest::new("test"));

    assert_eq!(outcome, IntegrationOutcome::Abandoned);
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(calls(&log).is_empty());
    assert!(project.last_integration().is_none());

    // The abandoned context is cancelled so a late release cannot revive it
    let requests = host.requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_cancelled());
    assert!(requests[0].is_completed());
}

#[test]
fn test_failure_stops_integration_and_runs_failure_actions() {
    let project = Project::builder("Failing")
        .task(Task::new(Sequence::new(vec![
            Task::new(Comment::new("first")).into_ref(),
            Task::new(Fail::new("boom"))
                .with_failure_action(LogFailure {
                    message: "compile failed".to_string(),
                })
                .into_ref(),
            Task::new(Comment::new("never")).into_ref(),
        ])))
        .task(
            Task::new(Comment::new("only on failure")).with_condition(StatusCondition {
                value: IntegrationStatus::Failure,
            }),
        )
        .build();

    let outcome = project.request_integration(&IntegrationRequest::new("test"));
    let summary = outcome.summary().unwrap();
    assert_eq!(summary.status, IntegrationStatus::Failure);

    let messages: Vec<String> = project
        .last_build_log()
        .into_iter()
        .filter_map(|entry| match entry.kind {
            BuildLogKind::Entry { message } => Some(message),
            _ => None,
        })
        .collect();
    assert!(messages.iter().any(|message| message == "first"));
    assert!(messages.iter().any(|message| message.starts_with("compile failed")));
    assert!(!messages.iter().any(|message| message == "never"));

    let sequence = &project.tasks()[0];
    let children = sequence.children();
    assert_eq!(sequence.state(), TaskState::Terminated);
    assert_eq!(children[0].state(), TaskState::Completed);
    assert_eq!(children[2].state(), TaskState::Skipped);
    assert_eq!(project.tasks()[1].state(), TaskState::Skipped);
}

#[test]
fn test_second_integration_runs_from_clean_state() {
    let project = Project::builder("Twice")
        .task(Task::new(Comment::new("hello")))
        .build();

    let first = project.request_integration(&IntegrationRequest::new("one"));
    let second = project.request_integration(&IntegrationRequest::new("two"));

    let first = first.summary().unwrap();
    let second = second.summary().unwrap();
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(second.source_trigger, "two");
    assert_eq!(project.tasks()[0].state(), TaskState::Completed);
}

#[tokio::test]
async fn test_scheduler_turns_trigger_into_recorded_integration() {
    let log = call_log();
    let (policy, checks, resets) = CountingPolicy::new();
    let project = Project::builder("Polled")
        .task(Task::new(Recorder::new("polled", &log)))
        .trigger(Trigger::new(policy).named("Always"))
        .build();
    let store = Arc::new(InMemoryPersistence::new());
    let scheduler = ProjectScheduler::new(project.clone()).with_persistence(store.clone());

    let outcome = scheduler.poll_once().await.unwrap().unwrap();
    assert!(matches!(outcome, IntegrationOutcome::Completed(_)));
    assert_eq!(checks.load(Ordering::SeqCst), 1);
    assert_eq!(resets.load(Ordering::SeqCst), 1);

    let latest = store.latest_integration("Polled").await.unwrap().unwrap();
    assert_eq!(latest.source_trigger, "Always");
    assert_eq!(latest.status, IntegrationStatus::Success);
}

#[test]
fn test_run_time_tasks_are_initialised_and_cleaned_up() {
    let log = call_log();
    let recorder_log = log.clone();
    let (spawner, spawned) = Spawner::new(move || {
        vec![
            Task::new(Recorder::new("made", &recorder_log)).into_ref(),
            Task::new(Fail::new("boom")).named("Broken").into_ref(),
            Task::new(Recorder::new("unreached", &recorder_log)).into_ref(),
        ]
    });
    let project = Project::builder("Dynamic")
        .task(Task::new(spawner).named("Spawn"))
        .build();

    let outcome = project.request_integration(&IntegrationRequest::new("test"));
    assert_eq!(outcome.summary().unwrap().status, IntegrationStatus::Failure);

    let spawned = spawned.lock().clone();
    assert_eq!(project.tasks()[0].state(), TaskState::Terminated);
    assert_eq!(spawned[0].state(), TaskState::Completed);
    assert_eq!(spawned[1].state(), TaskState::Terminated);
    assert_eq!(spawned[1].universal_name(), "urn:ccnet:Dynamic:Spawn:Broken");
    // Follow-on tasks after the failure are never pulled from the run
    assert_eq!(spawned[2].state(), TaskState::Loaded);
    assert_eq!(
        calls(&log),
        vec!["made:validate", "made:initialise", "made:run", "made:clean_up"]
    );
}

#[test]
fn test_each_integration_adopts_its_own_run_time_tasks() {
    let log = call_log();
    let recorder_log = log.clone();
    let (spawner, spawned) =
        Spawner::new(move || vec![Task::new(Recorder::new("made", &recorder_log)).into_ref()]);
    let project = Project::builder("Twice").task(Task::new(spawner)).build();

    project.request_integration(&IntegrationRequest::new("one"));
    project.request_integration(&IntegrationRequest::new("two"));

    let spawned = spawned.lock().clone();
    assert_eq!(spawned.len(), 2);
    assert!(spawned
        .iter()
        .all(|task| task.state() == TaskState::Completed));
    // Two runs, each cleaned up exactly once
    let clean_ups = calls(&log)
        .iter()
        .filter(|call| call.ends_with("clean_up"))
        .count();
    assert_eq!(clean_ups, 2);
}
