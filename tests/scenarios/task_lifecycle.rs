//! Scenarios: task state machine and trigger caching

use crate::helpers::*;
use cruise::core::{Task, TaskExecutionContext, TaskState, Trigger, ValidationLog};
use std::sync::atomic::Ordering;

#[test]
fn test_can_run_stops_at_first_false_condition() {
    let log = call_log();
    let (first, first_calls) = CountingCondition::new(true);
    let (second, second_calls) = CountingCondition::new(false);
    let (third, third_calls) = CountingCondition::new(true);
    let task = Task::new(Recorder::new("A", &log))
        .with_condition(first)
        .with_condition(second)
        .with_condition(third);

    assert!(!task.can_run(&TaskExecutionContext::default()).unwrap());
    assert_eq!(task.state(), TaskState::CheckingConditions);
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    assert_eq!(third_calls.load(Ordering::SeqCst), 0);
}

/// Drive a fresh task into `state` through its public operations
fn task_in(state: TaskState) -> Task {
    let log = call_log();
    let task = Task::new(Recorder::new("T", &log));
    let context = TaskExecutionContext::default();
    match state {
        TaskState::Loaded => {}
        TaskState::Validated => task.validate(&mut ValidationLog::new()),
        TaskState::Pending => task.initialise().unwrap(),
        TaskState::CheckingConditions => {
            task.initialise().unwrap();
            task.can_run(&context).unwrap();
        }
        TaskState::Executing => {
            task.initialise().unwrap();
            // An abandoned run never completes
            drop(task.run(&context).unwrap());
        }
        TaskState::Completed => {
            task.initialise().unwrap();
            task.run(&context).unwrap().for_each(drop);
        }
        TaskState::Skipped => {
            task.initialise().unwrap();
            task.skip(&context).unwrap();
        }
        TaskState::Terminated => {
            task.initialise().unwrap();
            task.can_run(&context).unwrap();
            task.clean_up().unwrap();
        }
    }
    assert_eq!(task.state(), state);
    task
}

#[test]
fn test_clean_up_maps_interrupted_states() {
    let table = [
        (TaskState::Loaded, TaskState::Loaded),
        (TaskState::Validated, TaskState::Validated),
        (TaskState::Pending, TaskState::Skipped),
        (TaskState::CheckingConditions, TaskState::Terminated),
        (TaskState::Executing, TaskState::Terminated),
        (TaskState::Completed, TaskState::Completed),
        (TaskState::Skipped, TaskState::Skipped),
        (TaskState::Terminated, TaskState::Terminated),
    ];

    for (before, after) in table {
        let task = task_in(before);
        task.clean_up().unwrap();
        assert_eq!(task.state(), after, "clean up from {:?}", before);
    }
}

#[test]
fn test_clean_up_always_runs_hook() {
    let log = call_log();
    let task = Task::new(Recorder::new("T", &log));
    task.clean_up().unwrap();
    task.clean_up().unwrap();
    assert_eq!(calls(&log), vec!["T:clean_up", "T:clean_up"]);
}

#[test]
fn test_check_is_cached_until_reset() {
    let (policy, checks, resets) = CountingPolicy::new();
    let trigger = Trigger::new(policy).named("Every");

    let first = trigger.check().unwrap().unwrap();
    let second = trigger.check().unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(checks.load(Ordering::SeqCst), 1);
    assert!(trigger.has_pending());

    trigger.reset();
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert!(!trigger.has_pending());

    let third = trigger.check().unwrap().unwrap();
    assert_ne!(third.id, first.id);
    assert_eq!(third.source_trigger, "Every");
    assert_eq!(checks.load(Ordering::SeqCst), 2);
}

#[test]
fn test_initialise_resets_trigger() {
    let (policy, _checks, resets) = CountingPolicy::new();
    let trigger = Trigger::new(policy);
    trigger.initialise();
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}
