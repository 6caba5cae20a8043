//! Scenarios: queues hosting projects and other queues

use crate::helpers::*;
use cruise::builtins::Comment;
use cruise::core::{
    IntegrationContext, IntegrationHost, IntegrationOutcome, IntegrationRequest,
    IntegrationStatus, Project, Queue, Task, TaskState,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_queue_of_queues_admits_in_order() {
    let projects: Vec<Arc<Project>> = (0..6)
        .map(|index| Project::builder(format!("Project{}", index)).build())
        .collect();

    let queue1 = Queue::new("Queue1", vec![projects[0].clone().into(), projects[1].clone().into()]);
    let queue2 = Queue::new("Queue2", vec![projects[2].clone().into(), projects[3].clone().into()]);
    let queue3 = Queue::new("Queue3", vec![projects[4].clone().into(), projects[5].clone().into()]);
    let queue4 = Queue::with_allowed_active(
        "Queue4",
        2,
        vec![queue1.into(), queue2.into(), queue3.into()],
    );

    // Replay the asynchronous flow: every context that gets released is
    // completed in the order it was released
    let mut integrations = Vec::new();
    let mut completed: Vec<IntegrationContext> = Vec::new();
    let mut waiting: Vec<IntegrationContext> = Vec::new();
    for project in &projects {
        let context = IntegrationContext::new(project.name());
        context.lock();
        project
            .host()
            .expect("projects in a queue have a host")
            .ask_to_integrate(context.clone());
        if context.is_locked() {
            waiting.push(context);
        } else {
            integrations.push(context.item().to_string());
            completed.push(context);
        }
    }
    assert_eq!(integrations, vec!["Project0", "Project2"]);

    let mut index = 0;
    while index < completed.len() {
        completed[index].complete();
        index += 1;

        let (released, still_waiting): (Vec<_>, Vec<_>) =
            waiting.into_iter().partition(|context| !context.is_locked());
        waiting = still_waiting;
        for context in released {
            integrations.push(context.item().to_string());
            completed.push(context);
        }
    }

    assert!(waiting.is_empty());
    assert!(queue4.active_requests().is_empty());
    assert!(queue4.pending_requests().is_empty());
    assert_eq!(
        integrations,
        vec!["Project0", "Project2", "Project4", "Project1", "Project3", "Project5"]
    );
}

#[test]
fn test_queued_projects_integrate_one_at_a_time() {
    let log = call_log();
    let first = Project::builder("First")
        .task(Task::new(Recorder::new("first", &log)))
        .integration_timeout(Duration::from_secs(30))
        .build();
    let second = Project::builder("Second")
        .task(Task::new(Recorder::new("second", &log)))
        .integration_timeout(Duration::from_secs(30))
        .build();
    let queue = Queue::new("Builds", vec![first.clone().into(), second.clone().into()]);

    let handles: Vec<_> = [first.clone(), second.clone()]
        .into_iter()
        .map(|project| {
            thread::spawn(move || project.request_integration(&IntegrationRequest::new("test")))
        })
        .collect();

    for handle in handles {
        assert!(matches!(
            handle.join().unwrap(),
            IntegrationOutcome::Completed(_)
        ));
    }

    // Each integration ran start to finish before the other began
    let calls = calls(&log);
    let runs: Vec<&str> = calls
        .iter()
        .filter(|call| call.ends_with(":run") || call.ends_with(":clean_up"))
        .map(String::as_str)
        .collect();
    assert_eq!(runs.len(), 4);
    let owner = |call: &str| call.split(':').next().unwrap_or_default().to_string();
    assert_eq!(owner(runs[0]), owner(runs[1]));
    assert_eq!(owner(runs[2]), owner(runs[3]));

    assert!(queue.active_requests().is_empty());
    assert!(queue.pending_requests().is_empty());
}

#[test]
fn test_refusing_host_abandons_integration() {
    let log = call_log();
    let project = Project::builder("Refused")
        .task(Task::new(Recorder::new("refused", &log)))
        .build();
    let host: Arc<dyn cruise::core::IntegrationHost> = Arc::new(RefusingHost);
    project.set_host(Some(Arc::downgrade(&host)));

    let outcome = project.request_integration(&IntegrationRequest::new("test"));
    assert_eq!(outcome, IntegrationOutcome::Abandoned);
    assert!(calls(&log).is_empty());
    assert!(project.last_integration().is_none());
}

#[test]
fn test_panicking_integration_frees_its_queue_slot() {
    let broken = Project::builder("Broken")
        .task(Task::new(Panicking))
        .integration_timeout(Duration::from_secs(5))
        .build();
    let healthy = Project::builder("Healthy")
        .task(Task::new(Comment::new("fine")))
        .integration_timeout(Duration::from_millis(500))
        .build();
    let queue = Queue::new("Builds", vec![broken.clone().into(), healthy.clone().into()]);

    let outcome = broken.request_integration(&IntegrationRequest::new("test"));
    assert_eq!(outcome.summary().unwrap().status, IntegrationStatus::Error);
    assert_eq!(broken.tasks()[0].state(), TaskState::Terminated);
    assert!(queue.active_requests().is_empty());

    let outcome = healthy.request_integration(&IntegrationRequest::new("test"));
    assert_eq!(outcome.summary().unwrap().status, IntegrationStatus::Success);
}

#[test]
fn test_slot_is_freed_when_the_caller_unwinds() {
    let project = Project::builder("Observed")
        .task(Task::new(Comment::new("fine")))
        .build();
    let queue = Queue::new("Builds", vec![project.clone().into()]);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        project.request_integration_with(&IntegrationRequest::new("test"), || {
            panic!("observer failed")
        })
    }));

    assert!(result.is_err());
    assert!(queue.active_requests().is_empty());
    assert!(queue.pending_requests().is_empty());
}

#[test]
fn test_abandoned_request_leaves_the_queue() {
    let waiting = Project::builder("Waiting")
        .task(Task::new(Comment::new("never")))
        .integration_timeout(Duration::from_millis(50))
        .build();
    let queue = Queue::new("Builds", vec![waiting.clone().into()]);

    // Something else holds the only slot
    let holder = IntegrationContext::new("urn:ccnet:Holder");
    holder.lock();
    queue.ask_to_integrate(holder.clone());
    assert!(holder.wait(Duration::ZERO));

    let outcome = waiting.request_integration(&IntegrationRequest::new("test"));
    assert_eq!(outcome, IntegrationOutcome::Abandoned);
    assert!(queue.pending_requests().is_empty());
    assert_eq!(queue.active_requests().len(), 1);

    holder.complete();
    assert!(queue.active_requests().is_empty());
}
