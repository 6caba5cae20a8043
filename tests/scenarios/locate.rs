//! Scenarios: resolving universal names against a server tree

use crate::helpers::*;
use cruise::core::{Located, Project, Queue, Server, Task, Trigger};
use std::sync::Arc;

fn server() -> Arc<Server> {
    let log = call_log();
    let (policy, _, _) = CountingPolicy::new();
    Server::new(
        "S1",
        vec![
            Project::builder("P1")
                .task(Task::new(Recorder::new("C", &log)).named("TaskC"))
                .trigger(Trigger::new(policy).named("Nightly"))
                .build()
                .into(),
            Queue::new(
                "Q1",
                vec![Project::builder("P2")
                    .task(Task::new(Recorder::new("D", &log)))
                    .build()
                    .into()],
            )
            .into(),
        ],
    )
}

fn universal_name(item: Option<Located>) -> Option<String> {
    item.map(|item| item.universal_name())
}

#[test]
fn test_locate_named_task() {
    let server = server();
    match server.locate("urn:ccnet:S1:P1:TaskC") {
        Some(Located::Task(task)) => {
            assert_eq!(task.name(), Some("TaskC"));
            assert_eq!(task.universal_name(), "urn:ccnet:S1:P1:TaskC");
        }
        other => panic!("Expected TaskC, got {:?}", universal_name(other)),
    }
}

#[test]
fn test_wrong_server_returns_nothing() {
    let server = server();
    assert!(server.locate("urn:ccnet:S2:P1:TaskC").is_none());
    assert!(server.locate("urn:other:S1").is_none());
}

#[test]
fn test_locate_ignores_case() {
    let server = server();
    assert!(matches!(
        server.locate("URN:CCNET:s1:p1:taskc"),
        Some(Located::Task(_))
    ));
    assert!(matches!(server.locate("urn:ccnet:s1"), Some(Located::Server(_))));
}

#[test]
fn test_locate_every_kind() {
    let server = server();
    assert_eq!(
        universal_name(server.locate("urn:ccnet:S1")),
        Some("urn:ccnet:S1".to_string())
    );
    assert!(matches!(server.locate("urn:ccnet:S1:P1"), Some(Located::Project(_))));
    assert!(matches!(server.locate("urn:ccnet:S1:Q1"), Some(Located::Queue(_))));
    assert!(matches!(
        server.locate("urn:ccnet:S1:P1:Nightly"),
        Some(Located::Trigger(_))
    ));

    // Unnamed tasks are addressed by their type name
    assert!(matches!(
        server.locate("urn:ccnet:S1:P2:Recorder"),
        Some(Located::Task(_))
    ));
}

#[test]
fn test_project_in_queue_is_also_found_below_queue() {
    let server = server();
    let direct = universal_name(server.locate("urn:ccnet:S1:P2"));
    let hosted = universal_name(server.locate("urn:ccnet:S1:Q1:P2"));
    assert_eq!(direct, Some("urn:ccnet:S1:P2".to_string()));
    assert_eq!(hosted, direct);
}

#[test]
fn test_misses_are_not_errors() {
    let server = server();
    assert!(server.locate("urn:ccnet:S1:P9").is_none());
    assert!(server.locate("urn:ccnet:S1:P1:TaskZ").is_none());
    assert!(server.locate("").is_none());
}

#[test]
fn test_non_ascii_names_match_ignoring_case() {
    let log = call_log();
    let server = Server::new(
        "Zürich",
        vec![Project::builder("Ünit")
            .task(Task::new(Recorder::new("E", &log)).named("Äpfel"))
            .build()
            .into()],
    );

    assert_eq!(
        universal_name(server.locate("urn:ccnet:ZÜRICH:ünit:äPFEL")),
        Some("urn:ccnet:Zürich:Ünit:Äpfel".to_string())
    );
    assert!(server.find_project("ÜNIT").is_some());
}
