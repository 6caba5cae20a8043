//! Scenarios: building and running a server from YAML

use cruise::core::config::ServerConfig;
use cruise::core::{IntegrationOutcome, IntegrationStatus, Located, ValidationLog};
use cruise::execution::ServerEngine;
use cruise::persistence::{InMemoryPersistence, PersistenceBackend};
use std::sync::Arc;

const SERVER: &str = r#"
name: Local
poll_interval_ms: 20
integration_timeout_secs: 5
children:
  - queue:
      name: Builds
      children:
        - project:
            name: Library
            tasks:
              - type: comment
                name: Announce
                message: Building the library
        - project:
            name: Application
            tasks:
              - type: sequence
                tasks:
                  - type: comment
                    message: compiling
                  - type: fail
                    message: tests failed
                    on_failure:
                      - type: log
                        message: notify the team
            triggers:
              - type: interval
                name: Hourly
                seconds: 3600
"#;

#[test]
fn test_config_builds_linked_tree() {
    let server = ServerConfig::from_yaml(SERVER).unwrap().build().unwrap();

    let mut log = ValidationLog::new();
    server.validate(&mut log);
    assert_eq!(log.number_of_errors(), 0);

    let library = server.find_project("library").unwrap();
    let host = library.host().expect("queued project has a host");
    assert_eq!(host.universal_name(), "urn:ccnet:Local:Builds");
    assert_eq!(library.server().unwrap().name(), "Local");

    assert!(matches!(
        server.locate("urn:ccnet:Local:Library:Announce"),
        Some(Located::Task(_))
    ));
    assert!(matches!(
        server.locate("urn:ccnet:Local:Application:Hourly"),
        Some(Located::Trigger(_))
    ));
}

#[tokio::test]
async fn test_integrate_every_project_once() {
    let config = ServerConfig::from_yaml(SERVER).unwrap();
    let server = config.build().unwrap();
    let store = Arc::new(InMemoryPersistence::new());
    let engine = ServerEngine::new(server, config.engine_settings())
        .unwrap()
        .with_persistence(store.clone());
    engine.validate().unwrap();

    let outcomes = engine.integrate_all_once("Command line").await.unwrap();
    let statuses: Vec<(String, IntegrationStatus)> = outcomes
        .iter()
        .map(|outcome| match outcome {
            IntegrationOutcome::Completed(summary) => (summary.project.clone(), summary.status),
            IntegrationOutcome::Abandoned => panic!("queue should admit every project"),
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("Library".to_string(), IntegrationStatus::Success),
            ("Application".to_string(), IntegrationStatus::Failure),
        ]
    );

    let mut projects = store.list_projects().await.unwrap();
    projects.sort();
    assert_eq!(projects, vec!["Application", "Library"]);
    let latest = store.latest_integration("Application").await.unwrap().unwrap();
    assert_eq!(latest.source_trigger, "Command line");
}

#[test]
fn test_invalid_yaml_is_rejected() {
    assert!(ServerConfig::from_yaml("children: [").is_err());
    assert!(ServerConfig::from_yaml("children: []").is_err());
}
