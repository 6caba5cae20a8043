//! Resolves remote calls against the entity tree

use crate::core::{CruiseError, Located, Project, Result, Server};
use crate::dispatch::{
    messages::{
        Blank, ForceBuildRequest, ForceBuildResponse, ItemList, ItemSummary, ProjectMessage,
        ProjectStatus, SingleValue,
    },
    registry::{ActionRegistry, RemoteActionDefinition},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Runs registered actions on items found by universal name
#[derive(Clone)]
pub struct ActionInvoker {
    server: Arc<Server>,
    registry: Arc<ActionRegistry>,
}

impl ActionInvoker {
    pub fn new(server: Arc<Server>, registry: Arc<ActionRegistry>) -> Self {
        Self { server, registry }
    }

    /// Invoker with only the built-in actions
    pub fn with_defaults(server: Arc<Server>) -> Self {
        Self::new(server, Arc::new(ActionRegistry::with_defaults()))
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run `action` on the item called `name`
    pub fn invoke(&self, name: &str, action: &str, message: Value) -> Result<Value> {
        let item = self.locate_item(name)?;
        let handler = self
            .registry
            .handler(item.kind(), action)
            .ok_or_else(|| action_not_found(&item, action))?;

        debug!("Invoking {} on {}", action, name);
        handler(&item, message)
    }

    /// Actions available on the item called `name`
    pub fn list(&self, name: &str) -> Result<Vec<RemoteActionDefinition>> {
        let item = self.locate_item(name)?;
        Ok(self.registry.actions_for(item.kind()))
    }

    /// Describe one action on the item called `name`
    pub fn query(&self, name: &str, action: &str) -> Result<RemoteActionDefinition> {
        let item = self.locate_item(name)?;
        self.registry
            .definition(item.kind(), action)
            .cloned()
            .ok_or_else(|| action_not_found(&item, action))
    }

    fn locate_item(&self, name: &str) -> Result<Located> {
        self.server
            .locate(name)
            .ok_or_else(|| CruiseError::ItemNotFound(name.to_string()))
    }
}

fn action_not_found(item: &Located, action: &str) -> CruiseError {
    CruiseError::ActionNotFound {
        item_type: item.item_type().to_string(),
        action: action.to_string(),
    }
}

/// The project behind a located item
pub fn expect_project(item: &Located) -> Result<&Arc<Project>> {
    match item {
        Located::Project(project) => Ok(project),
        other => Err(CruiseError::invalid_state(
            other.universal_name(),
            "item is not a project",
        )),
    }
}

fn expect_server(item: &Located) -> Result<&Arc<Server>> {
    match item {
        Located::Server(server) => Ok(server),
        other => Err(CruiseError::invalid_state(
            other.universal_name(),
            "item is not a server",
        )),
    }
}

impl ActionRegistry {
    /// Registry holding the built-in server and project actions
    pub fn with_defaults() -> Self {
        let mut registry = ActionRegistry::new();

        registry.register_typed(
            "Server",
            "ListProjects",
            "Lists all the projects on the server.",
            |item, _: Blank| {
                let server = expect_server(item)?;
                Ok(ItemList {
                    children: server
                        .projects()
                        .into_iter()
                        .map(|project| ItemSummary::from(&Located::Project(project)))
                        .collect(),
                })
            },
        );

        registry.register_typed(
            "Server",
            "ListChildren",
            "Lists the direct children of the server.",
            |item, _: Blank| {
                let server = expect_server(item)?;
                Ok(ItemList {
                    children: server
                        .children()
                        .iter()
                        .map(|child| ItemSummary {
                            name: child.name().to_string(),
                            item_type: match child {
                                crate::core::ServerItem::Project(_) => "Project",
                                crate::core::ServerItem::Queue(_) => "Queue",
                            }
                            .to_string(),
                            universal_name: child.universal_name(),
                        })
                        .collect(),
                })
            },
        );

        registry.register_typed(
            "Server",
            "GetVersion",
            "Retrieves the version of the server.",
            |_, _: Blank| {
                Ok(SingleValue {
                    value: env!("CARGO_PKG_VERSION").to_string(),
                })
            },
        );

        registry.register_typed(
            "Project",
            "Stop",
            "Stops a project if it is not already stopped.",
            |item, _: ProjectMessage| {
                let project = expect_project(item)?;
                // Same rule as server shutdown: a starting project may be stopped too
                if !project.request_stop() {
                    return Err(CruiseError::invalid_state(
                        project.name(),
                        "The project must be starting or running before it can be stopped",
                    ));
                }
                Ok(ProjectMessage {
                    project_name: Some(project.name().to_string()),
                })
            },
        );

        registry.register_typed(
            "Project",
            "ForceBuild",
            "Requests an integration on the next poll.",
            |item, input: ForceBuildRequest| {
                let project = expect_project(item)?;
                let request = project.force_build(input.source.unwrap_or_else(|| "Remote".to_string()));
                Ok(ForceBuildResponse {
                    project_name: project.name().to_string(),
                    request_id: request.id,
                    source_trigger: request.source_trigger,
                })
            },
        );

        registry.register_typed(
            "Project",
            "GetStatus",
            "Retrieves the state and last integration of a project.",
            |item, _: ProjectMessage| {
                let project = expect_project(item)?;
                Ok(ProjectStatus {
                    project_name: project.name().to_string(),
                    state: project.state(),
                    last_integration: project.last_integration(),
                })
            },
        );

        registry
    }
}
