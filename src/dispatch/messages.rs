//! Messages exchanged by remote actions

use crate::core::{IntegrationSummary, Located, ProjectState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input for actions that take no arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blank {}

/// Names a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMessage {
    #[serde(default)]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceBuildRequest {
    /// Who asked for the build; defaults to "Remote"
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceBuildResponse {
    pub project_name: String,
    pub request_id: Uuid,
    pub source_trigger: String,
}

/// A single string result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleValue {
    pub value: String,
}

/// Short description of an item in the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub name: String,
    pub item_type: String,
    pub universal_name: String,
}

impl From<&Located> for ItemSummary {
    fn from(item: &Located) -> Self {
        let universal_name = item.universal_name();
        let name = universal_name
            .rsplit(':')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            item_type: item.item_type().to_string(),
            universal_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemList {
    pub children: Vec<ItemSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project_name: String,
    pub state: ProjectState,
    pub last_integration: Option<IntegrationSummary>,
}
