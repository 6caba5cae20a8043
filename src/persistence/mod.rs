//! Persistence layer for integration history and project state

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStateStore;

pub use crate::core::{IntegrationStatus, IntegrationSummary, PersistedProjectState};
use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Record a finished integration
    async fn save_integration(&self, summary: &IntegrationSummary) -> Result<()>;

    /// Integrations of a project, newest first
    async fn list_integrations(&self, project: &str) -> Result<Vec<IntegrationSummary>>;

    /// Most recent integration of a project
    async fn latest_integration(&self, project: &str) -> Result<Option<IntegrationSummary>>;

    /// Names of every project with recorded history or state
    async fn list_projects(&self) -> Result<Vec<String>>;

    async fn load_project_state(&self, project: &str) -> Result<Option<PersistedProjectState>>;

    async fn save_project_state(&self, project: &str, state: &PersistedProjectState) -> Result<()>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    integrations: RwLock<HashMap<String, Vec<IntegrationSummary>>>,
    states: RwLock<HashMap<String, PersistedProjectState>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_integration(&self, summary: &IntegrationSummary) -> Result<()> {
        let mut integrations = self.integrations.write().await;
        integrations
            .entry(summary.project.clone())
            .or_default()
            .push(summary.clone());
        Ok(())
    }

    async fn list_integrations(&self, project: &str) -> Result<Vec<IntegrationSummary>> {
        let integrations = self.integrations.read().await;
        let mut result = integrations.get(project).cloned().unwrap_or_default();
        result.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(result)
    }

    async fn latest_integration(&self, project: &str) -> Result<Option<IntegrationSummary>> {
        Ok(self.list_integrations(project).await?.into_iter().next())
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let integrations = self.integrations.read().await;
        let states = self.states.read().await;
        let mut names: Vec<String> = integrations.keys().chain(states.keys()).cloned().collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn load_project_state(&self, project: &str) -> Result<Option<PersistedProjectState>> {
        Ok(self.states.read().await.get(project).cloned())
    }

    async fn save_project_state(&self, project: &str, state: &PersistedProjectState) -> Result<()> {
        self.states
            .write()
            .await
            .insert(project.to_string(), state.clone());
        Ok(())
    }
}
