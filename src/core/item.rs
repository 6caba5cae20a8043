//! Direct children of a server and the host seam they share

use crate::core::{
    integration::IntegrationContext, naming::Located, project::Project, queue::Queue,
    server::Server, validation::ValidationLog,
};
use std::sync::{Arc, Weak};

/// An item that mediates integration requests for the projects below it
///
/// Implementations must eventually call `release()` or `cancel()` on every
/// context they are asked about, either during the call or later from
/// another thread.
pub trait IntegrationHost: Send + Sync {
    fn ask_to_integrate(&self, context: IntegrationContext);

    fn universal_name(&self) -> String;
}

/// A child of a server or queue
#[derive(Debug, Clone)]
pub enum ServerItem {
    Project(Arc<Project>),
    Queue(Arc<Queue>),
}

impl ServerItem {
    pub fn name(&self) -> &str {
        match self {
            ServerItem::Project(project) => project.name(),
            ServerItem::Queue(queue) => queue.name(),
        }
    }

    pub fn universal_name(&self) -> String {
        match self {
            ServerItem::Project(project) => project.universal_name(),
            ServerItem::Queue(queue) => queue.universal_name(),
        }
    }

    /// Every project at or below this item
    pub fn projects(&self) -> Vec<Arc<Project>> {
        match self {
            ServerItem::Project(project) => vec![project.clone()],
            ServerItem::Queue(queue) => queue.projects(),
        }
    }

    pub fn locate(&self, name: &str) -> Option<Located> {
        match self {
            ServerItem::Project(project) => project.locate(name),
            ServerItem::Queue(queue) => queue.locate(name),
        }
    }

    pub fn validate(&self, log: &mut ValidationLog) {
        match self {
            ServerItem::Project(project) => project.validate(log),
            ServerItem::Queue(queue) => queue.validate(log),
        }
    }

    pub(crate) fn attach_host(&self, host: Option<Weak<dyn IntegrationHost>>) {
        match self {
            ServerItem::Project(project) => project.set_host(host),
            ServerItem::Queue(queue) => queue.set_host(host),
        }
    }

    pub(crate) fn attach_server(&self, server: &Weak<Server>) {
        match self {
            ServerItem::Project(project) => project.attach_server(server),
            ServerItem::Queue(queue) => queue.attach_server(server),
        }
    }
}

impl From<Arc<Project>> for ServerItem {
    fn from(project: Arc<Project>) -> Self {
        ServerItem::Project(project)
    }
}

impl From<Arc<Queue>> for ServerItem {
    fn from(queue: Arc<Queue>) -> Self {
        ServerItem::Queue(queue)
    }
}
