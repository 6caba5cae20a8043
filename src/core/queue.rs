//! Queues limit how many of their projects may integrate at once
//!
//! A queue is an [`IntegrationHost`]: the projects (and nested queues) below
//! it ask it for permission. Requests beyond `allowed_active` are held
//! locked in arrival order and admitted as earlier integrations complete.
//! Admission is forwarded to the queue's own host when it has one, so
//! queues nest.

use crate::core::{
    integration::IntegrationContext,
    item::{IntegrationHost, ServerItem},
    naming::{child_name, eq_ignore_case, Located, URN_PREFIX},
    project::Project,
    server::Server,
    validation::ValidationLog,
};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Default)]
struct Requests {
    active: Vec<IntegrationContext>,
    pending: VecDeque<IntegrationContext>,
}

/// A host that admits a bounded number of integrations at a time
pub struct Queue {
    name: String,
    allowed_active: usize,
    children: Vec<ServerItem>,
    requests: Mutex<Requests>,
    host: RwLock<Option<Weak<dyn IntegrationHost>>>,
    server: RwLock<Weak<Server>>,
    me: Weak<Queue>,
}

impl Queue {
    /// A queue that runs one integration at a time
    pub fn new(name: impl Into<String>, children: Vec<ServerItem>) -> Arc<Self> {
        Self::with_allowed_active(name, 1, children)
    }

    pub fn with_allowed_active(
        name: impl Into<String>,
        allowed_active: usize,
        children: Vec<ServerItem>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Queue>| {
            let host: Weak<dyn IntegrationHost> = me.clone();
            for child in &children {
                child.attach_host(Some(host.clone()));
            }

            Queue {
                name: name.into(),
                allowed_active,
                children,
                requests: Mutex::new(Requests::default()),
                host: RwLock::new(None),
                server: RwLock::new(Weak::new()),
                me: me.clone(),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_active(&self) -> usize {
        self.allowed_active
    }

    pub fn children(&self) -> &[ServerItem] {
        &self.children
    }

    pub fn host(&self) -> Option<Arc<dyn IntegrationHost>> {
        self.host.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_host(&self, host: Option<Weak<dyn IntegrationHost>>) {
        *self.host.write() = host;
    }

    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.read().upgrade()
    }

    pub(crate) fn attach_server(&self, server: &Weak<Server>) {
        *self.server.write() = server.clone();
        for child in &self.children {
            child.attach_server(server);
        }
    }

    pub fn universal_name(&self) -> String {
        let parent = self
            .server()
            .map(|server| server.universal_name())
            .unwrap_or_else(|| URN_PREFIX.to_string());
        child_name(&parent, &self.name)
    }

    /// Every project below this queue, nested queues included
    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.children.iter().flat_map(ServerItem::projects).collect()
    }

    pub fn locate(&self, name: &str) -> Option<Located> {
        if eq_ignore_case(&self.universal_name(), name) {
            return self.me.upgrade().map(Located::Queue);
        }
        self.children.iter().find_map(|child| child.locate(name))
    }

    pub fn validate(&self, log: &mut ValidationLog) {
        if self.name.trim().is_empty() {
            log.add_error("The Queue has no name specified.");
        }
        if self.allowed_active == 0 {
            log.add_error(format!(
                "Queue '{}' must allow at least one active request.",
                self.name
            ));
        }
        for child in &self.children {
            child.validate(log);
        }
    }

    /// Requests currently allowed to integrate
    pub fn active_requests(&self) -> Vec<IntegrationContext> {
        self.requests.lock().active.clone()
    }

    /// Requests waiting for a free slot, oldest first
    pub fn pending_requests(&self) -> Vec<IntegrationContext> {
        self.requests.lock().pending.iter().cloned().collect()
    }

    fn admit(&self, context: IntegrationContext) {
        match self.host() {
            Some(host) => host.ask_to_integrate(context),
            None => context.release(),
        }
    }

    fn complete_request(&self, context: &IntegrationContext) {
        let promoted = {
            let mut requests = self.requests.lock();
            requests.active.retain(|active| !active.same_as(context));
            requests.pending.retain(|pending| !pending.same_as(context));

            let mut promoted = Vec::new();
            while requests.active.len() < self.allowed_active.max(1) {
                let Some(next) = requests.pending.pop_front() else {
                    break;
                };
                if next.is_cancelled() {
                    continue;
                }
                requests.active.push(next.clone());
                promoted.push(next);
            }
            promoted
        };

        for next in promoted {
            debug!("Queue '{}' admitting '{}'", self.name, next.item());
            self.admit(next);
        }
    }
}

impl IntegrationHost for Queue {
    fn ask_to_integrate(&self, context: IntegrationContext) {
        let queue = self.me.clone();
        context.on_completed(move |completed| {
            if let Some(queue) = queue.upgrade() {
                queue.complete_request(completed);
            }
        });

        let admitted = {
            let mut requests = self.requests.lock();
            if requests.active.len() < self.allowed_active.max(1) {
                requests.active.push(context.clone());
                true
            } else {
                context.lock();
                requests.pending.push_back(context.clone());
                false
            }
        };

        if admitted {
            debug!("Queue '{}' admitting '{}'", self.name, context.item());
            self.admit(context);
        } else {
            debug!("Queue '{}' holding '{}'", self.name, context.item());
        }
    }

    fn universal_name(&self) -> String {
        Queue::universal_name(self)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("allowed_active", &self.allowed_active)
            .field("children", &self.children)
            .finish()
    }
}
