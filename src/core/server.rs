//! The root of the entity tree

use crate::core::{
    item::ServerItem,
    naming::{child_name, eq_ignore_case, strip_prefix_ignore_case, Located, URN_PREFIX},
    project::Project,
    validation::ValidationLog,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Owns every queue and project of one integration server
pub struct Server {
    name: String,
    children: Vec<ServerItem>,
    me: Weak<Server>,
}

impl Server {
    /// Create a server and link every item below it back to the server
    pub fn new(name: impl Into<String>, children: Vec<ServerItem>) -> Arc<Self> {
        Arc::new_cyclic(|me| {
            for child in &children {
                child.attach_server(me);
            }
            Server {
                name: name.into(),
                children,
                me: me.clone(),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[ServerItem] {
        &self.children
    }

    pub fn universal_name(&self) -> String {
        child_name(URN_PREFIX, &self.name)
    }

    /// Every project on the server, queues flattened
    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.children.iter().flat_map(ServerItem::projects).collect()
    }

    pub fn find_project(&self, name: &str) -> Option<Arc<Project>> {
        self.projects()
            .into_iter()
            .find(|project| eq_ignore_case(project.name(), name))
    }

    /// Resolve a universal name to an item on this server
    ///
    /// Names addressed to another server resolve to `None` without looking
    /// at any children. Projects are searched before the direct children.
    pub fn locate(&self, name: &str) -> Option<Located> {
        let own = self.universal_name();
        let rest = strip_prefix_ignore_case(name, &own)?;
        if rest.is_empty() {
            return self.me.upgrade().map(Located::Server);
        }

        self.projects()
            .iter()
            .find_map(|project| project.locate(name))
            .or_else(|| self.children.iter().find_map(|child| child.locate(name)))
    }

    /// Check the whole tree, reporting into `log`
    pub fn validate(&self, log: &mut ValidationLog) {
        if self.name.trim().is_empty() {
            log.add_error("The Server has no name specified.");
        }

        for name in duplicates(self.children.iter().map(ServerItem::name)) {
            log.add_error(format!("Duplicate child name detected: '{}'", name));
        }

        let projects = self.projects();
        for name in duplicates(projects.iter().map(|project| project.name())) {
            log.add_error(format!("Duplicate project name detected: '{}'", name));
        }

        for child in &self.children {
            child.validate(log);
        }
    }
}

/// Names that occur more than once (ignoring case), in first-seen order
fn duplicates<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for name in names {
        let count = seen.entry(name.to_lowercase()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(name);
        }
    }
    order
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("children", &self.children)
            .finish()
    }
}
