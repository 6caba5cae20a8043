//! Registry of remote actions keyed by item kind and action name

use crate::core::{CruiseError, Located, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler behind a remote action
pub type ActionHandler = Arc<dyn Fn(&Located, Value) -> Result<Value> + Send + Sync>;

/// Public description of a remote action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteActionDefinition {
    pub name: String,
    pub description: String,
    pub input_message: Option<String>,
    pub output_message: Option<String>,
}

struct RegisteredAction {
    definition: RemoteActionDefinition,
    handler: ActionHandler,
}

/// Maps `(item kind, action)` pairs to handlers; lookups ignore case
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<(String, String), RegisteredAction>,
    order: Vec<(String, String)>,
}

fn key(kind: &str, action: &str) -> (String, String) {
    (kind.to_ascii_lowercase(), action.to_ascii_lowercase())
}

/// Short type name without its module path
fn message_name<T>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler working on raw JSON
    pub fn register(&mut self, kind: &str, definition: RemoteActionDefinition, handler: ActionHandler) {
        let key = key(kind, &definition.name);
        if !self.actions.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.actions.insert(key, RegisteredAction { definition, handler });
    }

    /// Register a handler with typed input and output messages
    ///
    /// A `null` input decodes to the input message's default value.
    pub fn register_typed<I, O, F>(&mut self, kind: &str, name: &str, description: &str, handler: F)
    where
        I: DeserializeOwned + Default + 'static,
        O: Serialize + 'static,
        F: Fn(&Located, I) -> Result<O> + Send + Sync + 'static,
    {
        let definition = RemoteActionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_message: Some(message_name::<I>()),
            output_message: Some(message_name::<O>()),
        };
        let handler: ActionHandler = Arc::new(move |item, input| {
            let input = if input.is_null() {
                I::default()
            } else {
                serde_json::from_value(input)
                    .map_err(|err| CruiseError::InvalidMessage(err.to_string()))?
            };
            Ok(serde_json::to_value(handler(item, input)?)?)
        });
        self.register(kind, definition, handler);
    }

    pub fn definition(&self, kind: &str, action: &str) -> Option<&RemoteActionDefinition> {
        self.actions
            .get(&key(kind, action))
            .map(|action| &action.definition)
    }

    pub fn handler(&self, kind: &str, action: &str) -> Option<ActionHandler> {
        self.actions
            .get(&key(kind, action))
            .map(|action| action.handler.clone())
    }

    /// Actions available on an item kind, in registration order
    pub fn actions_for(&self, kind: &str) -> Vec<RemoteActionDefinition> {
        let kind = kind.to_ascii_lowercase();
        self.order
            .iter()
            .filter(|(registered, _)| *registered == kind)
            .filter_map(|key| self.actions.get(key))
            .map(|action| action.definition.clone())
            .collect()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.order)
            .finish()
    }
}
