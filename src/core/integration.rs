//! Integration requests and the permission handshake between a project and its host
//!
//! A project that shares build capacity with others asks its host for
//! permission before integrating. The host answers through an
//! [`IntegrationContext`]: it may release the context straight away, hold it
//! locked until capacity frees up on another thread, or cancel it outright.
//! The requester blocks in [`IntegrationContext::wait`] for a bounded time.

use crate::core::state::IntegrationStatus;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One request to integrate a project, raised by a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRequest {
    /// Unique request ID
    pub id: Uuid,

    /// When the request was raised
    pub time: DateTime<Utc>,

    /// Name of the trigger (or remote caller) that raised it
    pub source_trigger: String,
}

impl IntegrationRequest {
    pub fn new(source_trigger: impl Into<String>) -> Self {
        Self::at(source_trigger, Utc::now())
    }

    pub fn at(source_trigger: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            source_trigger: source_trigger.into(),
        }
    }
}

/// Record of one finished integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSummary {
    /// ID of the request that started the integration
    pub request_id: Uuid,

    pub project: String,

    pub build_name: String,

    pub source_trigger: String,

    pub start_time: DateTime<Utc>,

    pub finish_time: DateTime<Utc>,

    pub status: IntegrationStatus,
}

impl IntegrationSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finish_time - self.start_time
    }
}

/// Project state kept across restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedProjectState {
    pub last_integration: Option<IntegrationSummary>,

    /// Free-form name/value pairs
    #[serde(default)]
    pub values: HashMap<String, String>,
}

/// Callback fired when an integration completes
pub type CompletionHandler = Box<dyn FnOnce(&IntegrationContext) + Send>;

#[derive(Debug, Default)]
struct Signal {
    locked: bool,
    cancelled: bool,
}

struct ContextInner {
    item: String,
    signal: Mutex<Signal>,
    condvar: Condvar,
    completion: Mutex<Completion>,
}

#[derive(Default)]
struct Completion {
    completed: bool,
    handlers: Vec<CompletionHandler>,
}

/// Per-attempt handshake between a requesting project and its host
///
/// Cloning yields another handle to the same handshake.
#[derive(Clone)]
pub struct IntegrationContext {
    inner: Arc<ContextInner>,
}

impl IntegrationContext {
    /// Create an unlocked, uncancelled context for the named item
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                item: item.into(),
                signal: Mutex::new(Signal::default()),
                condvar: Condvar::new(),
                completion: Mutex::new(Completion::default()),
            }),
        }
    }

    /// Name of the item asking to integrate
    pub fn item(&self) -> &str {
        &self.inner.item
    }

    /// Make subsequent waits block until released or cancelled
    pub fn lock(&self) {
        self.inner.signal.lock().locked = true;
    }

    /// Unlock and wake every waiter. Safe to call repeatedly.
    pub fn release(&self) {
        let mut signal = self.inner.signal.lock();
        signal.locked = false;
        self.inner.condvar.notify_all();
    }

    /// Refuse the integration permanently and wake every waiter
    pub fn cancel(&self) {
        self.inner.signal.lock().cancelled = true;
        self.release();
    }

    /// Block until the context is released, cancelled or `timeout` elapses.
    ///
    /// Returns `true` only when the context is unlocked and has never been
    /// cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut signal = self.inner.signal.lock();
        while signal.locked && !signal.cancelled {
            match deadline {
                Some(deadline) => {
                    if self.inner.condvar.wait_until(&mut signal, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.condvar.wait(&mut signal),
            }
        }
        !signal.locked && !signal.cancelled
    }

    pub fn is_locked(&self) -> bool {
        self.inner.signal.lock().locked
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.signal.lock().cancelled
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completion.lock().completed
    }

    /// Subscribe to the next completion notification
    pub fn on_completed<F>(&self, handler: F)
    where
        F: FnOnce(&IntegrationContext) + Send + 'static,
    {
        self.inner.completion.lock().handlers.push(Box::new(handler));
    }

    /// Notify the current subscribers that the integration has finished.
    ///
    /// Each subscriber is called at most once; handlers registered later
    /// are not replayed.
    pub fn complete(&self) {
        let handlers = {
            let mut completion = self.inner.completion.lock();
            completion.completed = true;
            std::mem::take(&mut completion.handlers)
        };
        for handler in handlers {
            handler(self);
        }
    }

    /// Whether both handles refer to the same handshake
    pub fn same_as(&self, other: &IntegrationContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for IntegrationContext {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for IntegrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = self.inner.signal.lock();
        f.debug_struct("IntegrationContext")
            .field("item", &self.inner.item)
            .field("locked", &signal.locked)
            .field("cancelled", &signal.cancelled)
            .finish()
    }
}
