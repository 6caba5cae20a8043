//! Built-in trigger kinds

use crate::core::{
    environment::{Clock, SystemClock},
    error::Result,
    integration::IntegrationRequest,
    trigger::TriggerPolicy,
    validation::ValidationLog,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Fires once every `interval`
pub struct IntervalTrigger {
    interval: Duration,
    clock: Arc<dyn Clock>,
    next: Option<DateTime<Utc>>,
}

impl IntervalTrigger {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, Arc::new(SystemClock))
    }

    pub fn with_clock(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval,
            clock,
            next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TriggerPolicy for IntervalTrigger {
    fn type_name(&self) -> &'static str {
        "IntervalTrigger"
    }

    fn on_check(&mut self, source: &str) -> Result<Option<IntegrationRequest>> {
        let now = self.clock.now();
        match self.next {
            Some(next) if now < next => Ok(None),
            _ => Ok(Some(IntegrationRequest::at(source, now))),
        }
    }

    fn on_reset(&mut self) {
        let now = self.clock.now();
        let next = chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|interval| now.checked_add_signed(interval));
        self.next = Some(next.unwrap_or(DateTime::<Utc>::MAX_UTC));
    }

    fn next_time(&self) -> Option<DateTime<Utc>> {
        self.next
    }

    fn validate(&self, log: &mut ValidationLog) {
        if self.interval.is_zero() {
            log.add_warning("IntervalTrigger has a zero interval and will fire on every poll.");
        }
    }
}
