// src/monitor/history.rs

use std::collections::HashMap;

use crate::types::ExecutionEvent;

/// Every event observed during one monitor run, keyed by id.
///
/// Owned by the poller while it runs and handed back when it stops; it only
/// ever grows.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: HashMap<i64, ExecutionEvent>,
    last_id: Option<i64>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.events.contains_key(&id)
    }

    /// Record `event`. Returns false (and keeps the first copy) if its id was
    /// already present.
    pub fn insert(&mut self, event: ExecutionEvent) -> bool {
        if self.events.contains_key(&event.id) {
            return false;
        }
        if self.last_id.is_none_or(|last| event.id > last) {
            self.last_id = Some(event.id);
        }
        self.events.insert(event.id, event);
        true
    }

    pub fn get(&self, id: i64) -> Option<&ExecutionEvent> {
        self.events.get(&id)
    }

    pub fn last_id(&self) -> Option<i64> {
        self.last_id
    }

    /// The event with the highest id.
    pub fn last_event(&self) -> Option<&ExecutionEvent> {
        self.last_id.and_then(|id| self.events.get(&id))
    }

    /// The last event, if it ended the execution.
    pub fn terminal_event(&self) -> Option<&ExecutionEvent> {
        self.last_event().filter(|e| e.event_type.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
