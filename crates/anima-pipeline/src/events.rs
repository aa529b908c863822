//! Scheduled-event delivery tracking.
//!
//! Scheduled events live in a collaborator store; the pipeline's only
//! contract with it is "mark delivered" and "notify completed", both
//! idempotent. Acknowledgement is fire-and-forget relative to dispatch: a
//! tracking failure is logged, never propagated, and never rolls back a
//! side effect that already happened.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anima_core::types::Timestamp;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EventStoreError;

/// The collaborator contract for the store owning scheduled events.
pub trait ScheduledEventStore: Send + Sync {
    /// Record that the event's action reached dispatch. Idempotent.
    fn mark_delivered(&self, id: Uuid) -> Result<(), EventStoreError>;
    /// Record that the event's lifecycle is complete. Idempotent.
    fn notify_completed(&self, id: Uuid) -> Result<(), EventStoreError>;
}

/// One stored scheduled event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub message: String,
    pub at: Timestamp,
    pub delivered: bool,
    pub completed: bool,
    pub created_at: Timestamp,
}

/// In-memory scheduled-event store used by the bundled reminder provider.
pub struct InMemoryEventStore {
    events: Mutex<HashMap<Uuid, EventRecord>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new scheduled event.
    pub fn create(&self, message: String, at: Timestamp) -> EventRecord {
        let record = EventRecord {
            id: Uuid::new_v4(),
            message,
            at,
            delivered: false,
            completed: false,
            created_at: Timestamp::now(),
        };
        let mut events = self.events.lock().unwrap();
        events.insert(record.id, record.clone());
        record
    }

    pub fn get(&self, id: Uuid) -> Option<EventRecord> {
        self.events.lock().unwrap().get(&id).cloned()
    }

    /// Remove an event before delivery.
    pub fn cancel(&self, id: Uuid) -> Result<(), EventStoreError> {
        let mut events = self.events.lock().unwrap();
        events.remove(&id).map(|_| ()).ok_or(EventStoreError::NotFound(id))
    }

    /// Events due at or before `now` that have not yet been delivered,
    /// soonest first.
    pub fn due(&self, now: Timestamp) -> Vec<EventRecord> {
        let events = self.events.lock().unwrap();
        let mut due: Vec<EventRecord> = events
            .values()
            .filter(|e| !e.delivered && e.at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|e| e.at);
        due
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduledEventStore for InMemoryEventStore {
    fn mark_delivered(&self, id: Uuid) -> Result<(), EventStoreError> {
        let mut events = self.events.lock().unwrap();
        let record = events.get_mut(&id).ok_or(EventStoreError::NotFound(id))?;
        // Setting an already-set flag is the idempotent no-op the contract
        // requires.
        record.delivered = true;
        Ok(())
    }

    fn notify_completed(&self, id: Uuid) -> Result<(), EventStoreError> {
        let mut events = self.events.lock().unwrap();
        let record = events.get_mut(&id).ok_or(EventStoreError::NotFound(id))?;
        record.completed = true;
        Ok(())
    }
}

/// Marks an event delivered and completed after its action dispatched.
pub struct EventCompletionTracker {
    store: Arc<dyn ScheduledEventStore>,
}

impl EventCompletionTracker {
    pub fn new(store: Arc<dyn ScheduledEventStore>) -> Self {
        Self { store }
    }

    /// Acknowledge a delivered event. Failures are logged and swallowed:
    /// the dispatched side effect is not reversible, so tracking must not
    /// fail the dispatch.
    pub fn acknowledge(&self, event_id: Uuid) {
        match self.store.mark_delivered(event_id) {
            Ok(()) => debug!(event_id = %event_id, "Scheduled event marked delivered"),
            Err(e) => warn!(event_id = %event_id, error = %e, "Failed to mark event delivered"),
        }
        match self.store.notify_completed(event_id) {
            Ok(()) => debug!(event_id = %event_id, "Scheduled event completed"),
            Err(e) => warn!(event_id = %event_id, error = %e, "Failed to complete event"),
        }
    }
}
