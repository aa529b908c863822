//! Scheduled-event provider.
//!
//! Creates and cancels time-triggered events in the shared event store.
//! Delivery of a due event is someone else's turn through the pipeline;
//! this provider only owns the bookkeeping actions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use anima_core::types::Timestamp;
use anima_pipeline::{
    ActionSchema, Component, ComponentDescriptor, ComponentKind, HandlerError, HandlerOutput,
    InMemoryEventStore, Payload,
};

/// Provider for schedule_event / cancel_event.
pub struct ReminderProvider {
    store: Arc<InMemoryEventStore>,
}

impl ReminderProvider {
    pub fn new(store: Arc<InMemoryEventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Component for ReminderProvider {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new("reminders", ComponentKind::Provider)
            .with_schema(
                ActionSchema::new("schedule_event")
                    .require("message")
                    .require("at")
                    .describe("Schedule a time-triggered event")
                    .with_predicate(|p| {
                        let at = p.get("at").and_then(Value::as_str).unwrap_or("");
                        if at.is_empty() {
                            return vec![];
                        }
                        match DateTime::parse_from_rfc3339(at) {
                            Ok(_) => vec![],
                            Err(_) => {
                                vec![format!("'at' must be an RFC 3339 timestamp, got '{}'", at)]
                            }
                        }
                    }),
            )
            .with_schema(
                ActionSchema::new("cancel_event")
                    .require("event_id")
                    .describe("Cancel a scheduled event before it fires")
                    .with_predicate(|p| {
                        let id = p.get("event_id").and_then(Value::as_str).unwrap_or("");
                        if id.is_empty() || Uuid::parse_str(id).is_ok() {
                            vec![]
                        } else {
                            vec![format!("'event_id' must be a UUID, got '{}'", id)]
                        }
                    }),
            )
            .with_prompt_hint(
                "schedule_event",
                "Use schedule_event with an RFC 3339 'at' time for reminders.",
            )
    }

    async fn handle(&self, action: &str, payload: &Payload) -> Result<HandlerOutput, HandlerError> {
        match action {
            "schedule_event" => {
                let message = payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let at_raw = payload.get("at").and_then(Value::as_str).unwrap_or("");
                let at = DateTime::parse_from_rfc3339(at_raw)
                    .map_err(|e| HandlerError::InvalidPayload(format!("bad 'at' time: {}", e)))?
                    .with_timezone(&Utc);

                let record = self
                    .store
                    .create(message.clone(), Timestamp::from_datetime(at));
                tracing::info!(event_id = %record.id, at = %at_raw, "Event scheduled");

                Ok(HandlerOutput::with_detail(
                    format!("Event scheduled: {}", message),
                    serde_json::json!({ "event_id": record.id }),
                ))
            }
            "cancel_event" => {
                let raw = payload.get("event_id").and_then(Value::as_str).unwrap_or("");
                let id = Uuid::parse_str(raw)
                    .map_err(|e| HandlerError::InvalidPayload(format!("bad event_id: {}", e)))?;

                self.store
                    .cancel(id)
                    .map_err(|e| HandlerError::Failed(e.to_string()))?;
                tracing::info!(event_id = %id, "Event cancelled");
                Ok(HandlerOutput::text(format!("Event cancelled: {}", id)))
            }
            other => Err(HandlerError::Failed(format!(
                "reminders cannot handle action: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> (ReminderProvider, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        (ReminderProvider::new(Arc::clone(&store)), store)
    }

    fn payload(pairs: &[(&str, &str)]) -> Payload {
        let mut map = Payload::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), Value::String(v.to_string()));
        }
        map
    }

    #[test]
    fn test_descriptor_shape() {
        let (p, _) = provider();
        let desc = p.descriptor();
        assert_eq!(desc.name, "reminders");
        assert_eq!(desc.kind, ComponentKind::Provider);
        assert!(desc.marker_field.is_none());

        let schedule = desc.schema_for("schedule_event").unwrap();
        assert_eq!(
            schedule.required,
            vec!["message".to_string(), "at".to_string()]
        );
        assert!(schedule.predicate.is_some());
    }

    #[test]
    fn test_schedule_predicate_rejects_sloppy_times() {
        let (p, _) = provider();
        let desc = p.descriptor();
        let predicate = desc
            .schema_for("schedule_event")
            .unwrap()
            .predicate
            .clone()
            .unwrap();

        assert!(predicate(&payload(&[("at", "2026-03-01T09:00:00Z")])).is_empty());
        assert!(predicate(&payload(&[("at", "tomorrow at nine")])).len() == 1);
        // Emptiness is the field checks' problem, not the predicate's.
        assert!(predicate(&payload(&[("at", "")])).is_empty());
    }

    #[test]
    fn test_cancel_predicate_rejects_non_uuid() {
        let (p, _) = provider();
        let desc = p.descriptor();
        let predicate = desc
            .schema_for("cancel_event")
            .unwrap()
            .predicate
            .clone()
            .unwrap();

        assert!(predicate(&payload(&[("event_id", "550e8400-e29b-41d4-a716-446655440000")]))
            .is_empty());
        assert_eq!(predicate(&payload(&[("event_id", "event-7")])).len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_event_creates_record() {
        let (p, store) = provider();
        let output = p
            .handle(
                "schedule_event",
                &payload(&[("message", "call Bob"), ("at", "2026-03-01T09:00:00Z")]),
            )
            .await
            .unwrap();

        assert!(output.summary.contains("call Bob"));
        let detail = output.detail.unwrap();
        let id = Uuid::parse_str(detail["event_id"].as_str().unwrap()).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.message, "call Bob");
        assert!(!record.delivered);
    }

    #[tokio::test]
    async fn test_cancel_event_removes_record() {
        let (p, store) = provider();
        let record = store.create("zombie".to_string(), Timestamp(0));

        p.handle(
            "cancel_event",
            &payload(&[("event_id", &record.id.to_string())]),
        )
        .await
        .unwrap();

        assert!(store.get(record.id).is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_event_fails() {
        let (p, _) = provider();
        let err = p
            .handle(
                "cancel_event",
                &payload(&[("event_id", &Uuid::new_v4().to_string())]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }

    #[tokio::test]
    async fn test_schedule_with_invalid_time_rejected() {
        let (p, store) = provider();
        let err = p
            .handle(
                "schedule_event",
                &payload(&[("message", "x"), ("at", "noonish")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
        assert!(store.is_empty());
    }
}
