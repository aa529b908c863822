//! The component contract: what every action provider and interface
//! exposes to the pipeline.
//!
//! Capabilities are declared on the descriptor (marker field, prompt
//! hints), never discovered by probing the implementation.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::HandlerError;
use crate::schema::ActionSchema;
use crate::types::{ComponentKind, HandlerOutput, Payload};

/// Everything the registry needs to know about one component, snapshotted
/// at registration time.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// Unique component name. Re-registering the same name replaces the
    /// previous registration.
    pub name: String,
    pub kind: ComponentKind,
    /// The action types this component supports, with their payload shapes.
    pub schemas: Vec<ActionSchema>,
    /// Interfaces only: the attribute name that appears exclusively on this
    /// interface's inbound messages. Used by resolution rule 2.
    pub marker_field: Option<String>,
    /// Optional per-action prompt-authoring hints. Stored by the registry,
    /// consumed only by prompt construction, never by validation/dispatch.
    pub prompt_hints: HashMap<String, String>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            schemas: Vec::new(),
            marker_field: None,
            prompt_hints: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: ActionSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    #[must_use]
    pub fn with_marker_field(mut self, field: impl Into<String>) -> Self {
        self.marker_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_prompt_hint(mut self, action: impl Into<String>, hint: impl Into<String>) -> Self {
        self.prompt_hints.insert(action.into(), hint.into());
        self
    }

    /// The action type names this component supports, in declaration order.
    pub fn action_types(&self) -> Vec<String> {
        self.schemas.iter().map(|s| s.name.clone()).collect()
    }

    pub fn schema_for(&self, action: &str) -> Option<&ActionSchema> {
        self.schemas.iter().find(|s| s.name == action)
    }
}

/// An action-capable component: an action provider or an interface.
///
/// `descriptor` is called once at registration; the returned snapshot is
/// what the registry serves to validation and dispatch. `handle` is the
/// side-effect entry point, invoked only with payloads that already passed
/// validation.
#[async_trait]
pub trait Component: Send + Sync {
    fn descriptor(&self) -> ComponentDescriptor;

    async fn handle(&self, action: &str, payload: &Payload)
        -> Result<HandlerOutput, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct EchoComponent;

    #[async_trait]
    impl Component for EchoComponent {
        fn descriptor(&self) -> ComponentDescriptor {
            ComponentDescriptor::new("echo", ComponentKind::Provider)
                .with_schema(ActionSchema::new("echo").require("text"))
                .with_prompt_hint("echo", "Repeat the given text back.")
        }

        async fn handle(
            &self,
            _action: &str,
            payload: &Payload,
        ) -> Result<HandlerOutput, HandlerError> {
            let text = payload.get("text").and_then(Value::as_str).unwrap_or("");
            Ok(HandlerOutput::text(text))
        }
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = ComponentDescriptor::new("console", ComponentKind::Interface)
            .with_schema(ActionSchema::new("send_text").require("text"))
            .with_schema(ActionSchema::new("send_file").require("path"))
            .with_marker_field("console_session");

        assert_eq!(desc.name, "console");
        assert_eq!(desc.kind, ComponentKind::Interface);
        assert_eq!(
            desc.action_types(),
            vec!["send_text".to_string(), "send_file".to_string()]
        );
        assert_eq!(desc.marker_field.as_deref(), Some("console_session"));
    }

    #[test]
    fn test_schema_for() {
        let desc = ComponentDescriptor::new("console", ComponentKind::Interface)
            .with_schema(ActionSchema::new("send_text").require("text"));
        assert!(desc.schema_for("send_text").is_some());
        assert!(desc.schema_for("send_file").is_none());
    }

    #[test]
    fn test_prompt_hints() {
        let desc = EchoComponent.descriptor();
        assert_eq!(
            desc.prompt_hints.get("echo").map(String::as_str),
            Some("Repeat the given text back.")
        );
    }

    #[tokio::test]
    async fn test_handle_invocation() {
        let component = EchoComponent;
        let mut payload = Payload::new();
        payload.insert("text".to_string(), Value::String("hello".to_string()));

        let output = component.handle("echo", &payload).await.unwrap();
        assert_eq!(output.summary, "hello");
    }
}
