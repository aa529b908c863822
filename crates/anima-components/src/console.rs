//! Console interface component.
//!
//! Delivers text and files to the local terminal. The outbox keeps every
//! delivery for inspection by the application and tests.

use async_trait::async_trait;
use std::sync::Mutex;

use anima_core::types::Timestamp;
use anima_pipeline::{
    ActionSchema, Component, ComponentDescriptor, ComponentKind, HandlerError, HandlerOutput,
    Payload,
};

/// One delivery performed by the console interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub action: String,
    pub content: String,
    pub at: Timestamp,
}

/// Interface that prints deliveries to the terminal.
pub struct ConsoleInterface {
    outbox: Mutex<Vec<Delivery>>,
}

impl ConsoleInterface {
    pub fn new() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Everything delivered so far, oldest first.
    pub fn outbox(&self) -> Vec<Delivery> {
        self.outbox.lock().unwrap().clone()
    }

    fn record(&self, action: &str, content: String) {
        self.outbox.lock().unwrap().push(Delivery {
            action: action.to_string(),
            content,
            at: Timestamp::now(),
        });
    }
}

impl Default for ConsoleInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for ConsoleInterface {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new("console", ComponentKind::Interface)
            .with_schema(
                ActionSchema::new("send_text")
                    .require("text")
                    .optional_field("reply_to")
                    .describe("Deliver a text message to the terminal"),
            )
            .with_schema(
                ActionSchema::new("send_file")
                    .require("path")
                    .optional_field("caption")
                    .describe("Announce a file delivery on the terminal"),
            )
            .with_marker_field("console_session")
            .with_prompt_hint("send_text", "Use send_text for any reply the user should read.")
    }

    async fn handle(&self, action: &str, payload: &Payload) -> Result<HandlerOutput, HandlerError> {
        match action {
            "send_text" => {
                let text = payload
                    .get("text")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                println!("{}", text);
                tracing::info!(chars = text.len(), "Console text delivered");
                self.record(action, text.to_string());
                Ok(HandlerOutput::text(format!("Delivered {} characters", text.len())))
            }
            "send_file" => {
                let path = payload
                    .get("path")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                let caption = payload
                    .get("caption")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                if caption.is_empty() {
                    println!("[file] {}", path);
                } else {
                    println!("[file] {} — {}", path, caption);
                }
                tracing::info!(path = %path, "Console file delivered");
                self.record(action, path.to_string());
                Ok(HandlerOutput::text(format!("Delivered file {}", path)))
            }
            other => Err(HandlerError::Failed(format!(
                "console cannot handle action: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn payload(pairs: &[(&str, &str)]) -> Payload {
        let mut map = Payload::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), Value::String(v.to_string()));
        }
        map
    }

    #[test]
    fn test_descriptor_shape() {
        let desc = ConsoleInterface::new().descriptor();
        assert_eq!(desc.name, "console");
        assert_eq!(desc.kind, ComponentKind::Interface);
        assert_eq!(desc.marker_field.as_deref(), Some("console_session"));

        let send_text = desc.schema_for("send_text").unwrap();
        assert_eq!(send_text.required, vec!["text".to_string()]);
        assert_eq!(send_text.optional, vec!["reply_to".to_string()]);

        let send_file = desc.schema_for("send_file").unwrap();
        assert_eq!(send_file.required, vec!["path".to_string()]);
    }

    #[tokio::test]
    async fn test_send_text_records_delivery() {
        let console = ConsoleInterface::new();
        let output = console
            .handle("send_text", &payload(&[("text", "hello")]))
            .await
            .unwrap();

        assert_eq!(output.summary, "Delivered 5 characters");
        let outbox = console.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].action, "send_text");
        assert_eq!(outbox[0].content, "hello");
    }

    #[tokio::test]
    async fn test_send_file_with_and_without_caption() {
        let console = ConsoleInterface::new();
        console
            .handle("send_file", &payload(&[("path", "/tmp/report.pdf")]))
            .await
            .unwrap();
        console
            .handle(
                "send_file",
                &payload(&[("path", "/tmp/photo.png"), ("caption", "sunset")]),
            )
            .await
            .unwrap();

        let outbox = console.outbox();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].content, "/tmp/report.pdf");
        assert_eq!(outbox[1].content, "/tmp/photo.png");
    }

    #[tokio::test]
    async fn test_unknown_action_errors() {
        let console = ConsoleInterface::new();
        let err = console
            .handle("send_pigeon", &Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
        assert!(console.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_deliveries_keep_order() {
        let console = ConsoleInterface::new();
        for text in ["one", "two", "three"] {
            console
                .handle("send_text", &payload(&[("text", text)]))
                .await
                .unwrap();
        }
        let contents: Vec<String> = console.outbox().into_iter().map(|d| d.content).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }
}
