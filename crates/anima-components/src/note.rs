//! Quick-note provider.
//!
//! Stores short notes in an in-memory notebook.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

use anima_core::types::Timestamp;
use anima_pipeline::{
    ActionSchema, Component, ComponentDescriptor, ComponentKind, HandlerError, HandlerOutput,
    Payload,
};

/// One saved note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: Uuid,
    pub title: Option<String>,
    pub body: String,
    pub created_at: Timestamp,
}

/// Provider for save_note.
pub struct NoteProvider {
    notebook: Mutex<Vec<Note>>,
}

impl NoteProvider {
    pub fn new() -> Self {
        Self {
            notebook: Mutex::new(Vec::new()),
        }
    }

    /// Saved notes, oldest first.
    pub fn notes(&self) -> Vec<Note> {
        self.notebook.lock().unwrap().clone()
    }
}

impl Default for NoteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for NoteProvider {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new("notes", ComponentKind::Provider).with_schema(
            ActionSchema::new("save_note")
                .require("body")
                .optional_field("title")
                .describe("Save a quick note"),
        )
    }

    async fn handle(&self, action: &str, payload: &Payload) -> Result<HandlerOutput, HandlerError> {
        if action != "save_note" {
            return Err(HandlerError::Failed(format!(
                "notes cannot handle action: {}",
                action
            )));
        }

        let body = payload
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        let note = Note {
            id: Uuid::new_v4(),
            title,
            body,
            created_at: Timestamp::now(),
        };
        let id = note.id;
        self.notebook.lock().unwrap().push(note);

        tracing::info!(note_id = %id, "Note saved");
        Ok(HandlerOutput::with_detail(
            "Note saved",
            serde_json::json!({ "note_id": id }),
        ))
    }
}
