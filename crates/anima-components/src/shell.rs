//! Shell command provider.
//!
//! Stages shell commands for operator execution with safety checks.
//! Commands are NOT actually executed -- they are staged for confirmation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

use anima_core::types::Timestamp;
use anima_pipeline::{
    ActionSchema, Component, ComponentDescriptor, ComponentKind, HandlerError, HandlerOutput,
    Payload,
};

/// One command waiting for operator confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedCommand {
    pub id: Uuid,
    pub command: String,
    pub cwd: Option<String>,
    pub staged_at: Timestamp,
}

/// Provider for run_command. Never executes anything itself.
pub struct ShellProvider {
    staged: Mutex<Vec<StagedCommand>>,
}

impl ShellProvider {
    pub fn new() -> Self {
        Self {
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Commands staged so far, oldest first.
    pub fn staged(&self) -> Vec<StagedCommand> {
        self.staged.lock().unwrap().clone()
    }

    /// Remove a staged command after the operator ran or rejected it.
    pub fn unstage(&self, id: Uuid) -> bool {
        let mut staged = self.staged.lock().unwrap();
        if let Some(pos) = staged.iter().position(|c| c.id == id) {
            staged.remove(pos);
            true
        } else {
            false
        }
    }
}

impl Default for ShellProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for ShellProvider {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new("shell", ComponentKind::Provider)
            .with_schema(
                ActionSchema::new("run_command")
                    .require("command")
                    .optional_field("cwd")
                    .describe("Stage a shell command for operator confirmation"),
            )
            .with_prompt_hint(
                "run_command",
                "run_command stages the command; a human confirms before it runs.",
            )
    }

    async fn handle(&self, action: &str, payload: &Payload) -> Result<HandlerOutput, HandlerError> {
        if action != "run_command" {
            return Err(HandlerError::Failed(format!(
                "shell cannot handle action: {}",
                action
            )));
        }

        let command = payload
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let cwd = payload
            .get("cwd")
            .and_then(Value::as_str)
            .map(str::to_string);

        let staged = StagedCommand {
            id: Uuid::new_v4(),
            command: command.clone(),
            cwd,
            staged_at: Timestamp::now(),
        };
        let id = staged.id;
        self.staged.lock().unwrap().push(staged);

        // Safety: do NOT execute the command here.
        tracing::info!(command = %command, staged_id = %id, "Command staged for execution");

        Ok(HandlerOutput::with_detail(
            format!("Command staged for execution: {}", command),
            serde_json::json!({ "staged_id": id }),
        ))
    }
}
