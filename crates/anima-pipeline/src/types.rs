//! Core types and value objects for the action pipeline.
//!
//! Defines action requests, violations, correction messages, turn phases,
//! and their supporting enumerations.

use anima_core::types::ConversationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Open key/value payload attached to an action request.
pub type Payload = serde_json::Map<String, Value>;

// =============================================================================
// Enums
// =============================================================================

/// The two kinds of action-capable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Performs side effects (schedule a reminder, stage a command, ...).
    Provider,
    /// Delivers output to an external communication channel.
    Interface,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Provider => write!(f, "provider"),
            ComponentKind::Interface => write!(f, "interface"),
        }
    }
}

impl std::str::FromStr for ComponentKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(ComponentKind::Provider),
            "interface" => Ok(ComponentKind::Interface),
            _ => Err(format!("Unknown component kind: {}", s)),
        }
    }
}

/// Lifecycle phases of one model turn moving through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    AwaitingValidation,
    Correcting,
    Dispatched,
    Abandoned,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::AwaitingValidation => write!(f, "awaiting_validation"),
            TurnPhase::Correcting => write!(f, "correcting"),
            TurnPhase::Dispatched => write!(f, "dispatched"),
            TurnPhase::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for TurnPhase {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_validation" => Ok(TurnPhase::AwaitingValidation),
            "correcting" => Ok(TurnPhase::Correcting),
            "dispatched" => Ok(TurnPhase::Dispatched),
            "abandoned" => Ok(TurnPhase::Abandoned),
            _ => Err(format!("Unknown turn phase: {}", s)),
        }
    }
}

/// Classification of a single validation violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// No registered component handles the action type. Terminal, never
    /// corrected.
    UnsupportedAction,
    /// A declared required field is absent from the payload.
    MissingField,
    /// A declared required field is present but empty/null.
    EmptyField,
    /// The target names an interface that is not registered.
    UnknownInterface,
    /// The schema's cross-field predicate reported a failure.
    PredicateFailed,
}

// =============================================================================
// Violations
// =============================================================================

/// One validation violation: the action type plus the offending field or
/// condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub action: String,
    pub field: Option<String>,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn unsupported(action: &str) -> Self {
        Self {
            action: action.to_string(),
            field: None,
            kind: ViolationKind::UnsupportedAction,
            message: format!("unsupported action type '{}': no component handles it", action),
        }
    }

    pub fn missing_field(action: &str, field: &str) -> Self {
        Self {
            action: action.to_string(),
            field: Some(field.to_string()),
            kind: ViolationKind::MissingField,
            message: format!("missing required field: {}", field),
        }
    }

    pub fn empty_field(action: &str, field: &str) -> Self {
        Self {
            action: action.to_string(),
            field: Some(field.to_string()),
            kind: ViolationKind::EmptyField,
            message: format!("field cannot be empty: {}", field),
        }
    }

    pub fn unknown_interface(action: &str, interface: &str) -> Self {
        Self {
            action: action.to_string(),
            field: Some("interface".to_string()),
            kind: ViolationKind::UnknownInterface,
            message: format!("unknown target interface: {}", interface),
        }
    }

    pub fn predicate(action: &str, message: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            field: None,
            kind: ViolationKind::PredicateFailed,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action, self.message)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Identity and context of the inbound message a model turn answers.
///
/// Interfaces may attach platform context in `attributes`; the resolver
/// consults `interface_hint` first and marker attributes second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageOrigin {
    pub conversation: ConversationId,
    pub message_id: Option<String>,
    pub interface_hint: Option<String>,
    #[serde(default)]
    pub attributes: Payload,
}

impl MessageOrigin {
    pub fn new(conversation: impl Into<ConversationId>) -> Self {
        Self {
            conversation: conversation.into(),
            message_id: None,
            interface_hint: None,
            attributes: Payload::new(),
        }
    }
}

impl From<&str> for MessageOrigin {
    fn from(key: &str) -> Self {
        Self::new(ConversationId::from(key))
    }
}

/// One structured action request extracted from a block of model output.
///
/// Created by the extractor, consumed by dispatch, discarded afterwards.
/// Never persisted beyond the single execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: Uuid,
    pub action: String,
    /// Target interface. Optional at parse time, mandatory after resolution.
    pub interface: Option<String>,
    pub payload: Payload,
    /// Set when this request is the delivery of a scheduled event.
    pub event_id: Option<Uuid>,
    pub origin: Option<MessageOrigin>,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            interface: None,
            payload: Payload::new(),
            event_id: None,
            origin: None,
        }
    }

    /// Payload value lookup, string-typed and trimmed. Returns `None` for
    /// absent or non-string values.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result returned by a component handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutput {
    pub summary: String,
    pub detail: Option<Value>,
}

impl HandlerOutput {
    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: None,
        }
    }

    pub fn with_detail(summary: impl Into<String>, detail: Value) -> Self {
        Self {
            summary: summary.into(),
            detail: Some(detail),
        }
    }
}

/// Record of one successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub request_id: Uuid,
    pub action: String,
    pub component: String,
    pub output: HandlerOutput,
}

/// Why a request in a turn ultimately failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No component handles the action type; nothing to correct toward.
    UnsupportedAction,
    /// The correction budget ran out before a valid request arrived.
    BudgetExhausted { attempts: u32 },
    /// The owning component's handler raised after validation passed.
    Handler { error: String },
    /// The reasoning backend could not produce a correction reply.
    BackendUnavailable { error: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnsupportedAction => write!(f, "unsupported action"),
            FailureReason::BudgetExhausted { attempts } => {
                write!(f, "abandoned after {} correction attempts", attempts)
            }
            FailureReason::Handler { error } => write!(f, "handler failed: {}", error),
            FailureReason::BackendUnavailable { error } => {
                write!(f, "reasoning backend unavailable: {}", error)
            }
        }
    }
}

/// One delivery failure surfaced by a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnFailure {
    pub request_id: Uuid,
    pub action: String,
    pub reason: FailureReason,
}

/// Everything the pipeline did with one model turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub dispatched: Vec<DispatchRecord>,
    pub failures: Vec<TurnFailure>,
    /// Malformed fragments the extractor dropped with a diagnostic.
    pub dropped_fragments: usize,
}

impl TurnReport {
    /// True when every extracted request dispatched cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.dropped_fragments == 0
    }
}

// =============================================================================
// Correction messages
// =============================================================================

/// Structured correction payload sent back to the reasoning backend after a
/// validation failure. References exactly one prior request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionMessage {
    pub request_id: Uuid,
    pub action: String,
    pub violations: Vec<Violation>,
    /// 1-based attempt number this correction opens.
    pub attempt: u32,
    pub attempts_left: u32,
    pub instruction: String,
}

impl CorrectionMessage {
    pub fn new(request: &ActionRequest, violations: Vec<Violation>, attempt: u32, budget: u32) -> Self {
        Self {
            request_id: request.id,
            action: request.action.clone(),
            violations,
            attempt,
            attempts_left: budget.saturating_sub(attempt),
            instruction: format!(
                "Resend the same '{}' action with only the listed problems fixed. \
                 Keep every valid field unchanged and do not add other actions.",
                request.action
            ),
        }
    }

    /// Render as the wire block the reasoning backend consumes: a JSON
    /// object tagged as a system-level error.
    pub fn render(&self) -> String {
        let block = serde_json::json!({ "system_error": self });
        serde_json::to_string_pretty(&block).unwrap_or_else(|_| String::from("{}"))
    }
}
