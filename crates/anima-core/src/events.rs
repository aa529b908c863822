use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ConversationId, Timestamp};

/// Audit events emitted by the action pipeline.
///
/// Events are broadcast on a `tokio::sync::broadcast` channel after state
/// changes and consumed by:
/// - The application log sink (structured audit trail)
/// - Cross-context listeners (e.g. a human-in-the-loop notification channel)
///
/// Emission is fire-and-forget; a missing subscriber is not an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PipelineEvent {
    /// One or more action requests were extracted from a model reply.
    ActionsExtracted {
        conversation: ConversationId,
        request_count: usize,
        dropped_fragments: usize,
        timestamp: Timestamp,
    },

    /// A request's target interface was filled in by a resolution rule.
    InterfaceResolved {
        request_id: Uuid,
        interface: String,
        rule: String,
        timestamp: Timestamp,
    },

    /// Validation found one or more violations for a request.
    ValidationFailed {
        request_id: Uuid,
        action: String,
        violation_count: usize,
        timestamp: Timestamp,
    },

    /// A correction message was issued back to the reasoning backend.
    CorrectionIssued {
        request_id: Uuid,
        action: String,
        attempt: u32,
        timestamp: Timestamp,
    },

    /// A validated request was dispatched to its owning component.
    ActionDispatched {
        request_id: Uuid,
        action: String,
        component: String,
        timestamp: Timestamp,
    },

    /// A component handler raised after validation had already passed.
    HandlerFailed {
        request_id: Uuid,
        action: String,
        component: String,
        error: String,
        timestamp: Timestamp,
    },

    /// The correction budget was exhausted; the turn was abandoned.
    TurnAbandoned {
        conversation: ConversationId,
        action: String,
        attempts: u32,
        timestamp: Timestamp,
    },

    /// A scheduled event was acknowledged (delivered + completed).
    EventAcknowledged {
        event_id: Uuid,
        timestamp: Timestamp,
    },
}
