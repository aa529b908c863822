//! Error types for the action pipeline.

use crate::types::TurnPhase;
use uuid::Uuid;

/// Errors raised by component handlers during execution.
///
/// These occur only after validation has already passed; they are
/// operational failures, never schema failures.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),
    #[error("Payload rejected by handler: {0}")]
    InvalidPayload(String),
    #[error("Downstream service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the dispatch layer.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No component handles action type: {0}")]
    UnknownAction(String),
    #[error("Component not registered: {0}")]
    UnknownComponent(String),
    #[error("Request already dispatched: {0}")]
    AlreadyDispatched(Uuid),
    #[error("Handler error from {component}: {source}")]
    Handler {
        component: String,
        #[source]
        source: HandlerError,
    },
}

/// Errors from the reasoning backend boundary.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Reasoning backend unavailable: {0}")]
    Unavailable(String),
    #[error("Reasoning backend produced no reply")]
    Exhausted,
}

/// Invalid turn-phase transition. These indicate pipeline bugs, not bad
/// model output.
#[derive(Debug, thiserror::Error)]
#[error("Invalid turn phase transition: {from} -> {to}")]
pub struct PhaseError {
    pub from: TurnPhase,
    pub to: TurnPhase,
}

/// Errors from the scheduled-event store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("Scheduled event not found: {0}")]
    NotFound(Uuid),
    #[error("Event store failed: {0}")]
    Failed(String),
}

impl From<HandlerError> for anima_core::AnimaError {
    fn from(err: HandlerError) -> Self {
        anima_core::AnimaError::Component(err.to_string())
    }
}

impl From<DispatchError> for anima_core::AnimaError {
    fn from(err: DispatchError) -> Self {
        anima_core::AnimaError::Pipeline(err.to_string())
    }
}
