//! Action routing and validation pipeline for the anima runtime.
//!
//! Components (action providers and interfaces) register the actions they
//! support with a central registry; the pipeline extracts structured
//! action requests from free-form model output, resolves missing target
//! interfaces, validates payloads against the registered schemas, drives a
//! bounded self-correction loop with the reasoning backend on validation
//! failures, and dispatches each validated request to its owning component
//! exactly once.

pub mod backend;
pub mod component;
pub mod conversation;
pub mod correction;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod extract;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod turn;
pub mod types;
pub mod validate;

pub use backend::{ReasoningBackend, ScriptedBackend};
pub use component::{Component, ComponentDescriptor};
pub use conversation::ConversationRouter;
pub use correction::{CorrectionDecision, CorrectionProtocol, CorrectionState};
pub use dispatch::Dispatcher;
pub use error::{BackendError, DispatchError, EventStoreError, HandlerError, PhaseError};
pub use events::{EventCompletionTracker, EventRecord, InMemoryEventStore, ScheduledEventStore};
pub use extract::{ActionExtractor, ExtractDiagnostic, Extraction};
pub use registry::ComponentRegistry;
pub use resolve::{InterfaceResolver, ResolutionRule};
pub use schema::{ActionSchema, SchemaPredicate};
pub use turn::TurnPipeline;
pub use types::{
    ActionRequest, ComponentKind, CorrectionMessage, DispatchRecord, FailureReason,
    HandlerOutput, MessageOrigin, Payload, TurnFailure, TurnPhase, TurnReport, Violation,
    ViolationKind,
};
pub use validate::Validator;
