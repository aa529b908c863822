//! Turn pipeline: central coordinator for one model turn.
//!
//! Drives extract -> resolve -> validate -> (correct)* -> dispatch for
//! every action request in a reply, in the order the model produced them.
//! The correction budget is shared across the turn; abandonment is
//! reported in the turn report, never swallowed.

use std::sync::Arc;

use anima_core::config::PipelineConfig;
use anima_core::events::PipelineEvent;
use anima_core::types::Timestamp;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::backend::ReasoningBackend;
use crate::correction::{CorrectionDecision, CorrectionProtocol};
use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::events::{EventCompletionTracker, ScheduledEventStore};
use crate::extract::ActionExtractor;
use crate::registry::ComponentRegistry;
use crate::resolve::InterfaceResolver;
use crate::types::{
    ActionRequest, FailureReason, MessageOrigin, TurnFailure, TurnReport, ViolationKind,
};
use crate::validate::Validator;

/// Capacity of the audit event channel. Lagging subscribers lose oldest
/// events first; emission never blocks the pipeline.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The full action routing and validation pipeline for model turns.
pub struct TurnPipeline {
    extractor: ActionExtractor,
    resolver: InterfaceResolver,
    validator: Validator,
    dispatcher: Dispatcher,
    protocol: CorrectionProtocol,
    backend: Arc<dyn ReasoningBackend>,
    events: broadcast::Sender<PipelineEvent>,
}

impl TurnPipeline {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        event_store: Arc<dyn ScheduledEventStore>,
        backend: Arc<dyn ReasoningBackend>,
        config: &PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            extractor: ActionExtractor::new(),
            resolver: InterfaceResolver::new(
                Arc::clone(&registry),
                config.default_interface.clone(),
            ),
            validator: Validator::new(Arc::clone(&registry)),
            dispatcher: Dispatcher::new(registry, EventCompletionTracker::new(event_store)),
            protocol: CorrectionProtocol::new(config.correction_budget),
            backend,
            events,
        }
    }

    /// Subscribe to the audit event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Process one model reply for one conversation turn.
    pub async fn process_reply(&self, origin: &MessageOrigin, reply: &str) -> TurnReport {
        let extraction = self.extractor.extract(reply, Some(origin));
        let mut report = TurnReport {
            dropped_fragments: extraction.diagnostics.len(),
            ..TurnReport::default()
        };

        self.emit(PipelineEvent::ActionsExtracted {
            conversation: origin.conversation.clone(),
            request_count: extraction.requests.len(),
            dropped_fragments: extraction.diagnostics.len(),
            timestamp: Timestamp::now(),
        });

        let mut attempts_used = 0u32;
        for request in extraction.requests {
            let remaining = self.protocol.budget().saturating_sub(attempts_used);
            attempts_used += self
                .process_request(origin, request, remaining, &mut report)
                .await;
        }

        info!(
            conversation = %origin.conversation,
            dispatched = report.dispatched.len(),
            failures = report.failures.len(),
            dropped = report.dropped_fragments,
            "Turn processed"
        );
        report
    }

    /// Run one request to its terminal state. Returns the correction
    /// attempts it consumed from the turn budget.
    async fn process_request(
        &self,
        origin: &MessageOrigin,
        mut request: ActionRequest,
        remaining_budget: u32,
        report: &mut TurnReport,
    ) -> u32 {
        let mut state = CorrectionProtocol::new(remaining_budget).begin();

        loop {
            if request.interface.is_none() {
                if let Some(rule) = self.resolver.resolve(&mut request) {
                    self.emit(PipelineEvent::InterfaceResolved {
                        request_id: request.id,
                        interface: request.interface.clone().unwrap_or_default(),
                        rule: rule.to_string(),
                        timestamp: Timestamp::now(),
                    });
                }
            }

            let violations = self.validator.validate(&request);
            if violations.is_empty() {
                if let Err(e) = state.on_pass() {
                    error!(error = %e, "Turn phase bug; abandoning request");
                    return state.attempts();
                }
                self.dispatch_request(&request, report).await;
                return state.attempts();
            }

            self.emit(PipelineEvent::ValidationFailed {
                request_id: request.id,
                action: request.action.clone(),
                violation_count: violations.len(),
                timestamp: Timestamp::now(),
            });

            // Unsupported action type: nothing to correct toward, surfaced
            // immediately as a terminal failure for this one request.
            if violations.len() == 1 && violations[0].kind == ViolationKind::UnsupportedAction {
                warn!(action = %request.action, "Unsupported action type; not correcting");
                report.failures.push(TurnFailure {
                    request_id: request.id,
                    action: request.action.clone(),
                    reason: FailureReason::UnsupportedAction,
                });
                return state.attempts();
            }

            let decision = match state.on_violations(&request, violations) {
                Ok(decision) => decision,
                Err(e) => {
                    error!(error = %e, "Turn phase bug; abandoning request");
                    return state.attempts();
                }
            };

            match decision {
                CorrectionDecision::Retry(correction) => {
                    self.emit(PipelineEvent::CorrectionIssued {
                        request_id: correction.request_id,
                        action: correction.action.clone(),
                        attempt: correction.attempt,
                        timestamp: Timestamp::now(),
                    });

                    match self.backend.correct(&origin.conversation, &correction).await {
                        Ok(corrected_reply) => {
                            if let Err(e) = state.on_reply() {
                                error!(error = %e, "Turn phase bug; abandoning request");
                                return state.attempts();
                            }
                            let next = self.extractor.extract(&corrected_reply, Some(origin));
                            report.dropped_fragments += next.diagnostics.len();

                            match pick_replacement(next.requests, &request.action) {
                                Some(mut replacement) => {
                                    // Provenance survives the correction
                                    // round even when the model drops it.
                                    if replacement.event_id.is_none() {
                                        replacement.event_id = request.event_id;
                                    }
                                    request = replacement;
                                }
                                None => {
                                    warn!(
                                        action = %request.action,
                                        "Corrected reply contained no action; retrying with prior request"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            let _ = state.abandon();
                            warn!(
                                conversation = %origin.conversation,
                                error = %e,
                                "Backend unavailable during correction; abandoning turn"
                            );
                            self.emit(PipelineEvent::TurnAbandoned {
                                conversation: origin.conversation.clone(),
                                action: request.action.clone(),
                                attempts: state.attempts(),
                                timestamp: Timestamp::now(),
                            });
                            report.failures.push(TurnFailure {
                                request_id: request.id,
                                action: request.action.clone(),
                                reason: FailureReason::BackendUnavailable {
                                    error: e.to_string(),
                                },
                            });
                            return state.attempts();
                        }
                    }
                }
                CorrectionDecision::Abandon { attempts } => {
                    warn!(
                        conversation = %origin.conversation,
                        action = %request.action,
                        attempts,
                        "Correction budget exhausted; turn abandoned"
                    );
                    self.emit(PipelineEvent::TurnAbandoned {
                        conversation: origin.conversation.clone(),
                        action: request.action.clone(),
                        attempts,
                        timestamp: Timestamp::now(),
                    });
                    report.failures.push(TurnFailure {
                        request_id: request.id,
                        action: request.action.clone(),
                        reason: FailureReason::BudgetExhausted { attempts },
                    });
                    return state.attempts();
                }
            }
        }
    }

    async fn dispatch_request(&self, request: &ActionRequest, report: &mut TurnReport) {
        match self.dispatcher.dispatch(request).await {
            Ok(record) => {
                self.emit(PipelineEvent::ActionDispatched {
                    request_id: record.request_id,
                    action: record.action.clone(),
                    component: record.component.clone(),
                    timestamp: Timestamp::now(),
                });
                if let Some(event_id) = request.event_id {
                    self.emit(PipelineEvent::EventAcknowledged {
                        event_id,
                        timestamp: Timestamp::now(),
                    });
                }
                report.dispatched.push(record);
            }
            Err(DispatchError::Handler { component, source }) => {
                self.emit(PipelineEvent::HandlerFailed {
                    request_id: request.id,
                    action: request.action.clone(),
                    component,
                    error: source.to_string(),
                    timestamp: Timestamp::now(),
                });
                report.failures.push(TurnFailure {
                    request_id: request.id,
                    action: request.action.clone(),
                    reason: FailureReason::Handler {
                        error: source.to_string(),
                    },
                });
            }
            Err(other) => {
                // Unknown action/component slipping past validation means a
                // concurrent unregistration; report it like a handler-level
                // failure.
                warn!(error = %other, "Dispatch failed after validation");
                report.failures.push(TurnFailure {
                    request_id: request.id,
                    action: request.action.clone(),
                    reason: FailureReason::Handler {
                        error: other.to_string(),
                    },
                });
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscriber is fine; the stream is advisory.
        let _ = self.events.send(event);
    }
}

/// The corrected reply should resend the same logical action: prefer the
/// first request with the matching action name, else take the first one.
fn pick_replacement(requests: Vec<ActionRequest>, action: &str) -> Option<ActionRequest> {
    let mut requests = requests;
    if let Some(pos) = requests.iter().position(|r| r.action == action) {
        return Some(requests.swap_remove(pos));
    }
    requests.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::component::{Component, ComponentDescriptor};
    use crate::error::HandlerError;
    use crate::events::InMemoryEventStore;
    use crate::schema::ActionSchema;
    use crate::types::{ComponentKind, HandlerOutput, Payload};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingInterface {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Component for RecordingInterface {
        fn descriptor(&self) -> ComponentDescriptor {
            ComponentDescriptor::new("courier", ComponentKind::Interface)
                .with_schema(
                    ActionSchema::new("send_text")
                        .require("text")
                        .optional_field("reply_to"),
                )
                .with_marker_field("courier_chat")
        }

        async fn handle(
            &self,
            _action: &str,
            payload: &Payload,
        ) -> Result<HandlerOutput, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HandlerError::Unavailable("courier offline".to_string()));
            }
            let text = payload
                .get("text")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("");
            Ok(HandlerOutput::text(format!("delivered: {}", text)))
        }
    }

    struct Setup {
        pipeline: TurnPipeline,
        calls: Arc<AtomicUsize>,
        backend: Arc<ScriptedBackend>,
        store: Arc<InMemoryEventStore>,
    }

    fn setup_with(backend: ScriptedBackend, fail_handler: bool, budget: u32) -> Setup {
        let registry = Arc::new(ComponentRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(Arc::new(RecordingInterface {
            calls: Arc::clone(&calls),
            fail: fail_handler,
        }));

        let store = Arc::new(InMemoryEventStore::new());
        let backend = Arc::new(backend);
        let config = PipelineConfig {
            correction_budget: budget,
            default_interface: None,
        };
        let pipeline = TurnPipeline::new(
            registry,
            Arc::clone(&store) as Arc<dyn ScheduledEventStore>,
            Arc::clone(&backend) as Arc<dyn ReasoningBackend>,
            &config,
        );
        Setup {
            pipeline,
            calls,
            backend,
            store,
        }
    }

    fn origin() -> MessageOrigin {
        MessageOrigin::from("courier:42")
    }

    #[tokio::test]
    async fn test_clean_turn_dispatches() {
        let s = setup_with(ScriptedBackend::new(), false, 3);
        let reply = "```json\n{\"action\": \"send_text\", \"text\": \"hi\"}\n```";

        let report = s.pipeline.process_reply(&origin(), reply).await;

        assert!(report.is_clean());
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.dispatched[0].component, "courier");
        assert_eq!(s.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sole_interface_resolution_fills_target() {
        let s = setup_with(ScriptedBackend::new(), false, 3);
        // No interface in the block and no hint: rule 3 fires (one
        // registered interface).
        let reply = "{\"action\": \"send_text\", \"text\": \"hi\"}";

        let report = s.pipeline.process_reply(&origin(), reply).await;
        assert_eq!(report.dispatched.len(), 1);
    }

    #[tokio::test]
    async fn test_correction_round_fixes_request() {
        let backend = ScriptedBackend::with_replies([
            "Apologies. ```json\n{\"action\": \"send_text\", \"text\": \"hi again\"}\n```",
        ]);
        let s = setup_with(backend, false, 3);

        // Missing required text: one correction round, then dispatch.
        let reply = "```json\n{\"action\": \"send_text\"}\n```";
        let report = s.pipeline.process_reply(&origin(), reply).await;

        assert_eq!(report.dispatched.len(), 1);
        assert!(report.failures.is_empty());
        assert_eq!(s.calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_reports_abandonment_once() {
        // Every corrected reply is still broken.
        let broken = "```json\n{\"action\": \"send_text\"}\n```";
        let backend = ScriptedBackend::with_replies([broken, broken, broken, broken, broken]);
        let s = setup_with(backend, false, 3);

        let report = s.pipeline.process_reply(&origin(), broken).await;

        assert!(report.dispatched.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].reason,
            FailureReason::BudgetExhausted { attempts: 3 }
        );
        assert_eq!(s.calls.load(Ordering::SeqCst), 0);
        // Exactly budget correction rounds consulted the backend.
        assert_eq!(s.backend.remaining(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_action_never_enters_correction() {
        let backend = ScriptedBackend::with_replies(["should never be consumed"]);
        let s = setup_with(backend, false, 3);

        let reply = "```json\n{\"action\": \"unknown_action\", \"text\": \"x\"}\n```";
        let report = s.pipeline.process_reply(&origin(), reply).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].reason, FailureReason::UnsupportedAction);
        assert_eq!(s.backend.remaining(), 1);
    }

    #[tokio::test]
    async fn test_handler_failure_surfaced_not_retried() {
        let s = setup_with(ScriptedBackend::new(), true, 3);
        let reply = "```json\n{\"action\": \"send_text\", \"text\": \"hi\"}\n```";

        let report = s.pipeline.process_reply(&origin(), reply).await;

        assert!(report.dispatched.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].reason,
            FailureReason::Handler { .. }
        ));
        assert_eq!(s.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_unavailable_abandons() {
        let s = setup_with(ScriptedBackend::new(), false, 3);
        let reply = "```json\n{\"action\": \"send_text\"}\n```";

        let report = s.pipeline.process_reply(&origin(), reply).await;

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].reason,
            FailureReason::BackendUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_multiple_requests_processed_in_order() {
        let s = setup_with(ScriptedBackend::new(), false, 3);
        let reply = r#"```json
{"action": "send_text", "text": "one"}
```
```json
{"action": "send_text", "text": "two"}
```"#;

        let report = s.pipeline.process_reply(&origin(), reply).await;
        assert_eq!(report.dispatched.len(), 2);
        assert_eq!(report.dispatched[0].output.summary, "delivered: one");
        assert_eq!(report.dispatched[1].output.summary, "delivered: two");
    }

    #[tokio::test]
    async fn test_budget_shared_across_requests_in_turn() {
        // Two broken requests, budget 1: the first burns the whole budget,
        // the second abandons with zero attempts.
        let broken = "```json\n{\"action\": \"send_text\"}\n```";
        let backend = ScriptedBackend::with_replies([broken, broken]);
        let s = setup_with(backend, false, 1);

        let reply = r#"```json
{"action": "send_text"}
```
```json
{"action": "send_text"}
```"#;
        let report = s.pipeline.process_reply(&origin(), reply).await;

        assert_eq!(report.failures.len(), 2);
        assert_eq!(
            report.failures[0].reason,
            FailureReason::BudgetExhausted { attempts: 1 }
        );
        assert_eq!(
            report.failures[1].reason,
            FailureReason::BudgetExhausted { attempts: 0 }
        );
    }

    #[tokio::test]
    async fn test_event_provenance_survives_correction() {
        let event_reply =
            "```json\n{\"action\": \"send_text\", \"text\": \"reminder: standup\"}\n```";
        let backend = ScriptedBackend::with_replies([event_reply]);
        let s = setup_with(backend, false, 3);

        let event = s.store.create("standup".to_string(), Timestamp(0));
        // Original carries the event id but misses text; the corrected
        // reply omits the event id.
        let reply = format!(
            "```json\n{{\"action\": \"send_text\", \"event_id\": \"{}\"}}\n```",
            event.id
        );

        let report = s.pipeline.process_reply(&origin(), &reply).await;
        assert_eq!(report.dispatched.len(), 1);

        let after = s.store.get(event.id).unwrap();
        assert!(after.delivered);
        assert!(after.completed);
    }

    #[tokio::test]
    async fn test_audit_events_emitted() {
        let s = setup_with(ScriptedBackend::new(), false, 3);
        let mut events = s.pipeline.subscribe();

        let reply = "```json\n{\"action\": \"send_text\", \"text\": \"hi\"}\n```";
        s.pipeline.process_reply(&origin(), reply).await;

        let mut saw_extracted = false;
        let mut saw_dispatched = false;
        while let Ok(event) = events.try_recv() {
            match event {
                PipelineEvent::ActionsExtracted { .. } => saw_extracted = true,
                PipelineEvent::ActionDispatched { .. } => saw_dispatched = true,
                _ => {}
            }
        }
        assert!(saw_extracted);
        assert!(saw_dispatched);
    }

    #[test]
    fn test_pick_replacement_prefers_matching_action() {
        let other = ActionRequest::new("save_note");
        let matching = ActionRequest::new("send_text");
        let picked =
            pick_replacement(vec![other.clone(), matching.clone()], "send_text").unwrap();
        assert_eq!(picked.id, matching.id);
    }

    #[test]
    fn test_pick_replacement_falls_back_to_first() {
        let other = ActionRequest::new("save_note");
        let picked = pick_replacement(vec![other.clone()], "send_text").unwrap();
        assert_eq!(picked.id, other.id);
        assert!(pick_replacement(vec![], "send_text").is_none());
    }
}
