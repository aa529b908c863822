//! Schema validation of action requests.
//!
//! Collects every violation for a request in one pass so the correction
//! protocol can build a single coherent correction message per turn. The
//! one short-circuit is an unsupported action type: with no owning
//! component there is no schema to correct toward.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::registry::ComponentRegistry;
use crate::schema::ActionSchema;
use crate::types::{ActionRequest, Violation};

/// Validates one action request against the schemas held by the registry.
pub struct Validator {
    registry: Arc<ComponentRegistry>,
}

impl Validator {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Validate a request. An empty result means "eligible for dispatch".
    ///
    /// All violations are collected together; callers must not assume the
    /// first entry is the only one.
    pub fn validate(&self, request: &ActionRequest) -> Vec<Violation> {
        let action = request.action.as_str();

        let owners = self.registry.owners_of(action);
        if owners.is_empty() {
            debug!(action, "Validation: unsupported action type");
            return vec![Violation::unsupported(action)];
        }

        let mut violations = Vec::new();

        // The target interface is required on every request once resolution
        // has run; a missing target is a correctable violation, not a drop.
        match request.interface.as_deref() {
            None => violations.push(Violation::missing_field(action, "interface")),
            Some(name) if !self.registry.is_interface(name) => {
                violations.push(Violation::unknown_interface(action, name));
            }
            Some(_) => {}
        }

        if let Some(schema) = self.schema_for_request(request, &owners) {
            for field in &schema.required {
                match request.payload.get(field) {
                    None => violations.push(Violation::missing_field(action, field)),
                    Some(value) if is_empty_value(value) => {
                        violations.push(Violation::empty_field(action, field));
                    }
                    Some(_) => {}
                }
            }

            if let Some(predicate) = &schema.predicate {
                for message in predicate(&request.payload) {
                    violations.push(Violation::predicate(action, message));
                }
            }
        }

        if !violations.is_empty() {
            debug!(
                action,
                request_id = %request.id,
                count = violations.len(),
                "Validation failed"
            );
        }
        violations
    }

    /// The schema to validate against: the resolved interface's own
    /// declaration when it supports the action, otherwise the primary
    /// owner's.
    fn schema_for_request(
        &self,
        request: &ActionRequest,
        owners: &[String],
    ) -> Option<ActionSchema> {
        if let Some(interface) = request.interface.as_deref() {
            if owners.iter().any(|o| o == interface) {
                if let Some(schema) = self.registry.schema_of(interface, &request.action) {
                    return Some(schema);
                }
            }
        }
        self.registry.schema_for(&request.action)
    }
}

/// A required field present with one of these values still violates the
/// schema: required fields are never empty/null at validation time.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentDescriptor};
    use crate::error::HandlerError;
    use crate::types::{ComponentKind, HandlerOutput, Payload, ViolationKind};
    use async_trait::async_trait;

    struct TestInterface;

    #[async_trait]
    impl Component for TestInterface {
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
            _payload: &Payload,
        ) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::text("sent"))
        }
    }

    struct TestProvider;

    #[async_trait]
    impl Component for TestProvider {
        fn descriptor(&self) -> ComponentDescriptor {
            ComponentDescriptor::new("reminders", ComponentKind::Provider).with_schema(
                ActionSchema::new("schedule_window")
                    .require("message")
                    .require("start")
                    .require("end")
                    .with_predicate(|p| {
                        let start = p.get("start").and_then(Value::as_str).unwrap_or("");
                        let end = p.get("end").and_then(Value::as_str).unwrap_or("");
                        if !start.is_empty() && !end.is_empty() && start >= end {
                            vec!["start must precede end".to_string()]
                        } else {
                            vec![]
                        }
                    }),
            )
        }

        async fn handle(
            &self,
            _action: &str,
            _payload: &Payload,
        ) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::text("scheduled"))
        }
    }

    fn make_validator() -> Validator {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register(Arc::new(TestInterface));
        registry.register(Arc::new(TestProvider));
        Validator::new(registry)
    }

    fn text_request(interface: Option<&str>, text: Option<Value>) -> ActionRequest {
        let mut req = ActionRequest::new("send_text");
        req.interface = interface.map(|s| s.to_string());
        if let Some(value) = text {
            req.payload.insert("text".to_string(), value);
        }
        req
    }

    #[test]
    fn test_valid_request_passes() {
        let validator = make_validator();
        let req = text_request(Some("courier"), Some(Value::String("hi".to_string())));
        assert!(validator.validate(&req).is_empty());
    }

    #[test]
    fn test_unsupported_action_single_violation() {
        let validator = make_validator();
        let req = ActionRequest::new("unknown_action");
        let violations = validator.validate(&req);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::UnsupportedAction);
        assert!(violations[0].message.contains("unsupported action type"));
    }

    #[test]
    fn test_missing_required_field_named_exactly() {
        let validator = make_validator();
        let req = text_request(Some("courier"), None);
        let violations = validator.validate(&req);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::MissingField);
        assert_eq!(violations[0].field.as_deref(), Some("text"));
    }

    #[test]
    fn test_fix_then_pass_round_trip() {
        let validator = make_validator();
        let mut req = text_request(Some("courier"), None);
        assert!(!validator.validate(&req).is_empty());

        req.payload
            .insert("text".to_string(), Value::String("hello".to_string()));
        assert!(validator.validate(&req).is_empty());
    }

    #[test]
    fn test_empty_values_rejected() {
        let validator = make_validator();
        for value in [
            Value::Null,
            Value::String(String::new()),
            Value::String("   ".to_string()),
            Value::Array(vec![]),
            Value::Object(serde_json::Map::new()),
        ] {
            let req = text_request(Some("courier"), Some(value.clone()));
            let violations = validator.validate(&req);
            assert_eq!(violations.len(), 1, "value {:?} should be empty", value);
            assert_eq!(violations[0].kind, ViolationKind::EmptyField);
        }
    }

    #[test]
    fn test_non_string_values_count_as_present() {
        let validator = make_validator();
        let req = text_request(Some("courier"), Some(Value::from(42)));
        assert!(validator.validate(&req).is_empty());
    }

    #[test]
    fn test_missing_interface_is_violation() {
        let validator = make_validator();
        let req = text_request(None, Some(Value::String("hi".to_string())));
        let violations = validator.validate(&req);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::MissingField);
        assert_eq!(violations[0].field.as_deref(), Some("interface"));
    }

    #[test]
    fn test_unknown_interface_is_violation() {
        let validator = make_validator();
        let req = text_request(Some("pager"), Some(Value::String("hi".to_string())));
        let violations = validator.validate(&req);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::UnknownInterface);
    }

    #[test]
    fn test_all_violations_collected_together() {
        let validator = make_validator();
        // No interface AND no text: both must be reported at once.
        let req = text_request(None, None);
        let violations = validator.validate(&req);

        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .any(|v| v.field.as_deref() == Some("interface")));
        assert!(violations.iter().any(|v| v.field.as_deref() == Some("text")));
    }

    #[test]
    fn test_predicate_violations_appended() {
        let validator = make_validator();
        let mut req = ActionRequest::new("schedule_window");
        req.interface = Some("courier".to_string());
        req.payload
            .insert("message".to_string(), Value::String("standup".to_string()));
        req.payload
            .insert("start".to_string(), Value::String("11:00".to_string()));
        req.payload
            .insert("end".to_string(), Value::String("10:00".to_string()));

        let violations = validator.validate(&req);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::PredicateFailed);
        assert_eq!(violations[0].message, "start must precede end");
    }

    #[test]
    fn test_predicate_runs_alongside_field_checks() {
        let validator = make_validator();
        let mut req = ActionRequest::new("schedule_window");
        req.interface = Some("courier".to_string());
        // message missing, start/end inverted: both classes reported.
        req.payload
            .insert("start".to_string(), Value::String("11:00".to_string()));
        req.payload
            .insert("end".to_string(), Value::String("10:00".to_string()));

        let violations = validator.validate(&req);
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::MissingField));
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::PredicateFailed));
    }

    #[test]
    fn test_unregistering_component_makes_action_unsupported() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register(Arc::new(TestInterface));
        let validator = Validator::new(Arc::clone(&registry));

        let req = text_request(Some("courier"), Some(Value::String("hi".to_string())));
        assert!(validator.validate(&req).is_empty());

        registry.unregister("courier");
        let violations = validator.validate(&req);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::UnsupportedAction);
    }
}
