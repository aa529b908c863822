//! Declared payload shapes for action types.
//!
//! A schema names the required and optional fields of one action type and
//! may carry a cross-field predicate for invariants a field list cannot
//! express.

use crate::types::Payload;
use std::fmt;
use std::sync::Arc;

/// Cross-field invariant check. Returns one message per failed invariant;
/// an empty vec means the predicate holds.
pub type SchemaPredicate = Arc<dyn Fn(&Payload) -> Vec<String> + Send + Sync>;

/// The declared shape of one action type's payload.
///
/// Immutable once registered; replacing a component's schema requires
/// re-registering the component.
#[derive(Clone)]
pub struct ActionSchema {
    pub name: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub description: String,
    pub predicate: Option<SchemaPredicate>,
}

impl ActionSchema {
    /// Create a schema with no fields. Chain builder methods to fill it in.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            optional: Vec::new(),
            description: String::new(),
            predicate: None,
        }
    }

    /// Add a required field. Order is preserved in violation reports.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Add an optional field.
    #[must_use]
    pub fn optional_field(mut self, field: impl Into<String>) -> Self {
        self.optional.push(field.into());
        self
    }

    /// Set the human-readable description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a cross-field predicate for invariants such as
    /// "start must precede end".
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Payload) -> Vec<String> + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// True if the field is declared (required or optional).
    pub fn declares(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field) || self.optional.iter().any(|f| f == field)
    }
}

impl fmt::Debug for ActionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSchema")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("description", &self.description)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
