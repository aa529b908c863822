//! Target-interface inference for requests that omit one.
//!
//! Resolution runs a strict priority ladder and stops at the first rule
//! that succeeds. Failure is not fatal: an unresolved target becomes the
//! `missing required field: interface` validation violation and enters the
//! correction protocol instead of being dropped.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::registry::ComponentRegistry;
use crate::types::ActionRequest;

/// Which rule produced a resolution. Logged on every outcome for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionRule {
    /// Explicit contextual hint bundled with the originating message.
    ContextHint,
    /// A marker attribute only one registered interface's messages carry.
    MarkerAttribute,
    /// Exactly one interface is registered overall.
    SoleActiveInterface,
    /// The configured last-resort default.
    ConfiguredDefault,
}

impl fmt::Display for ResolutionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionRule::ContextHint => write!(f, "context_hint"),
            ResolutionRule::MarkerAttribute => write!(f, "marker_attribute"),
            ResolutionRule::SoleActiveInterface => write!(f, "sole_active_interface"),
            ResolutionRule::ConfiguredDefault => write!(f, "configured_default"),
        }
    }
}

/// Fills in a request's target interface from context, in priority order.
pub struct InterfaceResolver {
    registry: Arc<ComponentRegistry>,
    default_interface: Option<String>,
}

impl InterfaceResolver {
    pub fn new(registry: Arc<ComponentRegistry>, default_interface: Option<String>) -> Self {
        Self {
            registry,
            default_interface,
        }
    }

    /// Attempt resolution for a request with no target. Returns the rule
    /// that fired, or `None` when the request already had a target or no
    /// rule succeeded.
    pub fn resolve(&self, request: &mut ActionRequest) -> Option<ResolutionRule> {
        if let Some(interface) = request.interface.as_deref() {
            debug!(
                request_id = %request.id,
                interface,
                "Resolution skipped: target already present"
            );
            return None;
        }

        let resolved = self
            .from_context_hint(request)
            .or_else(|| self.from_marker_attribute(request))
            .or_else(|| self.from_sole_active(request))
            .or_else(|| self.from_configured_default(request));

        match &resolved {
            Some(rule) => debug!(
                request_id = %request.id,
                action = %request.action,
                interface = request.interface.as_deref().unwrap_or(""),
                rule = %rule,
                "Target interface resolved"
            ),
            None => debug!(
                request_id = %request.id,
                action = %request.action,
                "Target interface unresolved; deferring to validation"
            ),
        }
        resolved
    }

    /// Rule 1: an explicit hint bundled with the originating message. A
    /// hint naming an unregistered interface is stale (e.g. a transport
    /// disabled at runtime) and falls through to the next rule.
    fn from_context_hint(&self, request: &mut ActionRequest) -> Option<ResolutionRule> {
        let hint = request.origin.as_ref()?.interface_hint.clone()?;
        if self.registry.is_interface(&hint) {
            request.interface = Some(hint);
            Some(ResolutionRule::ContextHint)
        } else {
            debug!(hint = %hint, "Context hint names an unregistered interface; ignoring");
            None
        }
    }

    /// Rule 2: exactly one registered interface whose marker attribute
    /// appears on the originating message.
    fn from_marker_attribute(&self, request: &mut ActionRequest) -> Option<ResolutionRule> {
        let attributes = &request.origin.as_ref()?.attributes;
        if attributes.is_empty() {
            return None;
        }

        let mut matches = self
            .registry
            .interfaces()
            .into_iter()
            .filter(|desc| {
                desc.marker_field
                    .as_deref()
                    .is_some_and(|field| attributes.contains_key(field))
            })
            .map(|desc| desc.name);

        let first = matches.next()?;
        if matches.next().is_some() {
            debug!("Marker attribute matches multiple interfaces; ambiguous, skipping rule");
            return None;
        }
        request.interface = Some(first);
        Some(ResolutionRule::MarkerAttribute)
    }

    /// Rule 3: exactly one interface is registered at all.
    fn from_sole_active(&self, request: &mut ActionRequest) -> Option<ResolutionRule> {
        let interfaces = self.registry.interfaces();
        if interfaces.len() == 1 {
            request.interface = Some(interfaces[0].name.clone());
            Some(ResolutionRule::SoleActiveInterface)
        } else {
            None
        }
    }

    /// Rule 4: the configured default, when it names a registered
    /// interface.
    fn from_configured_default(&self, request: &mut ActionRequest) -> Option<ResolutionRule> {
        let default = self.default_interface.clone()?;
        if self.registry.is_interface(&default) {
            request.interface = Some(default);
            Some(ResolutionRule::ConfiguredDefault)
        } else {
            debug!(default = %default, "Configured default interface is not registered");
            None
        }
    }
}
