//! Dispatch of validated requests to their owning components.
//!
//! Exactly one handler invocation per validated request. No automatic
//! retry lives here: retries happen one level up, as the model re-issuing
//! a corrected request through the correction protocol.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::events::EventCompletionTracker;
use crate::registry::ComponentRegistry;
use crate::types::{ActionRequest, DispatchRecord};

/// Routes a validated action to the single component that handles it.
pub struct Dispatcher {
    registry: Arc<ComponentRegistry>,
    tracker: EventCompletionTracker,
    dispatched: Mutex<HashSet<Uuid>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ComponentRegistry>, tracker: EventCompletionTracker) -> Self {
        Self {
            registry,
            tracker,
            dispatched: Mutex::new(HashSet::new()),
        }
    }

    /// Dispatch one validated request.
    ///
    /// The request id is recorded before the handler runs, so a repeated
    /// dispatch of the same request returns `AlreadyDispatched` without
    /// touching the handler — including when the first invocation failed.
    pub async fn dispatch(&self, request: &ActionRequest) -> Result<DispatchRecord, DispatchError> {
        {
            let mut seen = self.dispatched.lock().unwrap();
            if !seen.insert(request.id) {
                warn!(request_id = %request.id, "Duplicate dispatch suppressed");
                return Err(DispatchError::AlreadyDispatched(request.id));
            }
        }

        let owners = self.registry.owners_of(&request.action);
        if owners.is_empty() {
            return Err(DispatchError::UnknownAction(request.action.clone()));
        }

        // When the resolved interface itself supports the action (e.g. two
        // interfaces both expose send_text), it is the owner; otherwise the
        // primary owner handles it.
        let owner = request
            .interface
            .as_deref()
            .filter(|interface| owners.iter().any(|o| o == interface))
            .map(str::to_string)
            .unwrap_or_else(|| owners[0].clone());

        let handler = self
            .registry
            .handler_for(&owner)
            .ok_or_else(|| DispatchError::UnknownComponent(owner.clone()))?;

        let output = handler
            .handle(&request.action, &request.payload)
            .await
            .map_err(|source| DispatchError::Handler {
                component: owner.clone(),
                source,
            })?;

        // Delivery of a scheduled event: acknowledge fire-and-forget.
        if let Some(event_id) = request.event_id {
            self.tracker.acknowledge(event_id);
        }

        info!(
            request_id = %request.id,
            action = %request.action,
            component = %owner,
            "Action dispatched"
        );

        Ok(DispatchRecord {
            request_id: request.id,
            action: request.action.clone(),
            component: owner,
            output,
        })
    }
}
