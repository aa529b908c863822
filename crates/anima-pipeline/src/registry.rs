//! Component registry: the single holder of component descriptors and
//! action ownership.
//!
//! Constructed once at startup, mutated only through `register` /
//! `unregister`, and shared by `Arc`. No other part of the system may hold
//! component knowledge independently.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use crate::component::{Component, ComponentDescriptor};
use crate::schema::ActionSchema;
use crate::types::ComponentKind;

struct Registered {
    descriptor: ComponentDescriptor,
    handler: Arc<dyn Component>,
}

#[derive(Default)]
struct RegistryState {
    components: HashMap<String, Registered>,
    /// Action type -> owning component names, in registration order. An
    /// action may be supported by more than one component; the first entry
    /// is the primary owner.
    owners: HashMap<String, Vec<String>>,
}

/// Registry of every action-capable component and the action schemas each
/// exposes.
///
/// One `RwLock` guards the component map and the ownership index together,
/// so readers never observe a descriptor without its ownership entries (or
/// the reverse). Registration and unregistration take effect immediately
/// for validation and dispatch; there is no separate rebuild step.
pub struct ComponentRegistry {
    inner: RwLock<RegistryState>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryState::default()),
        }
    }

    /// Register a component, replacing any previous registration under the
    /// same name. The descriptor is snapshotted once here.
    pub fn register(&self, component: Arc<dyn Component>) {
        let descriptor = component.descriptor();
        let name = descriptor.name.clone();
        let actions = descriptor.action_types();

        // HashMap/Vec ops below cannot panic mid-update, so recovering a
        // poisoned lock cannot expose a half-applied registration.
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if state.components.contains_key(&name) {
            warn!(component = %name, "Re-registering component; replacing descriptor");
            purge_ownership(&mut state, &name);
        }

        for action in &actions {
            let entry = state.owners.entry(action.clone()).or_default();
            if entry.len() > 1 || (entry.len() == 1 && entry[0] != name) {
                warn!(
                    action = %action,
                    component = %name,
                    "Action type already owned by another component; keeping both"
                );
            }
            entry.push(name.clone());
        }

        info!(
            component = %name,
            kind = %descriptor.kind,
            actions = actions.len(),
            "Component registered"
        );

        state.components.insert(
            name,
            Registered {
                descriptor,
                handler: component,
            },
        );
    }

    /// Remove a component and purge every action ownership entry it holds.
    ///
    /// Returns `false` if no component with that name was registered. After
    /// this call, any action type only this component supported reports
    /// "unsupported".
    pub fn unregister(&self, name: &str) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.components.remove(name).is_none() {
            return false;
        }
        purge_ownership(&mut state, name);
        info!(component = %name, "Component unregistered");
        true
    }

    /// The primary (first-registered) owner of an action type.
    pub fn owner_of(&self, action: &str) -> Option<String> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .owners
            .get(action)
            .and_then(|owners| owners.first().cloned())
    }

    /// Every component supporting an action type, in registration order.
    pub fn owners_of(&self, action: &str) -> Vec<String> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.owners.get(action).cloned().unwrap_or_default()
    }

    /// The current union of supported action types, sorted.
    pub fn supported_action_types(&self) -> Vec<String> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<String> = state.owners.keys().cloned().collect();
        types.sort();
        types
    }

    /// Schema for an action as declared by a specific owner.
    pub fn schema_of(&self, owner: &str, action: &str) -> Option<ActionSchema> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .components
            .get(owner)
            .and_then(|r| r.descriptor.schema_for(action).cloned())
    }

    /// Schema for an action as declared by its primary owner.
    pub fn schema_for(&self, action: &str) -> Option<ActionSchema> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let owner = state.owners.get(action)?.first()?;
        state
            .components
            .get(owner)
            .and_then(|r| r.descriptor.schema_for(action).cloned())
    }

    /// Handler handle for a component, if registered.
    pub fn handler_for(&self, component: &str) -> Option<Arc<dyn Component>> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.components.get(component).map(|r| Arc::clone(&r.handler))
    }

    /// Descriptor snapshot for a component, if registered.
    pub fn descriptor_of(&self, component: &str) -> Option<ComponentDescriptor> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.components.get(component).map(|r| r.descriptor.clone())
    }

    /// Descriptors of every registered interface, in no particular order.
    /// A registered interface is an active interface.
    pub fn interfaces(&self) -> Vec<ComponentDescriptor> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .components
            .values()
            .filter(|r| r.descriptor.kind == ComponentKind::Interface)
            .map(|r| r.descriptor.clone())
            .collect()
    }

    /// True if `name` is a registered interface.
    pub fn is_interface(&self, name: &str) -> bool {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .components
            .get(name)
            .is_some_and(|r| r.descriptor.kind == ComponentKind::Interface)
    }

    /// Prompt-authoring hint for an action, from its primary owner.
    pub fn prompt_hint(&self, action: &str) -> Option<String> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let owner = state.owners.get(action)?.first()?;
        state
            .components
            .get(owner)
            .and_then(|r| r.descriptor.prompt_hints.get(action).cloned())
    }

    pub fn len(&self) -> usize {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn purge_ownership(state: &mut RegistryState, component: &str) {
    state
        .owners
        .retain(|_, owners| {
            owners.retain(|o| o != component);
            !owners.is_empty()
        });
}
