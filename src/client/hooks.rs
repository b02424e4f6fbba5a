//! Lifecycle event hooks
//!
//! A registry owned by each façade maps (target, event) to handlers run in
//! registration order. Pre-event handlers run before the round trip and can
//! veto it by returning an error. Post-event handlers run after the write has
//! committed; their failures are logged and never turn the operation into an
//! error.

use crate::error::{OgmError, OgmResult};
use crate::graph::EntityKind;
use crate::session::Entity;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreAdd,
    PostAdd,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PreAdd => "pre_add",
            EventKind::PostAdd => "post_add",
            EventKind::PreUpdate => "pre_update",
            EventKind::PostUpdate => "post_update",
            EventKind::PreDelete => "pre_delete",
            EventKind::PostDelete => "post_delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entities a handler receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookTarget {
    Label(String),
    AnyVertex,
    AnyEdge,
    Any,
}

impl HookTarget {
    fn matches(&self, entity: &Entity) -> bool {
        match self {
            HookTarget::Label(label) => entity.label() == label,
            HookTarget::AnyVertex => entity.kind() == EntityKind::Vertex,
            HookTarget::AnyEdge => entity.kind() == EntityKind::Edge,
            HookTarget::Any => true,
        }
    }
}

pub type HookFn = Arc<dyn Fn(&Entity, EventKind) -> OgmResult<()> + Send + Sync>;

struct Registration {
    target: HookTarget,
    event: EventKind,
    handler: HookFn,
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Registration>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, target: HookTarget, event: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&Entity, EventKind) -> OgmResult<()> + Send + Sync + 'static,
    {
        self.hooks.push(Registration {
            target,
            event,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run matching handlers in registration order; the first failure stops
    /// dispatch and is reported as a hook error naming the entity
    pub fn dispatch(&self, entity: &Entity, event: EventKind) -> OgmResult<()> {
        for hook in self.matching(entity, event) {
            (hook.handler)(entity, event).map_err(|e| hook_error(entity, event, e))?;
        }
        Ok(())
    }

    /// Run every matching handler, collecting failures instead of stopping
    pub fn notify(&self, entity: &Entity, event: EventKind) -> Vec<OgmError> {
        self.matching(entity, event)
            .filter_map(|hook| (hook.handler)(entity, event).err())
            .map(|e| hook_error(entity, event, e))
            .collect()
    }

    fn matching<'a>(&'a self, entity: &'a Entity, event: EventKind) -> impl Iterator<Item = &'a Registration> + 'a {
        self.hooks
            .iter()
            .filter(move |h| h.event == event && h.target.matches(entity))
    }
}

fn hook_error(entity: &Entity, event: EventKind, error: OgmError) -> OgmError {
    match error {
        OgmError::Hook { .. } => error,
        other => OgmError::Hook {
            event: event.as_str(),
            entity: entity.describe(),
            reason: other.to_string(),
        },
    }
}
