//! Per-entity change tracking
//!
//! A tracker holds the entity's identity, the last property values known to
//! be in the database, and the set of fields that differ from them. It does
//! no I/O; the façade calls `assign`, `reconcile` and `revoke` after the
//! matching round trip succeeds.

use crate::error::{OgmError, OgmResult};
use crate::graph::{EntityIdentity, PropertyMap, PropertyValue};
use std::collections::BTreeSet;

/// Lifecycle state of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// No identity yet
    Transient,
    /// Identity assigned, properties match the snapshot
    Clean,
    /// Identity assigned, at least one field differs from the snapshot
    Dirty,
    /// Identity revoked; further mutation is an error
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeTracker {
    identity: Option<EntityIdentity>,
    snapshot: PropertyMap,
    dirty: BTreeSet<String>,
    deleted: bool,
}

impl ChangeTracker {
    pub fn transient() -> Self {
        Self::default()
    }

    /// Tracker for an entity just read from the database
    pub fn persistent(identity: EntityIdentity, snapshot: PropertyMap) -> Self {
        ChangeTracker {
            identity: Some(identity),
            snapshot,
            dirty: BTreeSet::new(),
            deleted: false,
        }
    }

    pub fn state(&self) -> EntityState {
        if self.deleted {
            EntityState::Deleted
        } else if self.identity.is_none() {
            EntityState::Transient
        } else if self.dirty.is_empty() {
            EntityState::Clean
        } else {
            EntityState::Dirty
        }
    }

    /// Current identity; None while transient and after deletion
    pub fn identity(&self) -> Option<&EntityIdentity> {
        if self.deleted {
            None
        } else {
            self.identity.as_ref()
        }
    }

    /// Identity the entity had, including a revoked one
    pub fn last_identity(&self) -> Option<&EntityIdentity> {
        self.identity.as_ref()
    }

    /// Property values last known to be stored
    pub fn snapshot(&self) -> &PropertyMap {
        &self.snapshot
    }

    /// Fields changed since the last snapshot
    pub fn dirty_fields(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    /// Record a mutation of `field`. A field set back to its snapshot value
    /// is clean again; transient entities have nothing to compare against.
    pub fn mark_dirty(&mut self, field: &str, current: &PropertyMap) {
        if self.identity.is_none() || self.deleted {
            return;
        }
        if value_of(&self.snapshot, field).same_value(value_of(current, field)) {
            self.dirty.remove(field);
        } else {
            self.dirty.insert(field.to_string());
        }
    }

    /// After a successful update: `current` becomes the snapshot
    pub fn reconcile(&mut self, current: &PropertyMap) {
        self.snapshot = current.clone();
        self.dirty.clear();
    }

    /// Replace the snapshot with freshly read values, keeping local changes
    /// to dirty fields that still differ from them
    pub fn rebase(&mut self, snapshot: PropertyMap, current: &PropertyMap) {
        self.snapshot = snapshot;
        let fields: Vec<String> = self.dirty.iter().cloned().collect();
        for field in fields {
            self.mark_dirty(&field, current);
        }
    }

    /// Transient -> Clean after a successful create
    pub fn assign(&mut self, identity: EntityIdentity, current: &PropertyMap) -> OgmResult<()> {
        if self.deleted {
            return Err(OgmError::state(describe(self), "entity was deleted"));
        }
        if let Some(existing) = &self.identity {
            return Err(OgmError::state(existing.to_string(), "entity is already persisted"));
        }
        self.identity = Some(identity);
        self.reconcile(current);
        Ok(())
    }

    /// Persistent -> Deleted after a successful delete
    pub fn revoke(&mut self) -> OgmResult<EntityIdentity> {
        match (&self.identity, self.deleted) {
            (_, true) => Err(OgmError::state(describe(self), "entity was already deleted")),
            (None, false) => Err(OgmError::state("transient entity", "entity has no graph identity")),
            (Some(identity), false) => {
                let identity = identity.clone();
                self.deleted = true;
                self.dirty.clear();
                Ok(identity)
            }
        }
    }
}

fn value_of<'a>(map: &'a PropertyMap, field: &str) -> &'a PropertyValue {
    static NULL: PropertyValue = PropertyValue::Null;
    map.get(field).unwrap_or(&NULL)
}

fn describe(tracker: &ChangeTracker) -> String {
    tracker
        .identity
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "transient entity".to_string())
}
