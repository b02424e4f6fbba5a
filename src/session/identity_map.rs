//! Session-scoped identity map
//!
//! Entities live in an arena and are addressed by `EntityKey`. Persisted
//! entities are also indexed by identity, so reading the same vertex twice
//! yields the same key instead of two diverging copies.
//!
//! Evicting an entity empties its slot; clearing the session moves the key
//! base past every slot handed out so far. Keys are never reused, so a stale
//! key fails to resolve instead of reaching some other entity.

use super::entity::Entity;
use super::tracker::EntityState;
use crate::error::{OgmError, OgmResult};
use crate::graph::{EdgeRecord, EntityIdentity, EntityKind, GraphId, PropertyMap, VertexRecord};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Handle to an entity tracked by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(usize);

impl EntityKey {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Session {
    base: usize,
    slots: Vec<Option<Entity>>,
    by_identity: FxHashMap<EntityIdentity, EntityKey>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entities, deleted ones included
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Start tracking an entity. A persisted entity whose identity is already
    /// tracked is merged into the existing entry.
    pub fn track(&mut self, entity: Entity) -> EntityKey {
        if let Some(identity) = entity.identity() {
            if let Some(key) = self.by_identity.get(identity).copied() {
                if let Ok(existing) = self.get_mut(key) {
                    existing.refresh(entity.properties().clone());
                    return key;
                }
            }
        }
        let key = EntityKey(self.base + self.slots.len());
        if let Some(identity) = entity.identity() {
            self.by_identity.insert(identity.clone(), key);
        }
        self.slots.push(Some(entity));
        key
    }

    pub fn lookup(&self, identity: &EntityIdentity) -> Option<EntityKey> {
        self.by_identity.get(identity).copied()
    }

    /// Lookup-or-insert for a vertex read from the database
    pub fn attach_vertex(&mut self, record: VertexRecord) -> EntityKey {
        self.track(Entity::from_vertex(record))
    }

    /// Lookup-or-insert for an edge read from the database
    pub fn attach_edge(&mut self, record: EdgeRecord) -> EntityKey {
        self.track(Entity::from_edge(record))
    }

    fn slot(&self, key: EntityKey) -> Option<usize> {
        key.0.checked_sub(self.base)
    }

    pub fn get(&self, key: EntityKey) -> OgmResult<&Entity> {
        self.slot(key)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
            .ok_or_else(|| unknown_key(key))
    }

    pub fn get_mut(&mut self, key: EntityKey) -> OgmResult<&mut Entity> {
        let slot = self.slot(key);
        slot.and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
            .ok_or_else(|| unknown_key(key))
    }

    /// Keys of live entities, in tracking order
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        let base = self.base;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(move |(i, _)| EntityKey(base + i))
    }

    /// Keys of persisted entities with unflushed changes, in tracking order
    pub fn dirty_keys(&self) -> Vec<EntityKey> {
        let base = self.base;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().map_or(false, |e| e.state() == EntityState::Dirty))
            .map(|(i, _)| EntityKey(base + i))
            .collect()
    }

    /// Stop tracking one entity and hand it back. Reading the same record
    /// again attaches it under a new key.
    pub fn evict(&mut self, key: EntityKey) -> OgmResult<Entity> {
        let slot = self.slot(key);
        let entity = slot
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::take)
            .ok_or_else(|| unknown_key(key))?;
        if let Some(identity) = entity.identity() {
            if self.by_identity.get(identity) == Some(&key) {
                self.by_identity.remove(identity);
            }
        }
        Ok(entity)
    }

    /// Forget every entity. Keys issued before the call no longer resolve.
    pub fn clear(&mut self) {
        self.base += self.slots.len();
        self.slots.clear();
        self.by_identity.clear();
    }

    /// Record the identity assigned by a create
    pub fn assign(
        &mut self,
        key: EntityKey,
        identity: EntityIdentity,
        properties: PropertyMap,
        endpoints: Option<(GraphId, GraphId)>,
    ) -> OgmResult<()> {
        if let Some(existing) = self.by_identity.get(&identity) {
            if *existing != key {
                return Err(OgmError::DataIntegrity {
                    entity: identity.to_string(),
                    reason: "identity is already tracked by another entity".to_string(),
                });
            }
        }
        self.get_mut(key)?
            .mark_created(identity.clone(), properties, endpoints)?;
        self.by_identity.insert(identity, key);
        Ok(())
    }

    /// Revoke an entity's identity after a delete. Deleting a vertex also
    /// revokes tracked edges incident to it; their keys are returned.
    pub fn revoke(&mut self, key: EntityKey) -> OgmResult<Vec<EntityKey>> {
        let entity = self.get_mut(key)?;
        let kind = entity.kind();
        let identity = entity.revoke()?;
        self.by_identity.remove(&identity);

        let mut cascaded = Vec::new();
        if kind == EntityKind::Vertex {
            let base = self.base;
            for (i, slot) in self.slots.iter_mut().enumerate() {
                let Some(edge) = slot else {
                    continue;
                };
                let incident = edge.kind() == EntityKind::Edge
                    && edge.identity().is_some()
                    && edge
                        .endpoints()
                        .map_or(false, |(s, e)| s == identity.id || e == identity.id);
                if incident {
                    if let Ok(edge_identity) = edge.revoke() {
                        self.by_identity.remove(&edge_identity);
                        cascaded.push(EntityKey(base + i));
                    }
                }
            }
        }
        if !cascaded.is_empty() {
            debug!("revoked {} edges incident to {}", cascaded.len(), identity);
        }
        Ok(cascaded)
    }
}

fn unknown_key(key: EntityKey) -> OgmError {
    OgmError::InvalidArgument(format!("unknown or evicted entity key {}", key.0))
}
