//! In-memory vertices and edges

use super::tracker::{ChangeTracker, EntityState};
use crate::error::{OgmError, OgmResult};
use crate::graph::{
    EdgeRecord, EntityIdentity, EntityKind, GraphId, Model, PropertyMap, PropertyValue, VertexRecord,
};
use std::collections::BTreeSet;

/// A vertex or edge held by a session, with its change tracker
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: EntityKind,
    label: String,
    properties: PropertyMap,
    /// (start, end) vertex ids; edges only, set once created
    endpoints: Option<(GraphId, GraphId)>,
    tracker: ChangeTracker,
}

impl Entity {
    /// New transient vertex
    pub fn vertex(label: impl Into<String>, properties: PropertyMap) -> Self {
        Self::transient(EntityKind::Vertex, label.into(), properties)
    }

    /// New transient edge; endpoints are fixed when it is connected
    pub fn edge(label: impl Into<String>, properties: PropertyMap) -> Self {
        Self::transient(EntityKind::Edge, label.into(), properties)
    }

    /// New transient entity from a typed model
    pub fn from_model<M: Model>(model: &M) -> OgmResult<Self> {
        Ok(Self::transient(M::KIND, M::LABEL.to_string(), model.to_properties()?))
    }

    fn transient(kind: EntityKind, label: String, properties: PropertyMap) -> Self {
        Entity {
            kind,
            label,
            properties,
            endpoints: None,
            tracker: ChangeTracker::transient(),
        }
    }

    /// Clean entity for a stored vertex
    pub fn from_vertex(record: VertexRecord) -> Self {
        Entity {
            kind: EntityKind::Vertex,
            label: record.identity.label.clone(),
            properties: record.properties.clone(),
            endpoints: None,
            tracker: ChangeTracker::persistent(record.identity, record.properties),
        }
    }

    /// Clean entity for a stored edge
    pub fn from_edge(record: EdgeRecord) -> Self {
        Entity {
            kind: EntityKind::Edge,
            label: record.identity.label.clone(),
            properties: record.properties.clone(),
            endpoints: Some((record.start_id, record.end_id)),
            tracker: ChangeTracker::persistent(record.identity, record.properties),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn get(&self, field: &str) -> Option<&PropertyValue> {
        self.properties.get(field)
    }

    pub fn endpoints(&self) -> Option<(GraphId, GraphId)> {
        self.endpoints
    }

    pub fn state(&self) -> EntityState {
        self.tracker.state()
    }

    pub fn identity(&self) -> Option<&EntityIdentity> {
        self.tracker.identity()
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn dirty_fields(&self) -> &BTreeSet<String> {
        self.tracker.dirty_fields()
    }

    /// Dirty fields with their current values; a removed field maps to null
    pub fn dirty_properties(&self) -> PropertyMap {
        self.tracker
            .dirty_fields()
            .iter()
            .map(|f| {
                let value = self.properties.get(f).cloned().unwrap_or(PropertyValue::Null);
                (f.clone(), value)
            })
            .collect()
    }

    /// Set a property and track the change
    pub fn set(&mut self, field: &str, value: impl Into<PropertyValue>) -> OgmResult<()> {
        if self.state() == EntityState::Deleted {
            return Err(OgmError::state(self.describe(), "cannot mutate a deleted entity"));
        }
        self.properties.insert(field.to_string(), value.into());
        self.tracker.mark_dirty(field, &self.properties);
        Ok(())
    }

    /// Human-readable handle for errors and logs
    pub fn describe(&self) -> String {
        match self.tracker.last_identity() {
            Some(identity) => identity.to_string(),
            None => format!("transient {} {}", self.kind, self.label),
        }
    }

    /// Decode the properties into a typed model
    pub fn to_model<M: Model>(&self) -> OgmResult<M> {
        if self.label != M::LABEL {
            return Err(OgmError::schema(
                M::LABEL,
                None,
                format!("{} is not a `{}`", self.describe(), M::LABEL),
            ));
        }
        M::from_properties(&self.properties)
    }

    /// Current value as a record, when persisted
    pub fn to_value(&self) -> Option<PropertyValue> {
        let identity = self.identity()?.clone();
        match (self.kind, self.endpoints) {
            (EntityKind::Vertex, _) => Some(VertexRecord::new(identity, self.properties.clone()).into()),
            (EntityKind::Edge, Some((start, end))) => {
                Some(EdgeRecord::new(identity, start, end, self.properties.clone()).into())
            }
            (EntityKind::Edge, None) => None,
        }
    }

    /// Fails unless the entity is persisted and not deleted
    pub(crate) fn require_identity(&self) -> OgmResult<&EntityIdentity> {
        match self.state() {
            EntityState::Deleted => Err(OgmError::state(self.describe(), "entity was deleted")),
            _ => self
                .tracker
                .identity()
                .ok_or_else(|| OgmError::state(self.describe(), "entity has no graph identity")),
        }
    }

    /// Apply values over the current properties; fields not listed are kept
    pub(crate) fn merge_properties(&mut self, properties: PropertyMap) -> OgmResult<()> {
        if self.state() == EntityState::Deleted {
            return Err(OgmError::state(self.describe(), "cannot mutate a deleted entity"));
        }
        for (field, value) in properties {
            self.properties.insert(field.clone(), value);
            self.tracker.mark_dirty(&field, &self.properties);
        }
        Ok(())
    }

    /// Adopt the values the database returned from a create
    pub(crate) fn mark_created(
        &mut self,
        identity: EntityIdentity,
        properties: PropertyMap,
        endpoints: Option<(GraphId, GraphId)>,
    ) -> OgmResult<()> {
        self.tracker.assign(identity, &properties)?;
        self.properties = properties;
        if endpoints.is_some() {
            self.endpoints = endpoints;
        }
        Ok(())
    }

    /// Adopt the values the database returned from an update
    pub(crate) fn mark_flushed(&mut self, properties: PropertyMap) {
        self.tracker.reconcile(&properties);
        self.properties = properties;
    }

    /// Merge a freshly read record, keeping local changes to dirty fields
    pub(crate) fn refresh(&mut self, stored: PropertyMap) {
        let mut current = stored.clone();
        for field in self.tracker.dirty_fields() {
            let local = self.properties.get(field).cloned().unwrap_or(PropertyValue::Null);
            current.insert(field.clone(), local);
        }
        self.properties = current;
        self.tracker.rebase(stored, &self.properties);
    }

    pub(crate) fn revoke(&mut self) -> OgmResult<EntityIdentity> {
        self.tracker.revoke()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Entity {
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Alice".into());
        props.insert("age".into(), 30i64.into());
        Entity::from_vertex(VertexRecord::new(EntityIdentity::new("Person", 1), props))
    }

    #[test]
    fn test_partial_update_fields() {
        let mut entity = alice();
        assert_eq!(entity.state(), EntityState::Clean);
        entity.set("age", 31).unwrap();
        assert_eq!(entity.state(), EntityState::Dirty);

        let dirty = entity.dirty_properties();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty.get("age"), Some(&PropertyValue::Integer(31)));
    }

    #[test]
    fn test_mutate_after_delete_fails() {
        let mut entity = alice();
        entity.revoke().unwrap();
        let err = entity.set("age", 40).unwrap_err();
        assert!(matches!(err, OgmError::State { ref entity, .. } if entity == "Person[1]"));
        assert!(entity.require_identity().is_err());
    }

    #[test]
    fn test_transient_describe_and_identity() {
        let entity = Entity::vertex("Person", PropertyMap::new());
        assert_eq!(entity.describe(), "transient vertex Person");
        assert!(entity.require_identity().is_err());
        assert!(entity.to_value().is_none());
    }

    #[test]
    fn test_refresh_keeps_dirty_fields() {
        let mut entity = alice();
        entity.set("name", "Alicia").unwrap();

        let mut stored = PropertyMap::new();
        stored.insert("name".into(), "Alice".into());
        stored.insert("age".into(), 33i64.into());
        entity.refresh(stored);

        assert_eq!(entity.get("name"), Some(&PropertyValue::String("Alicia".into())));
        assert_eq!(entity.get("age"), Some(&PropertyValue::Integer(33)));
        assert_eq!(entity.dirty_fields().iter().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn test_merge_properties_keeps_unlisted_fields() {
        let mut entity = alice();
        entity.set("city", "Paris").unwrap();
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Alice".into());
        props.insert("age".into(), 31i64.into());
        entity.merge_properties(props).unwrap();

        assert_eq!(entity.get("city"), Some(&PropertyValue::String("Paris".into())));
        let dirty = entity.dirty_properties();
        assert_eq!(dirty.get("age"), Some(&PropertyValue::Integer(31)));
        assert!(dirty.get("name").is_none());
        assert_eq!(dirty.len(), 2);
    }

    #[test]
    fn test_edge_value() {
        let edge = Entity::from_edge(EdgeRecord::new(
            EntityIdentity::new("KNOWS", 9),
            GraphId(1),
            GraphId(2),
            PropertyMap::new(),
        ));
        assert_eq!(edge.endpoints(), Some((GraphId(1), GraphId(2))));
        assert!(edge.to_value().and_then(|v| v.into_edge()).is_some());
    }
}
