//! Vertex and edge records as decoded from query results

use super::property::{PropertyMap, PropertyValue};
use super::types::{EntityIdentity, GraphId};
use serde::{Deserialize, Serialize};

/// A persisted vertex: identity plus every property the database returned,
/// declared schema fields and unknown extras alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub identity: EntityIdentity,
    pub properties: PropertyMap,
}

impl VertexRecord {
    pub fn new(identity: EntityIdentity, properties: PropertyMap) -> Self {
        VertexRecord {
            identity,
            properties,
        }
    }

    pub fn label(&self) -> &str {
        &self.identity.label
    }

    pub fn id(&self) -> GraphId {
        self.identity.id
    }

    /// Get a property value
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// A persisted directed edge (start -> end)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub identity: EntityIdentity,
    /// Vertex the edge goes FROM
    pub start_id: GraphId,
    /// Vertex the edge goes TO
    pub end_id: GraphId,
    pub properties: PropertyMap,
}

impl EdgeRecord {
    pub fn new(
        identity: EntityIdentity,
        start_id: GraphId,
        end_id: GraphId,
        properties: PropertyMap,
    ) -> Self {
        EdgeRecord {
            identity,
            start_id,
            end_id,
            properties,
        }
    }

    pub fn label(&self) -> &str {
        &self.identity.label
    }

    pub fn id(&self) -> GraphId {
        self.identity.id
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The endpoint opposite to `vertex`, or None if the edge does not touch it
    pub fn other_end(&self, vertex: GraphId) -> Option<GraphId> {
        if self.start_id == vertex {
            Some(self.end_id)
        } else if self.end_id == vertex {
            Some(self.start_id)
        } else {
            None
        }
    }

    pub fn touches(&self, vertex: GraphId) -> bool {
        self.start_id == vertex || self.end_id == vertex
    }
}
