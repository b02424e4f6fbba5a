//! Graph data model
//!
//! This module defines the values the mapper moves between memory and the
//! database:
//! - Property values (scalars, lists, maps, vertex and edge records)
//! - Entity identities assigned by the database
//! - Declared label schemas and relationships
//! - Typed models bridged through serde

pub mod model;
pub mod property;
pub mod record;
pub mod schema;
pub mod types;

// Re-export main types
pub use model::Model;
pub use property::{PropertyMap, PropertyValue};
pub use record::{EdgeRecord, VertexRecord};
pub use schema::{FieldDef, FieldType, LabelSchema, RelationshipSpec, Schema};
pub use types::{Cardinality, Direction, EntityIdentity, EntityKind, GraphId};
