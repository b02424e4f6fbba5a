//! Declared label schemas
//!
//! A label schema is a static mapping of field name to semantic type, plus the
//! relationships attached to the label. Schemas are checked when a query is
//! built or a property is set, never at execution time.

use super::property::{PropertyMap, PropertyValue};
use super::types::{Cardinality, Direction, EntityKind};
use crate::error::{OgmError, OgmResult};
use crate::query::ident::check_ident;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Semantic type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Any,
    Boolean,
    Integer,
    /// Accepts integers too
    Float,
    String,
    List,
    Map,
}

impl FieldType {
    /// Whether a value is acceptable for this type. Null is handled by the
    /// caller through `FieldDef::required`.
    pub fn accepts(&self, value: &PropertyValue) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            (FieldType::Boolean, PropertyValue::Boolean(_)) => true,
            (FieldType::Integer, PropertyValue::Integer(_)) => true,
            (FieldType::Float, PropertyValue::Float(_) | PropertyValue::Integer(_)) => true,
            (FieldType::String, PropertyValue::String(_)) => true,
            (FieldType::List, PropertyValue::List(_)) => true,
            (FieldType::Map, PropertyValue::Map(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

/// A relationship declared on a label; resolved per entity on access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub target_label: String,
    pub edge_label: String,
    pub direction: Direction,
    pub cardinality: Cardinality,
}

impl RelationshipSpec {
    /// Outbound relationship resolving to at most one target
    pub fn one(edge_label: impl Into<String>, target_label: impl Into<String>) -> Self {
        RelationshipSpec {
            target_label: target_label.into(),
            edge_label: edge_label.into(),
            direction: Direction::Outbound,
            cardinality: Cardinality::One,
        }
    }

    /// Outbound relationship resolving to an ordered sequence of targets
    pub fn many(edge_label: impl Into<String>, target_label: impl Into<String>) -> Self {
        RelationshipSpec {
            cardinality: Cardinality::Many,
            ..RelationshipSpec::one(edge_label, target_label)
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Field and relationship declarations for one vertex or edge label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSchema {
    pub label: String,
    pub kind: EntityKind,
    pub fields: IndexMap<String, FieldDef>,
    /// Accept fields that are not declared (kept as opaque extras)
    pub open: bool,
    pub relationships: IndexMap<String, RelationshipSpec>,
}

impl LabelSchema {
    pub fn new(label: impl Into<String>, kind: EntityKind) -> Self {
        LabelSchema {
            label: label.into(),
            kind,
            fields: IndexMap::new(),
            open: false,
            relationships: IndexMap::new(),
        }
    }

    pub fn vertex(label: impl Into<String>) -> Self {
        Self::new(label, EntityKind::Vertex)
    }

    pub fn edge(label: impl Into<String>) -> Self {
        Self::new(label, EntityKind::Edge)
    }

    /// Declare an optional field
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            FieldDef {
                name,
                ty,
                required: false,
            },
        );
        self
    }

    /// Declare a field that must be present and non-null on creation
    pub fn required(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            FieldDef {
                name,
                ty,
                required: true,
            },
        );
        self
    }

    pub fn allow_extra(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, spec: RelationshipSpec) -> Self {
        self.relationships.insert(name.into(), spec);
        self
    }

    /// Look up a field, failing on unknown names unless the schema is open
    pub fn check_field(&self, name: &str) -> OgmResult<Option<&FieldDef>> {
        match self.fields.get(name) {
            Some(def) => Ok(Some(def)),
            None if self.open => Ok(None),
            None => Err(OgmError::schema(&self.label, Some(name), "unknown field")),
        }
    }

    /// Check a single field assignment
    pub fn check_value(&self, name: &str, value: &PropertyValue) -> OgmResult<()> {
        let Some(def) = self.check_field(name)? else {
            return Ok(());
        };
        if value.is_null() {
            if def.required {
                return Err(OgmError::schema(&self.label, Some(name), "required field cannot be null"));
            }
            return Ok(());
        }
        if !def.ty.accepts(value) {
            return Err(OgmError::schema(
                &self.label,
                Some(name),
                format!("expected {:?}, got {}", def.ty, value.type_name()),
            ));
        }
        Ok(())
    }

    /// Check a full property map; with `creating` set, required fields must be present
    pub fn check_properties(&self, properties: &PropertyMap, creating: bool) -> OgmResult<()> {
        for (name, value) in properties {
            self.check_value(name, value)?;
        }
        if creating {
            if let Some(missing) = self
                .fields
                .values()
                .find(|def| def.required && !properties.contains_key(&def.name))
            {
                return Err(OgmError::schema(&self.label, Some(&missing.name), "required field is missing"));
            }
        }
        Ok(())
    }
}

/// Registry of label schemas known to one graph façade
#[derive(Debug, Clone, Default)]
pub struct Schema {
    labels: FxHashMap<String, LabelSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a label schema
    pub fn register(&mut self, schema: LabelSchema) -> OgmResult<()> {
        check_ident(&schema.label, "label")?;
        for spec in schema.relationships.values() {
            check_ident(&spec.edge_label, "label")?;
            check_ident(&spec.target_label, "label")?;
        }
        self.labels.insert(schema.label.clone(), schema);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&LabelSchema> {
        self.labels.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
