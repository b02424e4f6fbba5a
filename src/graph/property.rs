//! Property value types for graph vertices and edges
//!
//! Values are owned trees: lists and maps nest arbitrarily deep but can never
//! form a cycle.

use super::record::{EdgeRecord, VertexRecord};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property value type
///
/// Supports:
/// - Null
/// - Boolean
/// - Integer (i64)
/// - Float (f64)
/// - String
/// - List (Vec<PropertyValue>)
/// - Map (insertion-ordered String -> PropertyValue)
/// - Vertex and Edge records returned by graph queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(PropertyMap),
    Vertex(Box<VertexRecord>),
    Edge(Box<EdgeRecord>),
}

impl PropertyValue {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Get string value if this is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get integer value if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get float value if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get boolean value if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get list value if this is a list
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get map value if this is a map
    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_vertex(&self) -> Option<&VertexRecord> {
        match self {
            PropertyValue::Vertex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeRecord> {
        match self {
            PropertyValue::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_vertex(self) -> Option<VertexRecord> {
        match self {
            PropertyValue::Vertex(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_edge(self) -> Option<EdgeRecord> {
        match self {
            PropertyValue::Edge(e) => Some(*e),
            _ => None,
        }
    }

    /// Equality for change detection: NaN equals NaN, so a value read back
    /// from the database compares equal to itself
    pub fn same_value(&self, other: &PropertyValue) -> bool {
        match (self, other) {
            (PropertyValue::Float(a), PropertyValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (PropertyValue::List(a), PropertyValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (PropertyValue::Map(a), PropertyValue::Map(b)) => same_map(a, b),
            (PropertyValue::Vertex(a), PropertyValue::Vertex(b)) => {
                a.identity == b.identity && same_map(&a.properties, &b.properties)
            }
            (PropertyValue::Edge(a), PropertyValue::Edge(b)) => {
                a.identity == b.identity
                    && a.start_id == b.start_id
                    && a.end_id == b.end_id
                    && same_map(&a.properties, &b.properties)
            }
            _ => self == other,
        }
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "Null",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::String(_) => "String",
            PropertyValue::List(_) => "List",
            PropertyValue::Map(_) => "Map",
            PropertyValue::Vertex(_) => "Vertex",
            PropertyValue::Edge(_) => "Edge",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, val) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
            PropertyValue::Vertex(v) => write!(f, "{}", v.identity),
            PropertyValue::Edge(e) => write!(f, "{}({}->{})", e.identity, e.start_id, e.end_id),
        }
    }
}

// Convenience conversions
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<u32> for PropertyValue {
    fn from(i: u32) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        PropertyValue::List(items)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        PropertyValue::Map(map)
    }
}

impl From<VertexRecord> for PropertyValue {
    fn from(v: VertexRecord) -> Self {
        PropertyValue::Vertex(Box::new(v))
    }
}

impl From<EdgeRecord> for PropertyValue {
    fn from(e: EdgeRecord) -> Self {
        PropertyValue::Edge(Box::new(e))
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}

/// Property map for storing vertex and edge properties. Keeps insertion order
/// so generated statements and encoded literals are deterministic.
pub type PropertyMap = IndexMap<String, PropertyValue>;

fn same_map(a: &PropertyMap, b: &PropertyMap) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).map_or(false, |w| v.same_value(w)))
}
