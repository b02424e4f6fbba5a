//! Core type definitions for graph entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database-assigned graph id (AGE `graphid`, a 64-bit integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GraphId(pub i64);

impl GraphId {
    pub fn new(id: i64) -> Self {
        GraphId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for GraphId {
    fn from(id: i64) -> Self {
        GraphId(id)
    }
}

/// Identity of a persisted vertex or edge: its label plus the graph id the
/// database assigned at creation. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIdentity {
    pub label: String,
    pub id: GraphId,
}

impl EntityIdentity {
    pub fn new(label: impl Into<String>, id: impl Into<GraphId>) -> Self {
        EntityIdentity {
            label: label.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.label, self.id)
    }
}

/// Whether a label names vertices or edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Vertex,
    Edge,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Vertex => write!(f, "vertex"),
            EntityKind::Edge => write!(f, "edge"),
        }
    }
}

/// Edge direction relative to the origin vertex of an expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outbound,
    Inbound,
    Either,
}

impl Direction {
    /// Pattern arrow fragments placed around the relationship brackets
    pub(crate) fn arrows(&self) -> (&'static str, &'static str) {
        match self {
            Direction::Outbound => ("-", "->"),
            Direction::Inbound => ("<-", "-"),
            Direction::Either => ("-", "-"),
        }
    }
}

/// How many targets a relationship resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}
