//! age-ogm: an object-graph mapper for Apache AGE
//!
//! Vertices and edges stored in a PostgreSQL database with the AGE extension
//! are mapped onto in-memory entities and typed models. All database access
//! goes through parameterized openCypher wrapped in `ag_catalog.cypher(...)`.
//!
//! # Architecture
//!
//! - `protocol`: agtype text codec (encode parameters, decode results)
//! - `query`: identifier checks, parameter binding, the fluent builder and
//!   finished statements
//! - `session`: change tracking and the per-session identity map
//! - `traverse`: bounded-depth expansion and lazy relationship descriptors
//! - `client`: blocking and async façades over pluggable executors
//!
//! The connection layer is not part of this crate: implement `Executor` or
//! `AsyncExecutor` over the PostgreSQL driver of your choice.
//!
//! ## Example Usage
//!
//! ```rust
//! use age_ogm::{params, Entity, Executor, Graph, OgmConfig, OgmResult, PropertyMap, RowIter, Statement};
//!
//! // An executor that answers every statement with the same vertex
//! struct Canned;
//!
//! impl Executor for Canned {
//!     fn execute<'a>(&'a self, _graph: &str, _statement: &Statement) -> OgmResult<RowIter<'a>> {
//!         let row = vec![r#"{"id": 1, "label": "Person", "properties": {"name": "Alice"}}::vertex"#.to_string()];
//!         Ok(Box::new(std::iter::once(Ok(row))))
//!     }
//! }
//!
//! let mut graph = Graph::new(Canned, OgmConfig::for_graph("social"))?;
//!
//! let mut props = PropertyMap::new();
//! props.insert("name".into(), "Alice".into());
//! let alice = graph.track(Entity::vertex("Person", props));
//! assert_eq!(graph.add(alice)?.to_string(), "Person[1]");
//!
//! // Reading the same vertex back yields the same tracked entity
//! let query = graph.query_label("Person")?.filter_by(params! { "name" => "Alice" })?;
//! assert_eq!(graph.one(&query)?, alice);
//! # Ok::<(), age_ogm::OgmError>(())
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod protocol;
pub mod query;
pub mod session;
pub mod traverse;

// Re-export main types for convenience
pub use error::{OgmError, OgmResult};

pub use config::{init_tracing, LogConfig, OgmConfig};

pub use graph::{
    Cardinality, Direction, EdgeRecord, EntityIdentity, EntityKind, FieldDef, FieldType, GraphId,
    LabelSchema, Model, PropertyMap, PropertyValue, RelationshipSpec, Schema, VertexRecord,
};

pub use query::{Params, QueryBuilder, RawRow, Row, SortOrder, Statement};

pub use session::{Entity, EntityKey, EntityState, Session};

pub use traverse::{ExpandPair, Expansion, ExpansionStream, Related, ResolutionState, Traversal};

pub use client::{
    AsyncExecutor, AsyncGraph, BlockingExecutor, EventKind, Executor, Graph, HookRegistry,
    HookTarget, RowIter, RowStream,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
