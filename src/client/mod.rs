//! Graph façades
//!
//! - `Graph`: blocking, over any `Executor`
//! - `AsyncGraph`: async, over any `AsyncExecutor`
//! - `BlockingExecutor`: runs an `AsyncExecutor` behind the blocking façade
//! - Lifecycle hooks shared by both façades

pub mod async_graph;
pub mod blocking;
pub mod context;
pub mod executor;
pub mod graph;
pub mod hooks;

pub use async_graph::AsyncGraph;
pub use blocking::BlockingExecutor;
pub use context::GraphContext;
pub use executor::{AsyncExecutor, Executor, RowIter, RowStream};
pub use graph::Graph;
pub use hooks::{EventKind, HookFn, HookRegistry, HookTarget};
