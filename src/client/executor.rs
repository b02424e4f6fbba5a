//! Statement executors
//!
//! The connection layer is external: anything that can run a `Statement`
//! against a graph and hand back positional agtype rows can drive the
//! façades. Executors report their own failures as `OgmError::Connection`;
//! nothing here retries.

use crate::error::OgmResult;
use crate::query::{RawRow, Statement};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazily produced rows of a blocking execution
pub type RowIter<'a> = Box<dyn Iterator<Item = OgmResult<RawRow>> + 'a>;

/// Lazily produced rows of an async execution. Dropping the stream must
/// release the underlying cursor.
pub type RowStream<'a> = BoxStream<'a, OgmResult<RawRow>>;

/// Blocking executor
///
/// Implementations typically render `statement.to_sql(graph)` and bind
/// `statement.params_literal()` as `$1`. Each row holds one agtype text per
/// entry of `statement.sql_columns()`, in order.
pub trait Executor {
    fn execute<'a>(&'a self, graph: &str, statement: &Statement) -> OgmResult<RowIter<'a>>;
}

/// Async executor with the same row contract as `Executor`
#[async_trait]
pub trait AsyncExecutor: Send + Sync {
    async fn execute<'a>(&'a self, graph: &str, statement: &Statement) -> OgmResult<RowStream<'a>>;
}
