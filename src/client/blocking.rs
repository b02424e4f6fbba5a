//! Blocking adapter over an async executor
//!
//! Lets the blocking `Graph` run on top of an `AsyncExecutor` by driving it
//! on a private current-thread runtime. Rows are still pulled one at a time.
//! Must not be used from inside another tokio runtime.

use super::executor::{AsyncExecutor, Executor, RowIter, RowStream};
use crate::error::OgmResult;
use crate::query::{RawRow, Statement};
use futures::StreamExt;
use tokio::runtime::{Builder, Runtime};

pub struct BlockingExecutor<E> {
    inner: E,
    runtime: Runtime,
}

impl<E: AsyncExecutor> BlockingExecutor<E> {
    pub fn new(inner: E) -> OgmResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(BlockingExecutor { inner, runtime })
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: AsyncExecutor> Executor for BlockingExecutor<E> {
    fn execute<'a>(&'a self, graph: &str, statement: &Statement) -> OgmResult<RowIter<'a>> {
        let stream = self.runtime.block_on(self.inner.execute(graph, statement))?;
        Ok(Box::new(BlockingRows {
            runtime: &self.runtime,
            stream,
        }))
    }
}

struct BlockingRows<'a> {
    runtime: &'a Runtime,
    stream: RowStream<'a>,
}

impl Iterator for BlockingRows<'_> {
    type Item = OgmResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
