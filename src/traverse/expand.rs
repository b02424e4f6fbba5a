//! Bounded-depth neighborhood expansion
//!
//! An `ExpandPlan` produces one statement; the rows it returns are filtered
//! through an `ExpandFilter` that decodes each row into an (edge, vertex)
//! pair and drops vertices already seen. The same filter drives the blocking
//! `Expansion` iterator and the async `ExpansionStream`, so both modes emit
//! identical sequences.
//!
//! Variable-length matches are ordered by path length, so a vertex reachable
//! along several paths is emitted once, for its shortest one. openCypher never
//! repeats an edge within a path, so expansion terminates on cyclic graphs.

use crate::error::{OgmError, OgmResult};
use crate::graph::{Direction, EdgeRecord, EntityIdentity, GraphId, VertexRecord};
use crate::protocol::agtype;
use crate::query::ident::check_ident;
use crate::query::{ParamMap, RawRow, Row, Statement};
use crate::session::{EntityKey, Session};
use futures::stream::{Stream, StreamExt};
use rustc_hash::FxHashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

const EDGE_COLUMN: &str = "e";
const VERTEX_COLUMN: &str = "m";

/// A decoded expansion result
pub type ExpandPair = (EdgeRecord, VertexRecord);

/// Everything needed to run one expansion
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandPlan {
    origin: EntityIdentity,
    edge_label: String,
    direction: Direction,
    depth: u32,
    target_label: Option<String>,
    distinct: bool,
}

impl ExpandPlan {
    /// Depth must be in `1..=max_depth`
    pub fn new(
        origin: EntityIdentity,
        edge_label: &str,
        direction: Direction,
        depth: u32,
        max_depth: u32,
    ) -> OgmResult<Self> {
        check_ident(edge_label, "label")?;
        check_ident(&origin.label, "label")?;
        if depth == 0 {
            return Err(OgmError::InvalidArgument("expansion depth must be at least 1".to_string()));
        }
        if depth > max_depth {
            return Err(OgmError::InvalidArgument(format!(
                "expansion depth {} exceeds the configured maximum of {}",
                depth, max_depth
            )));
        }
        Ok(ExpandPlan {
            origin,
            edge_label: edge_label.to_string(),
            direction,
            depth,
            target_label: None,
            distinct: true,
        })
    }

    /// Emit only vertices of this label; others are skipped, not errors
    pub fn target_label(mut self, label: &str) -> OgmResult<Self> {
        check_ident(label, "label")?;
        self.target_label = Some(label.to_string());
        Ok(self)
    }

    /// Emit every row, including repeated targets reached over parallel edges
    pub fn keep_duplicates(mut self) -> Self {
        self.distinct = false;
        self
    }

    pub fn origin(&self) -> &EntityIdentity {
        &self.origin
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn statement(&self) -> OgmResult<Statement> {
        let (left, right) = self.direction.arrows();
        let hops = if self.depth == 1 {
            String::new()
        } else {
            format!("*1..{}", self.depth)
        };
        let mut cypher = format!(
            "MATCH (o:{}){}[{}:{}{}]{}({})\nWHERE id(o) = $origin\nRETURN {}, {}",
            self.origin.label,
            left,
            EDGE_COLUMN,
            self.edge_label,
            hops,
            right,
            VERTEX_COLUMN,
            EDGE_COLUMN,
            VERTEX_COLUMN
        );
        if self.depth > 1 {
            cypher.push_str(&format!("\nORDER BY size({})", EDGE_COLUMN));
        }
        let mut params = ParamMap::new();
        params.insert("origin".to_string(), self.origin.id.as_i64().into());
        Statement::new(
            cypher,
            params,
            vec![EDGE_COLUMN.to_string(), VERTEX_COLUMN.to_string()],
        )
    }

    /// Row filter for this plan's result set
    pub fn filter(&self, statement: &Statement) -> ExpandFilter {
        let mut seen = FxHashSet::default();
        seen.insert(self.origin.id);
        ExpandFilter {
            columns: statement.columns().iter().cloned().collect(),
            seen,
            distinct: self.distinct,
            target_label: self.target_label.clone(),
        }
    }
}

/// Decodes rows into pairs, dropping repeats and non-matching labels
#[derive(Debug, Clone)]
pub struct ExpandFilter {
    columns: Arc<[String]>,
    seen: FxHashSet<GraphId>,
    distinct: bool,
    target_label: Option<String>,
}

impl ExpandFilter {
    /// Ok(None) means the row is skipped
    pub fn accept(&mut self, raw: RawRow) -> OgmResult<Option<ExpandPair>> {
        let row = Row::from_raw(self.columns.clone(), raw)?;
        let edge_text = row.get(EDGE_COLUMN).unwrap_or_default();
        let edge = agtype::decode_edges(edge_text)?
            .pop()
            .ok_or_else(|| OgmError::Decode {
                fragment: edge_text.chars().take(32).collect(),
                reason: "expansion path has no edges".to_string(),
            })?;
        let vertex = row.vertex(VERTEX_COLUMN)?;
        if self.distinct && !self.seen.insert(vertex.id()) {
            return Ok(None);
        }
        if let Some(label) = &self.target_label {
            if vertex.label() != label {
                return Ok(None);
            }
        }
        Ok(Some((edge, vertex)))
    }
}

/// Lazy expansion over a blocking row iterator. Not restartable: a second
/// pass needs a new expansion, which re-runs the query.
pub struct Expansion<I> {
    rows: I,
    filter: ExpandFilter,
}

impl<I> Expansion<I>
where
    I: Iterator<Item = OgmResult<RawRow>>,
{
    pub fn new(rows: I, filter: ExpandFilter) -> Self {
        Expansion { rows, filter }
    }
}

impl<I> Iterator for Expansion<I>
where
    I: Iterator<Item = OgmResult<RawRow>>,
{
    type Item = OgmResult<ExpandPair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.rows.next()? {
                Ok(raw) => match self.filter.accept(raw) {
                    Ok(Some(pair)) => return Some(Ok(pair)),
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Lazy expansion over an async row stream. Dropping it drops the row
/// stream, which releases the underlying cursor.
pub struct ExpansionStream<S> {
    rows: S,
    filter: ExpandFilter,
}

impl<S> ExpansionStream<S>
where
    S: Stream<Item = OgmResult<RawRow>> + Unpin,
{
    pub fn new(rows: S, filter: ExpandFilter) -> Self {
        ExpansionStream { rows, filter }
    }
}

impl<S> Stream for ExpansionStream<S>
where
    S: Stream<Item = OgmResult<RawRow>> + Unpin,
{
    type Item = OgmResult<ExpandPair>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match this.rows.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(raw))) => match this.filter.accept(raw) {
                    Ok(Some(pair)) => return Poll::Ready(Some(Ok(pair))),
                    Ok(None) => continue,
                    Err(e) => return Poll::Ready(Some(Err(e))),
                },
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Expansion whose vertices are attached to a session as they are pulled
pub struct Traversal<'s, R> {
    pairs: R,
    session: &'s mut Session,
}

impl<'s, R> Traversal<'s, R> {
    pub fn new(pairs: R, session: &'s mut Session) -> Self {
        Traversal { pairs, session }
    }
}

impl<'s, I> Iterator for Traversal<'s, I>
where
    I: Iterator<Item = OgmResult<ExpandPair>>,
{
    type Item = OgmResult<EntityKey>;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.pairs.next()?;
        Some(pair.map(|(_, vertex)| self.session.attach_vertex(vertex)))
    }
}

impl<'s, S> Stream for Traversal<'s, S>
where
    S: Stream<Item = OgmResult<ExpandPair>> + Unpin,
{
    type Item = OgmResult<EntityKey>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.pairs.poll_next_unpin(cx) {
            Poll::Ready(Some(pair)) => {
                Poll::Ready(Some(pair.map(|(_, vertex)| this.session.attach_vertex(vertex))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
