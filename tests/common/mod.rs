//! Shared fixtures: a scripted executor and a few models
#![allow(dead_code)]

use age_ogm::{
    AsyncExecutor, Executor, FieldType, LabelSchema, Model, OgmError, OgmResult, RawRow,
    RelationshipSpec, RowIter, RowStream, Statement,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Response {
    rows: Vec<RawRow>,
    stall: bool,
}

/// Counts dropped row streams
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers statements from a queue of canned row sets and records every
/// statement it receives
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Response>>,
    log: Mutex<Vec<Statement>>,
    released: Arc<AtomicUsize>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows for the next statement
    pub fn respond(&self, rows: Vec<RawRow>) -> &Self {
        self.push(rows, false)
    }

    /// Queue rows after which the async stream never completes
    pub fn respond_then_stall(&self, rows: Vec<RawRow>) -> &Self {
        self.push(rows, true)
    }

    fn push(&self, rows: Vec<RawRow>, stall: bool) -> &Self {
        self.responses.lock().unwrap().push_back(Response { rows, stall });
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().unwrap().clone()
    }

    pub fn executed(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn last(&self) -> Statement {
        self.log.lock().unwrap().last().cloned().expect("no statement executed")
    }

    /// Number of async row streams dropped so far
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    fn next(&self, statement: &Statement) -> OgmResult<Response> {
        self.log.lock().unwrap().push(statement.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OgmError::Connection(format!("no scripted response for: {}", statement.cypher())))
    }
}

impl Executor for ScriptedExecutor {
    fn execute<'a>(&'a self, _graph: &str, statement: &Statement) -> OgmResult<RowIter<'a>> {
        let response = self.next(statement)?;
        Ok(Box::new(response.rows.into_iter().map(Ok)))
    }
}

#[async_trait]
impl AsyncExecutor for ScriptedExecutor {
    async fn execute<'a>(&'a self, _graph: &str, statement: &Statement) -> OgmResult<RowStream<'a>> {
        let response = self.next(statement)?;
        let guard = ReleaseGuard(self.released.clone());
        let rows = stream::iter(response.rows.into_iter().map(Ok));
        let rows = if response.stall {
            rows.chain(stream::pending()).boxed()
        } else {
            rows.boxed()
        };
        Ok(rows
            .map(move |row| {
                let _ = &guard;
                row
            })
            .boxed())
    }
}

pub fn vertex(id: i64, label: &str, properties: &str) -> String {
    format!(r#"{{"id": {}, "label": "{}", "properties": {}}}::vertex"#, id, label, properties)
}

pub fn edge(id: i64, label: &str, start: i64, end: i64, properties: &str) -> String {
    format!(
        r#"{{"id": {}, "label": "{}", "end_id": {}, "start_id": {}, "properties": {}}}::edge"#,
        id, label, end, start, properties
    )
}

pub fn path(edges: &[String]) -> String {
    format!("[{}]", edges.join(", "))
}

pub fn person_row(id: i64, name: &str, age: i64) -> RawRow {
    vec![vertex(id, "Person", &format!(r#"{{"name": "{}", "age": {}}}"#, name, age))]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: i64,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Person {
            name: name.to_string(),
            age,
        }
    }
}

impl Model for Person {
    const LABEL: &'static str = "Person";

    fn schema() -> LabelSchema {
        LabelSchema::vertex("Person")
            .required("name", FieldType::String)
            .field("age", FieldType::Integer)
            .relationship("friends", RelationshipSpec::many("KNOWS", "Person"))
            .relationship("employer", RelationshipSpec::one("WORKS_AT", "Company"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knows {
    pub since: i64,
}

impl Model for Knows {
    const LABEL: &'static str = "KNOWS";
    const KIND: age_ogm::EntityKind = age_ogm::EntityKind::Edge;
}
