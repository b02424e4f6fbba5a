/// Tests for the async façade: parity with the blocking façade, streaming,
/// cancellation, and the blocking adapter over an async executor.
mod common;

use age_ogm::{
    AsyncGraph, BlockingExecutor, Direction, EntityIdentity, EntityKey, EntityState, Graph, OgmConfig,
    OgmError, OgmResult, Related,
};
use common::{edge, person_row, vertex, Person, ScriptedExecutor};
use futures::{StreamExt, TryStreamExt};
use std::time::Duration;

fn config() -> OgmConfig {
    OgmConfig::for_graph("social")
}

fn friend_rows() -> Vec<Vec<String>> {
    vec![
        vec![edge(10, "KNOWS", 1, 2, "{}"), vertex(2, "Person", r#"{"name": "Bob", "age": 25}"#)],
        vec![edge(11, "KNOWS", 1, 3, "{}"), vertex(3, "Person", r#"{"name": "Carol", "age": 41}"#)],
    ]
}

fn script(executor: &ScriptedExecutor) {
    executor
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(vec![person_row(1, "Alice", 31)])
        .respond(friend_rows())
        .respond(vec![vec!["2".to_string()]]);
}

#[tokio::test]
async fn test_async_matches_blocking_statements() {
    let blocking_executor = ScriptedExecutor::new();
    script(&blocking_executor);
    let mut blocking = Graph::new(blocking_executor, config()).unwrap();
    blocking.register::<Person>().unwrap();
    let alice = blocking.add_model(&Person::new("Alice", 30)).unwrap();
    blocking.set(alice, "age", 31).unwrap();
    blocking.update(alice).unwrap();
    let friends: Vec<EntityKey> = blocking
        .traverse(&EntityIdentity::new("Person", 1), "KNOWS", 2, None)
        .unwrap()
        .collect::<OgmResult<_>>()
        .unwrap();
    let query = blocking.query::<Person>().unwrap().full_scan();
    let total = blocking.count(&query).unwrap();

    let async_executor = ScriptedExecutor::new();
    script(&async_executor);
    let mut graph = AsyncGraph::new(async_executor, config()).unwrap();
    graph.register::<Person>().unwrap();
    let async_alice = graph.add_model(&Person::new("Alice", 30)).await.unwrap();
    graph.set(async_alice, "age", 31).unwrap();
    graph.update(async_alice).await.unwrap();
    let async_friends: Vec<EntityKey> = graph
        .traverse(&EntityIdentity::new("Person", 1), "KNOWS", 2, None)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let query = graph.query::<Person>().unwrap().full_scan();
    let async_total = graph.count(&query).await.unwrap();

    assert_eq!(blocking.executor().statements(), graph.executor().statements());
    assert_eq!(friends, async_friends);
    assert_eq!(total, async_total);
    assert_eq!(
        blocking.model::<Person>(friends[1]).unwrap(),
        graph.model::<Person>(async_friends[1]).unwrap()
    );
}

#[tokio::test]
async fn test_dropping_stream_releases_cursor() {
    let executor = ScriptedExecutor::new();
    executor.respond(friend_rows());
    let graph = AsyncGraph::new(executor, config()).unwrap();

    let mut pairs = graph
        .expand(&EntityIdentity::new("Person", 1), "KNOWS", Direction::Outbound, 1)
        .await
        .unwrap();
    let (_, first) = pairs.next().await.unwrap().unwrap();
    assert_eq!(first.id().as_i64(), 2);
    assert_eq!(graph.executor().released(), 0);

    drop(pairs);
    assert_eq!(graph.executor().released(), 1);
}

#[tokio::test]
async fn test_cancelled_resolution_restarts() {
    let executor = ScriptedExecutor::new();
    executor
        .respond(vec![person_row(1, "Alice", 30)])
        .respond_then_stall(friend_rows());
    let mut graph = AsyncGraph::new(executor, config()).unwrap();
    graph.register::<Person>().unwrap();
    let alice = graph.add_model(&Person::new("Alice", 30)).await.unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(50), graph.related(alice, "friends")).await;
    assert!(timed_out.is_err());
    assert_eq!(graph.executor().released(), 2);

    graph.executor().respond(friend_rows());
    let friends = graph.related(alice, "friends").await.unwrap();
    assert_eq!(friends.keys().len(), 2);
    assert!(matches!(friends, Related::Many(_)));
}

#[tokio::test]
async fn test_async_errors_surface() {
    let executor = ScriptedExecutor::new();
    let mut graph = AsyncGraph::new(executor, config()).unwrap();
    graph.register::<Person>().unwrap();
    let draft = graph.track(age_ogm::Entity::from_model(&Person::new("Dora", 5)).unwrap());

    assert!(matches!(graph.add(draft).await, Err(OgmError::Connection(_))));
    assert_eq!(graph.entity(draft).unwrap().state(), EntityState::Transient);

    graph.executor().respond(vec![]);
    let query = graph.query::<Person>().unwrap().full_scan();
    assert!(matches!(graph.one(&query).await, Err(OgmError::NotFound { .. })));
}

#[tokio::test]
async fn test_async_lookup_projection_and_delete() {
    let mut graph = AsyncGraph::new(ScriptedExecutor::new(), config()).unwrap();
    graph.register::<Person>().unwrap();
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(vec![vec![r#""Alice""#.to_string()]])
        .respond(vec![vec!["1".to_string()]])
        .respond(vec![]);

    let alice = graph.by_property("Person", "name", "Alice").await.unwrap().unwrap();
    let query = graph.query::<Person>().unwrap().full_scan();
    let rows = graph.project(&query, &[("n.name", "name")]).await.unwrap();
    assert_eq!(rows[0].get("name").and_then(|v| v.as_string()), Some("Alice"));

    assert_eq!(graph.delete_where(&query).await.unwrap(), 1);
    assert_eq!(
        graph.executor().last().cypher(),
        "MATCH (n:Person)\nWHERE id(n) IN $ids\nDETACH DELETE n"
    );
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Deleted);

    graph.clear();
    assert!(graph.entity(alice).is_err());
}

#[test]
fn test_blocking_adapter_over_async_executor() {
    let executor = BlockingExecutor::new(ScriptedExecutor::new()).unwrap();
    executor
        .inner()
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(friend_rows());
    let mut graph = Graph::new(executor, config()).unwrap();

    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Clean);

    let friends: Vec<EntityKey> = graph
        .traverse(&EntityIdentity::new("Person", 1), "KNOWS", 1, None)
        .unwrap()
        .collect::<OgmResult<_>>()
        .unwrap();
    assert_eq!(friends.len(), 2);
    assert_eq!(graph.executor().inner().released(), 2);
}
