/// End-to-end tests of the blocking façade against a scripted executor:
/// entity lifecycle, partial updates, identity map and lifecycle hooks.
mod common;

use age_ogm::{
    Entity, EntityIdentity, EntityKey, EntityState, EventKind, Graph, GraphId, HookTarget, Model, OgmConfig,
    OgmError, OgmResult, PropertyValue,
};
use common::{edge, person_row, vertex, Knows, Person, ScriptedExecutor};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Open schema: stored fields beyond these two are kept as extras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Member {
    name: String,
    age: i64,
}

impl Model for Member {
    const LABEL: &'static str = "Member";
}

fn graph() -> Graph<ScriptedExecutor> {
    let mut graph = Graph::new(ScriptedExecutor::new(), OgmConfig::for_graph("social")).unwrap();
    graph.register::<Person>().unwrap();
    graph
}

fn identity(graph: &Graph<ScriptedExecutor>, key: EntityKey) -> EntityIdentity {
    graph.entity(key).unwrap().identity().cloned().unwrap()
}

#[test]
fn test_alice_knows_bob() {
    let mut graph = graph();
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(vec![person_row(2, "Bob", 25)])
        .respond(vec![vec![edge(10, "KNOWS", 1, 2, r#"{"since": 2020}"#)]])
        .respond(vec![person_row(1, "Alice", 31)])
        .respond(vec![vec![edge(10, "KNOWS", 1, 2, r#"{"since": 2020}"#), vertex(2, "Person", r#"{"name": "Bob", "age": 25}"#)]])
        .respond(vec![]);

    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    let bob = graph.add_model(&Person::new("Bob", 25)).unwrap();
    assert_eq!(identity(&graph, alice), EntityIdentity::new("Person", 1));
    assert_eq!(
        graph.executor().statements()[0].cypher(),
        "CREATE (n:Person {name: $name_0, age: $age_0})\nRETURN n"
    );

    let knows = graph.connect_model(alice, &Knows { since: 2020 }, bob).unwrap();
    let connect = graph.executor().last();
    assert_eq!(
        connect.cypher(),
        "MATCH (a:Person), (b:Person)\nWHERE id(a) = $start_id AND id(b) = $end_id\nCREATE (a)-[n:KNOWS {since: $since_0}]->(b)\nRETURN n"
    );
    assert_eq!(connect.params().get("start_id"), Some(&PropertyValue::Integer(1)));
    assert_eq!(connect.params().get("end_id"), Some(&PropertyValue::Integer(2)));
    assert_eq!(graph.entity(knows).unwrap().endpoints(), Some((GraphId(1), GraphId(2))));

    // Only the changed field and the id are sent
    graph.set(alice, "age", 31).unwrap();
    assert!(graph.update(alice).unwrap());
    let update = graph.executor().last();
    assert_eq!(update.param_names().collect::<Vec<_>>(), vec!["id", "age_0"]);
    assert_eq!(update.params().get("id"), Some(&PropertyValue::Integer(1)));
    assert_eq!(update.params().get("age_0"), Some(&PropertyValue::Integer(31)));
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Clean);

    // Nothing dirty: no round trip
    assert!(!graph.update(alice).unwrap());
    assert_eq!(graph.executor().executed(), 4);

    let origin = identity(&graph, alice);
    let friends: Vec<EntityKey> = graph
        .traverse(&origin, "KNOWS", 1, None)
        .unwrap()
        .collect::<OgmResult<_>>()
        .unwrap();
    assert_eq!(friends, vec![bob]);
    assert_eq!(graph.model::<Person>(bob).unwrap(), Person::new("Bob", 25));

    graph.delete(alice).unwrap();
    assert_eq!(
        graph.executor().last().cypher(),
        "MATCH (n:Person)\nWHERE id(n) = $id\nDETACH DELETE n"
    );
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Deleted);
    assert_eq!(graph.entity(knows).unwrap().state(), EntityState::Deleted);
    assert_eq!(graph.entity(bob).unwrap().state(), EntityState::Clean);
    assert!(matches!(graph.set(alice, "age", 32), Err(OgmError::State { .. })));
    assert!(matches!(graph.update(alice), Err(OgmError::State { .. })));
    assert_eq!(graph.executor().pending(), 0);
}

#[test]
fn test_modify_through_model() {
    let mut graph = graph();
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(vec![person_row(1, "Alice", 40)]);
    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();

    graph.modify::<Person>(alice, |p| p.age = 40).unwrap();
    assert_eq!(graph.entity(alice).unwrap().dirty_fields().len(), 1);
    assert_eq!(graph.flush().unwrap(), 1);
    assert_eq!(graph.executor().last().param_names().collect::<Vec<_>>(), vec!["id", "age_0"]);
    assert_eq!(graph.flush().unwrap(), 0);
}

#[test]
fn test_modify_keeps_undeclared_fields() {
    let mut graph = graph();
    graph.register::<Member>().unwrap();
    graph
        .executor()
        .respond(vec![vec![vertex(1, "Member", r#"{"name": "Alice", "age": 30, "legacy": "keep me"}"#)]])
        .respond(vec![vec![vertex(1, "Member", r#"{"name": "Alice", "age": 31, "legacy": "keep me"}"#)]]);
    let alice = graph.by_id("Member", GraphId(1)).unwrap().unwrap();

    graph.modify::<Member>(alice, |m| m.age = 31).unwrap();
    let entity = graph.entity(alice).unwrap();
    assert_eq!(entity.dirty_fields().iter().collect::<Vec<_>>(), vec!["age"]);
    assert_eq!(entity.get("legacy"), Some(&PropertyValue::from("keep me")));

    assert!(graph.update(alice).unwrap());
    let st = graph.executor().last();
    assert_eq!(st.param_names().collect::<Vec<_>>(), vec!["id", "age_0"]);
    assert!(!st.cypher().contains("legacy"));
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Clean);
}

#[test]
fn test_schema_violation_before_round_trip() {
    let mut graph = graph();
    graph.executor().respond(vec![person_row(1, "Alice", 30)]);
    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();

    let err = graph.set(alice, "age", "thirty").unwrap_err();
    assert!(matches!(err, OgmError::Schema { ref field, .. } if field.as_deref() == Some("age")));
    let err = graph.set(alice, "nickname", "Al").unwrap_err();
    assert!(matches!(err, OgmError::Schema { .. }));
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Clean);
    assert_eq!(graph.executor().executed(), 1);
}

#[test]
fn test_same_vertex_read_twice_is_one_entity() {
    let mut graph = graph();
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30), person_row(2, "Bob", 25)])
        .respond(vec![person_row(1, "Alice", 30)]);

    let query = graph.query::<Person>().unwrap().full_scan();
    let everyone = graph.all(&query).unwrap();
    let alice = graph.by_id("Person", GraphId(1)).unwrap().unwrap();
    assert_eq!(everyone[0], alice);
    assert_eq!(graph.session().len(), 2);
    assert_eq!(
        graph.executor().last().cypher(),
        "MATCH (n:Person)\nWHERE (id(n) = $id)\nRETURN n\nLIMIT 1"
    );
}

#[test]
fn test_hook_veto_skips_statement() {
    let mut graph = graph();
    graph.executor().respond(vec![person_row(1, "Alice", 30)]);
    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();

    graph
        .hooks_mut()
        .on(HookTarget::Label("Person".into()), EventKind::PreDelete, |entity, _| {
            if entity.get("name") == Some(&PropertyValue::from("Alice")) {
                Err(OgmError::InvalidArgument("Alice is protected".into()))
            } else {
                Ok(())
            }
        });

    match graph.delete(alice) {
        Err(OgmError::Hook { event, entity, reason }) => {
            assert_eq!(event, "pre_delete");
            assert_eq!(entity, "Person[1]");
            assert!(reason.contains("protected"));
        }
        other => panic!("expected hook veto, got {:?}", other),
    }
    assert_eq!(graph.executor().executed(), 1);
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Clean);
}

#[test]
fn test_failed_post_hook_keeps_committed_write() {
    let calls = Arc::new(Mutex::new(0));
    let mut graph = graph();
    graph.hooks_mut().on(HookTarget::Any, EventKind::PostAdd, |_, _| {
        Err(OgmError::InvalidArgument("audit log unavailable".into()))
    });
    let counter = calls.clone();
    graph.hooks_mut().on(HookTarget::Any, EventKind::PostAdd, move |_, _| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });
    graph.executor().respond(vec![person_row(1, "Alice", 30)]);

    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Clean);
    assert_eq!(identity(&graph, alice), EntityIdentity::new("Person", 1));
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn test_evict_and_clear() {
    let mut graph = graph();
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30), person_row(2, "Bob", 25)])
        .respond(vec![person_row(1, "Alice", 30)]);
    let query = graph.query::<Person>().unwrap().full_scan();
    let everyone = graph.all(&query).unwrap();

    let evicted = graph.evict(everyone[0]).unwrap();
    assert_eq!(evicted.identity(), Some(&EntityIdentity::new("Person", 1)));
    assert!(matches!(graph.entity(everyone[0]), Err(OgmError::InvalidArgument(_))));
    assert_eq!(graph.session().len(), 1);

    let alice = graph.by_id("Person", GraphId(1)).unwrap().unwrap();
    assert_ne!(alice, everyone[0]);
    assert_eq!(graph.session().len(), 2);

    graph.set(alice, "age", 31).unwrap();
    graph.clear();
    assert!(graph.session().is_empty());
    assert!(graph.entity(alice).is_err());
    assert!(matches!(graph.set(everyone[1], "age", 26), Err(OgmError::InvalidArgument(_))));
    assert_eq!(graph.flush().unwrap(), 0);
    assert_eq!(graph.executor().executed(), 2);
}

#[test]
fn test_hook_event_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut graph = graph();
    for event in [EventKind::PreAdd, EventKind::PostAdd, EventKind::PreUpdate, EventKind::PostUpdate] {
        let events = events.clone();
        graph.hooks_mut().on(HookTarget::AnyVertex, event, move |entity, event| {
            events.lock().unwrap().push(format!("{} {}", event, entity.describe()));
            Ok(())
        });
    }
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(vec![person_row(1, "Alice", 31)]);

    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    graph.set(alice, "age", 31).unwrap();
    graph.update(alice).unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "pre_add transient vertex Person",
            "post_add Person[1]",
            "pre_update Person[1]",
            "post_update Person[1]",
        ]
    );
}

#[test]
fn test_connect_requires_persisted_endpoints() {
    let mut graph = graph();
    graph.executor().respond(vec![person_row(1, "Alice", 30)]);
    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    let stranger = graph.track(Entity::from_model(&Person::new("Eve", 22)).unwrap());
    let edge = graph.track(Entity::from_model(&Knows { since: 2024 }).unwrap());

    assert!(matches!(graph.connect(alice, edge, stranger), Err(OgmError::State { .. })));
    assert!(matches!(graph.connect(alice, alice, alice), Err(OgmError::InvalidArgument(_))));
    assert!(matches!(graph.add(edge), Err(OgmError::InvalidArgument(_))));
    assert_eq!(graph.executor().executed(), 1);
}

#[test]
fn test_connect_to_vanished_vertex() {
    let mut graph = graph();
    graph
        .executor()
        .respond(vec![person_row(1, "Alice", 30)])
        .respond(vec![person_row(2, "Bob", 25)])
        .respond(vec![]);
    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    let bob = graph.add_model(&Person::new("Bob", 25)).unwrap();
    let edge = graph.track(Entity::from_model(&Knows { since: 2024 }).unwrap());

    assert!(matches!(graph.connect(alice, edge, bob), Err(OgmError::DataIntegrity { .. })));
    assert_eq!(graph.entity(edge).unwrap().state(), EntityState::Transient);
}

#[test]
fn test_connection_error_leaves_entity_dirty() {
    let mut graph = graph();
    graph.executor().respond(vec![person_row(1, "Alice", 30)]);
    let alice = graph.add_model(&Person::new("Alice", 30)).unwrap();
    graph.set(alice, "age", 31).unwrap();

    assert!(matches!(graph.update(alice), Err(OgmError::Connection(_))));
    assert_eq!(graph.entity(alice).unwrap().state(), EntityState::Dirty);
    assert_eq!(graph.session().dirty_keys(), vec![alice]);
}
