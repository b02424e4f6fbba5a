//! Blocking graph façade

use super::context::GraphContext;
use super::executor::{Executor, RowIter};
use super::hooks::HookRegistry;
use crate::config::OgmConfig;
use crate::error::OgmResult;
use crate::graph::{
    Direction, EntityIdentity, EntityKind, GraphId, LabelSchema, Model, PropertyMap, PropertyValue,
};
use crate::query::{Params, QueryBuilder, RawRow, Statement};
use crate::session::{Entity, EntityKey, Session};
use crate::traverse::{ExpandPair, Expansion, Related, Traversal};
use tracing::debug;

/// Object-graph mapper over a blocking executor
///
/// One `Graph` owns one session; `&mut self` on every mutating call keeps
/// each entity's read-modify-flush sequence exclusive.
pub struct Graph<E> {
    executor: E,
    ctx: GraphContext,
}

impl<E: Executor> Graph<E> {
    pub fn new(executor: E, config: OgmConfig) -> OgmResult<Self> {
        Ok(Graph {
            executor,
            ctx: GraphContext::new(config)?,
        })
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &OgmConfig {
        self.ctx.config()
    }

    pub fn session(&self) -> &Session {
        self.ctx.session()
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        self.ctx.hooks_mut()
    }

    /// Register a model's schema
    pub fn register<M: Model>(&mut self) -> OgmResult<()> {
        self.ctx.register(M::schema())
    }

    pub fn register_schema(&mut self, schema: LabelSchema) -> OgmResult<()> {
        self.ctx.register(schema)
    }

    pub fn track(&mut self, entity: Entity) -> EntityKey {
        self.ctx.track(entity)
    }

    /// Stop tracking an entity; its key no longer resolves
    pub fn evict(&mut self, key: EntityKey) -> OgmResult<Entity> {
        self.ctx.evict(key)
    }

    /// Forget every tracked entity and cached relationship
    pub fn clear(&mut self) {
        self.ctx.clear()
    }

    pub fn entity(&self, key: EntityKey) -> OgmResult<&Entity> {
        self.ctx.entity(key)
    }

    pub fn set(&mut self, key: EntityKey, field: &str, value: impl Into<PropertyValue>) -> OgmResult<()> {
        self.ctx.set(key, field, value.into())
    }

    pub fn model<M: Model>(&self, key: EntityKey) -> OgmResult<M> {
        self.ctx.entity(key)?.to_model()
    }

    /// Edit an entity through its model; changed fields become dirty
    pub fn modify<M: Model>(&mut self, key: EntityKey, edit: impl FnOnce(&mut M)) -> OgmResult<()> {
        let mut model: M = self.model(key)?;
        edit(&mut model);
        self.ctx.merge(key, model.to_properties()?)
    }

    fn run(&self, statement: &Statement) -> OgmResult<RowIter<'_>> {
        debug!(
            "Executing on graph {} with params [{}]: {}",
            self.ctx.graph_name(),
            statement.param_names().collect::<Vec<_>>().join(", "),
            statement.cypher()
        );
        self.executor.execute(self.ctx.graph_name(), statement)
    }

    fn run_collect(&self, statement: &Statement) -> OgmResult<Vec<RawRow>> {
        self.run(statement)?.collect()
    }

    /// Create a transient vertex
    pub fn add(&mut self, key: EntityKey) -> OgmResult<EntityIdentity> {
        let statement = self.ctx.prepare_add(key)?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_add(key, rows, &statement)
    }

    pub fn add_model<M: Model>(&mut self, model: &M) -> OgmResult<EntityKey> {
        let key = self.ctx.track(Entity::from_model(model)?);
        self.add(key)?;
        Ok(key)
    }

    /// Create a transient edge between two persisted vertices
    pub fn connect(&mut self, from: EntityKey, edge: EntityKey, to: EntityKey) -> OgmResult<EntityIdentity> {
        let statement = self.ctx.prepare_connect(from, edge, to)?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_connect(edge, rows, &statement)
    }

    pub fn connect_model<M: Model>(&mut self, from: EntityKey, edge: &M, to: EntityKey) -> OgmResult<EntityKey> {
        let key = self.ctx.track(Entity::from_model(edge)?);
        self.connect(from, key, to)?;
        Ok(key)
    }

    /// Write the entity's dirty fields; false when there was nothing to write
    pub fn update(&mut self, key: EntityKey) -> OgmResult<bool> {
        let Some(statement) = self.ctx.prepare_update(key)? else {
            return Ok(false);
        };
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_update(key, rows, &statement)?;
        Ok(true)
    }

    /// Update every dirty entity in tracking order, stopping at the first error
    pub fn flush(&mut self) -> OgmResult<usize> {
        let keys = self.ctx.session().dirty_keys();
        let mut flushed = 0;
        for key in keys {
            if self.update(key)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    pub fn delete(&mut self, key: EntityKey) -> OgmResult<()> {
        let statement = self.ctx.prepare_delete(key)?;
        self.run_collect(&statement)?;
        self.ctx.finish_delete(key)
    }

    /// Create many vertices of one label in one round trip
    pub fn bulk_add(&mut self, keys: &[EntityKey]) -> OgmResult<Vec<EntityIdentity>> {
        let statement = self.ctx.prepare_bulk_add(keys)?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_bulk_add(keys, rows, &statement)
    }

    /// Create many edges of one label in one round trip
    pub fn bulk_connect(&mut self, triples: &[(EntityKey, EntityKey, EntityKey)]) -> OgmResult<Vec<EntityIdentity>> {
        let statement = self.ctx.prepare_bulk_connect(triples)?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_bulk_connect(triples, rows, &statement)
    }

    /// Query over a model's label, registering its schema on first use
    pub fn query<M: Model>(&mut self) -> OgmResult<QueryBuilder> {
        if !self.ctx.schema().contains(M::LABEL) {
            self.ctx.register(M::schema())?;
        }
        self.ctx.query(M::LABEL, M::KIND)
    }

    pub fn query_label(&self, label: &str) -> OgmResult<QueryBuilder> {
        self.ctx.query(label, EntityKind::Vertex)
    }

    pub fn query_edges(&self, label: &str) -> OgmResult<QueryBuilder> {
        self.ctx.query(label, EntityKind::Edge)
    }

    pub fn all(&mut self, query: &QueryBuilder) -> OgmResult<Vec<EntityKey>> {
        let statement = query.build()?;
        let rows = self.run_collect(&statement)?;
        self.ctx.attach_rows(query.kind(), rows, &statement)
    }

    pub fn all_as<M: Model>(&mut self, query: &QueryBuilder) -> OgmResult<Vec<M>> {
        self.all(query)?.into_iter().map(|key| self.model(key)).collect()
    }

    pub fn first(&mut self, query: &QueryBuilder) -> OgmResult<Option<EntityKey>> {
        let statement = query.build_capped(1)?;
        let rows = self.run_collect(&statement)?;
        Ok(self.ctx.attach_rows(query.kind(), rows, &statement)?.into_iter().next())
    }

    /// Exactly one match, else `NotFound` or `MultipleResults`. At most two
    /// rows are read.
    pub fn one(&mut self, query: &QueryBuilder) -> OgmResult<EntityKey> {
        let statement = query.build_capped(2)?;
        let mut rows = self.run_collect(&statement)?.into_iter();
        let first = rows.next();
        let count = usize::from(first.is_some()) + rows.count();
        self.ctx.finish_one(query, first, count, &statement)
    }

    pub fn count(&self, query: &QueryBuilder) -> OgmResult<u64> {
        let statement = query.build_count()?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_count(rows, &statement)
    }

    pub fn by_id(&mut self, label: &str, id: GraphId) -> OgmResult<Option<EntityKey>> {
        let query = self.ctx.by_id_query(label, id)?;
        self.first(&query)
    }

    /// First entity whose `field` equals `value`
    pub fn by_property(&mut self, label: &str, field: &str, value: impl Into<PropertyValue>) -> OgmResult<Option<EntityKey>> {
        let query = self.ctx.by_property_query(label, field, value.into())?;
        self.first(&query)
    }

    /// Set fields on every match; returns the number updated. Tracked
    /// entities pick up the new values the next time they are read.
    pub fn update_where(&mut self, query: &QueryBuilder, values: Params) -> OgmResult<u64> {
        let statement = query.build_update(values)?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_count(rows, &statement)
    }

    /// Delete every match; returns the number deleted. The matched ids are
    /// read first and the delete binds exactly those.
    pub fn delete_where(&mut self, query: &QueryBuilder) -> OgmResult<u64> {
        let statement = query.build_ids()?;
        let rows = self.run_collect(&statement)?;
        let ids = self.ctx.matched_ids(rows, &statement)?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.run_collect(&self.ctx.prepare_delete_matched(query, &ids)?)?;
        self.ctx.finish_delete_where(query, &ids)
    }

    /// Rows of named expressions; nothing is attached to the session
    pub fn project(&self, query: &QueryBuilder, projections: &[(&str, &str)]) -> OgmResult<Vec<PropertyMap>> {
        let statement = query.build_projection(projections)?;
        let rows = self.run_collect(&statement)?;
        self.ctx.finish_cypher(rows, &statement)
    }

    /// Run caller-written Cypher; vertex and edge values are tracked
    pub fn cypher(&mut self, text: &str, params: Params, columns: &[&str]) -> OgmResult<Vec<PropertyMap>> {
        let statement = Statement::raw(text, params, columns)?;
        let rows = self.run_collect(&statement)?;
        let results = self.ctx.finish_cypher(rows, &statement)?;
        for value in results.iter().flat_map(|row| row.values()) {
            self.ctx.attach_value(value);
        }
        Ok(results)
    }

    /// Track a vertex or edge value returned by `cypher`
    pub fn attach_value(&mut self, value: &PropertyValue) -> Option<EntityKey> {
        self.ctx.attach_value(value)
    }

    /// Lazy (edge, vertex) pairs within `depth` hops of `origin`
    pub fn expand(
        &self,
        origin: &EntityIdentity,
        edge_label: &str,
        direction: Direction,
        depth: u32,
    ) -> OgmResult<Expansion<RowIter<'_>>> {
        let (statement, filter) = self.ctx.plan_expand(origin, edge_label, direction, depth, None)?;
        let rows = self.run(&statement)?;
        Ok(Expansion::new(rows, filter))
    }

    /// Outbound traversal yielding tracked vertices
    pub fn traverse(
        &mut self,
        origin: &EntityIdentity,
        edge_label: &str,
        depth: u32,
        target_label: Option<&str>,
    ) -> OgmResult<Traversal<'_, Expansion<RowIter<'_>>>> {
        self.traverse_directed(origin, edge_label, Direction::Outbound, depth, target_label)
    }

    pub fn traverse_directed(
        &mut self,
        origin: &EntityIdentity,
        edge_label: &str,
        direction: Direction,
        depth: u32,
        target_label: Option<&str>,
    ) -> OgmResult<Traversal<'_, Expansion<RowIter<'_>>>> {
        let (statement, filter) = self
            .ctx
            .plan_expand(origin, edge_label, direction, depth, target_label)?;
        debug!(
            "Executing on graph {} with params [origin]: {}",
            self.ctx.graph_name(),
            statement.cypher()
        );
        let rows = self.executor.execute(self.ctx.graph_name(), &statement)?;
        Ok(Traversal::new(Expansion::new(rows, filter), self.ctx.session_mut()))
    }

    /// Outbound traversal to vertices of `M`'s label, decoded as models
    pub fn traverse_as<M: Model>(&mut self, origin: &EntityIdentity, edge_label: &str, depth: u32) -> OgmResult<Vec<M>> {
        let keys: Vec<EntityKey> = self
            .traverse(origin, edge_label, depth, Some(M::LABEL))?
            .collect::<OgmResult<_>>()?;
        keys.into_iter().map(|key| self.model(key)).collect()
    }

    /// Resolve a declared relationship, querying at most once until invalidated
    pub fn related(&mut self, key: EntityKey, name: &str) -> OgmResult<Related> {
        let (statement, filter) = match self.ctx.begin_related(key, name)? {
            Ok(plan) => plan,
            Err(cached) => return Ok(cached),
        };
        let pairs: OgmResult<Vec<ExpandPair>> = self
            .run(&statement)
            .and_then(|rows| Expansion::new(rows, filter).collect());
        match pairs {
            Ok(pairs) => self.ctx.complete_related(key, name, pairs),
            Err(e) => {
                self.ctx.abort_related(key, name);
                Err(e)
            }
        }
    }

    /// Drop a cached relationship; None drops all of the entity's
    pub fn invalidate_related(&mut self, key: EntityKey, name: Option<&str>) {
        self.ctx.invalidate_related(key, name)
    }
}
