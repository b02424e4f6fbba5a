//! State shared by the blocking and async façades
//!
//! Every entity operation is split into a `prepare_*` step that validates,
//! runs pre-event hooks and renders the statement, and a `finish_*` step
//! that consumes the returned rows. The façades only add the round trip in
//! between, so both flavors behave identically.

use super::hooks::{EventKind, HookRegistry};
use crate::config::OgmConfig;
use crate::error::{OgmError, OgmResult};
use crate::graph::{
    Direction, EntityIdentity, EntityKind, GraphId, LabelSchema, PropertyMap, PropertyValue, Schema,
};
use crate::query::ident::quote_ident;
use crate::query::params::bind_generated;
use crate::query::{ParamMap, Params, QueryBuilder, RawRow, Row, Statement, ALIAS, COUNT_COLUMN, ID_COLUMN};
use crate::session::{Entity, EntityKey, EntityState, Session};
use crate::traverse::{ExpandFilter, ExpandPair, ExpandPlan, Related, RelationshipDescriptor};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const ID_PARAM: &str = "id";
const ROWS_PARAM: &str = "rows";
const IDS_PARAM: &str = "ids";

#[derive(Debug)]
pub struct GraphContext {
    config: OgmConfig,
    schema: Schema,
    session: Session,
    hooks: HookRegistry,
    relations: FxHashMap<(EntityKey, String), RelationshipDescriptor>,
}

impl GraphContext {
    pub fn new(config: OgmConfig) -> OgmResult<Self> {
        config.validate()?;
        Ok(GraphContext {
            config,
            schema: Schema::new(),
            session: Session::new(),
            hooks: HookRegistry::new(),
            relations: FxHashMap::default(),
        })
    }

    pub fn config(&self) -> &OgmConfig {
        &self.config
    }

    pub fn graph_name(&self) -> &str {
        &self.config.graph
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn register(&mut self, schema: LabelSchema) -> OgmResult<()> {
        debug!("Registering {} schema `{}`", schema.kind, schema.label);
        self.schema.register(schema)
    }

    /// Registered schema for a label. In strict mode an unregistered label
    /// is an error; a registered label of the other kind always is.
    fn label_schema(&self, label: &str, kind: EntityKind) -> OgmResult<Option<&LabelSchema>> {
        match self.schema.get(label) {
            Some(schema) if schema.kind != kind => Err(OgmError::schema(
                label,
                None,
                format!("label is registered as a {}, not a {}", schema.kind, kind),
            )),
            Some(schema) => Ok(Some(schema)),
            None if self.config.strict_schema => {
                Err(OgmError::schema(label, None, "label is not registered"))
            }
            None => Ok(None),
        }
    }

    pub fn track(&mut self, entity: Entity) -> EntityKey {
        self.session.track(entity)
    }

    pub fn entity(&self, key: EntityKey) -> OgmResult<&Entity> {
        self.session.get(key)
    }

    /// Set one property, checked against the label's schema
    pub fn set(&mut self, key: EntityKey, field: &str, value: PropertyValue) -> OgmResult<()> {
        let entity = self.session.get(key)?;
        if let Some(schema) = self.label_schema(entity.label(), entity.kind())? {
            schema.check_value(field, &value)?;
        }
        self.session.get_mut(key)?.set(field, value)
    }

    /// Write a model's properties over the entity's, checked against the
    /// label's schema. Stored fields the model does not produce are kept.
    pub fn merge(&mut self, key: EntityKey, properties: PropertyMap) -> OgmResult<()> {
        let entity = self.session.get(key)?;
        if let Some(schema) = self.label_schema(entity.label(), entity.kind())? {
            schema.check_properties(&properties, false)?;
        }
        self.session.get_mut(key)?.merge_properties(properties)
    }

    /// Stop tracking one entity. Relationship values owned by it are dropped
    /// and cached values that reference it are invalidated.
    pub fn evict(&mut self, key: EntityKey) -> OgmResult<Entity> {
        let entity = self.session.evict(key)?;
        self.relations.retain(|(owner, _), _| *owner != key);
        for descriptor in self.relations.values_mut() {
            if descriptor.cached().map_or(false, |related| related.keys().contains(&key)) {
                descriptor.invalidate();
            }
        }
        debug!("Evicted {}", entity.describe());
        Ok(entity)
    }

    /// Forget every tracked entity; keys handed out earlier stop resolving
    pub fn clear(&mut self) {
        debug!("Clearing session of {} entities", self.session.len());
        self.session.clear();
        self.relations.clear();
    }

    /// Query over a label, using its registered schema when there is one
    pub fn query(&self, label: &str, kind: EntityKind) -> OgmResult<QueryBuilder> {
        match self.label_schema(label, kind)? {
            Some(schema) => QueryBuilder::for_schema(schema),
            None => match kind {
                EntityKind::Vertex => QueryBuilder::vertices(label),
                EntityKind::Edge => QueryBuilder::edges(label),
            },
        }
    }

    pub fn by_id_query(&self, label: &str, id: GraphId) -> OgmResult<QueryBuilder> {
        let kind = self.schema.get(label).map_or(EntityKind::Vertex, |s| s.kind);
        let mut params = Params::new();
        params.push(ID_PARAM, id.as_i64());
        self.query(label, kind)?
            .filter(&format!("id({}) = ${}", ALIAS, ID_PARAM), params)
    }

    /// Query for entities whose `field` equals `value`
    pub fn by_property_query(&self, label: &str, field: &str, value: PropertyValue) -> OgmResult<QueryBuilder> {
        let kind = self.schema.get(label).map_or(EntityKind::Vertex, |s| s.kind);
        let mut fields = Params::new();
        fields.push(field, value);
        self.query(label, kind)?.filter_by(fields)
    }

    pub fn prepare_add(&self, key: EntityKey) -> OgmResult<Statement> {
        let entity = self.session.get(key)?;
        if entity.kind() != EntityKind::Vertex {
            return Err(OgmError::InvalidArgument(format!(
                "{} is an edge; connect it between two vertices instead",
                entity.describe()
            )));
        }
        self.check_creatable(entity)?;
        self.hooks.dispatch(entity, EventKind::PreAdd)?;

        let mut params = ParamMap::new();
        let props = property_literal(entity.properties(), &mut params);
        let cypher = format!("CREATE ({}:{}{})\nRETURN {}", ALIAS, entity.label(), props, ALIAS);
        Statement::new(cypher, params, vec![ALIAS.to_string()])
    }

    pub fn finish_add(&mut self, key: EntityKey, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<EntityIdentity> {
        let describe = self.session.get(key)?.describe();
        let row = single_row(rows, statement, &describe)?;
        let record = row.vertex(ALIAS)?;
        let identity = record.identity.clone();
        self.session.assign(key, identity.clone(), record.properties, None)?;
        self.post_event(key, EventKind::PostAdd);
        info!("Created {}", identity);
        Ok(identity)
    }

    pub fn prepare_connect(&self, from: EntityKey, edge: EntityKey, to: EntityKey) -> OgmResult<Statement> {
        let start = self.endpoint(from)?;
        let end = self.endpoint(to)?;
        let entity = self.session.get(edge)?;
        if entity.kind() != EntityKind::Edge {
            return Err(OgmError::InvalidArgument(format!(
                "{} is a vertex, not an edge",
                entity.describe()
            )));
        }
        self.check_creatable(entity)?;
        self.hooks.dispatch(entity, EventKind::PreAdd)?;

        let mut params = ParamMap::new();
        params.insert("start_id".to_string(), start.id.as_i64().into());
        params.insert("end_id".to_string(), end.id.as_i64().into());
        let props = property_literal(entity.properties(), &mut params);
        let cypher = format!(
            "MATCH (a:{}), (b:{})\nWHERE id(a) = $start_id AND id(b) = $end_id\nCREATE (a)-[{}:{}{}]->(b)\nRETURN {}",
            start.label,
            end.label,
            ALIAS,
            entity.label(),
            props,
            ALIAS
        );
        Statement::new(cypher, params, vec![ALIAS.to_string()])
    }

    pub fn finish_connect(&mut self, edge: EntityKey, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<EntityIdentity> {
        let describe = self.session.get(edge)?.describe();
        if rows.is_empty() {
            return Err(OgmError::DataIntegrity {
                entity: describe,
                reason: "an endpoint vertex no longer exists".to_string(),
            });
        }
        let row = single_row(rows, statement, &describe)?;
        let record = row.edge(ALIAS)?;
        let identity = record.identity.clone();
        self.session.assign(
            edge,
            identity.clone(),
            record.properties,
            Some((record.start_id, record.end_id)),
        )?;
        self.post_event(edge, EventKind::PostAdd);
        info!("Created {} from {} to {}", identity, record.start_id, record.end_id);
        Ok(identity)
    }

    /// None when the entity has nothing to flush
    pub fn prepare_update(&self, key: EntityKey) -> OgmResult<Option<Statement>> {
        let entity = self.session.get(key)?;
        let identity = entity.require_identity()?;
        if entity.state() != EntityState::Dirty {
            return Ok(None);
        }
        let dirty = entity.dirty_properties();
        if let Some(schema) = self.label_schema(entity.label(), entity.kind())? {
            schema.check_properties(&dirty, false)?;
        }
        self.hooks.dispatch(entity, EventKind::PreUpdate)?;

        let mut params = ParamMap::new();
        params.insert(ID_PARAM.to_string(), identity.id.as_i64().into());
        let sets = dirty
            .into_iter()
            .map(|(field, value)| {
                let name = bind_generated(&mut params, &field, value);
                format!("{}.{} = ${}", ALIAS, quote_ident(&field), name)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let cypher = format!(
            "{}\nWHERE id({}) = ${}\nSET {}\nRETURN {}",
            match_one(entity.kind(), &identity.label),
            ALIAS,
            ID_PARAM,
            sets,
            ALIAS
        );
        Statement::new(cypher, params, vec![ALIAS.to_string()]).map(Some)
    }

    pub fn finish_update(&mut self, key: EntityKey, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<()> {
        let entity = self.session.get(key)?;
        let describe = entity.describe();
        let kind = entity.kind();
        if rows.is_empty() {
            return Err(OgmError::DataIntegrity {
                entity: describe,
                reason: "entity no longer exists in the graph".to_string(),
            });
        }
        let row = single_row(rows, statement, &describe)?;
        let properties = match kind {
            EntityKind::Vertex => row.vertex(ALIAS)?.properties,
            EntityKind::Edge => row.edge(ALIAS)?.properties,
        };
        self.session.get_mut(key)?.mark_flushed(properties);
        self.post_event(key, EventKind::PostUpdate);
        debug!("Flushed {}", describe);
        Ok(())
    }

    pub fn prepare_delete(&self, key: EntityKey) -> OgmResult<Statement> {
        let entity = self.session.get(key)?;
        let identity = entity.require_identity()?;
        self.hooks.dispatch(entity, EventKind::PreDelete)?;

        let mut params = ParamMap::new();
        params.insert(ID_PARAM.to_string(), identity.id.as_i64().into());
        let delete = match entity.kind() {
            EntityKind::Vertex => "DETACH DELETE",
            EntityKind::Edge => "DELETE",
        };
        let cypher = format!(
            "{}\nWHERE id({}) = ${}\n{} {}",
            match_one(entity.kind(), &identity.label),
            ALIAS,
            ID_PARAM,
            delete,
            ALIAS
        );
        Statement::new(cypher, params, Vec::new())
    }

    pub fn finish_delete(&mut self, key: EntityKey) -> OgmResult<()> {
        let cascaded = self.session.revoke(key)?;
        self.relations
            .retain(|(owner, _), _| *owner != key && !cascaded.contains(owner));
        self.post_event(key, EventKind::PostDelete);
        info!("Deleted {}", self.session.get(key)?.describe());
        Ok(())
    }

    pub fn prepare_bulk_add(&self, keys: &[EntityKey]) -> OgmResult<Statement> {
        let first = keys
            .first()
            .ok_or_else(|| OgmError::InvalidArgument("bulk add needs at least one entity".to_string()))?;
        let label = self.session.get(*first)?.label().to_string();
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(keys.len());
        let mut seen = FxHashSet::default();
        for key in keys {
            let entity = self.session.get(*key)?;
            if !seen.insert(*key) {
                return Err(OgmError::InvalidArgument(format!(
                    "{} appears more than once in bulk add",
                    entity.describe()
                )));
            }
            if entity.kind() != EntityKind::Vertex || entity.label() != label {
                return Err(OgmError::InvalidArgument(format!(
                    "bulk add needs vertices of one label; {} is not a `{}` vertex",
                    entity.describe(),
                    label
                )));
            }
            self.check_creatable(entity)?;
            let row = non_null(entity.properties());
            for field in row.keys() {
                if !columns.contains(field) {
                    columns.push(field.clone());
                }
            }
            rows.push(PropertyValue::Map(row));
        }
        for key in keys {
            self.hooks.dispatch(self.session.get(*key)?, EventKind::PreAdd)?;
        }

        let assignments = columns
            .iter()
            .map(|c| format!("{}: row.{}", quote_ident(c), quote_ident(c)))
            .collect::<Vec<_>>();
        let mut params = ParamMap::new();
        params.insert(ROWS_PARAM.to_string(), PropertyValue::List(rows));
        let cypher = format!(
            "UNWIND ${} AS row\nCREATE ({}:{}{})\nRETURN {}",
            ROWS_PARAM,
            ALIAS,
            label,
            map_literal(&assignments),
            ALIAS
        );
        Statement::new(cypher, params, vec![ALIAS.to_string()])
    }

    pub fn finish_bulk_add(&mut self, keys: &[EntityKey], rows: Vec<RawRow>, statement: &Statement) -> OgmResult<Vec<EntityIdentity>> {
        let records = decode_rows(rows, statement, keys.len(), |row| row.vertex(ALIAS))?;
        let mut identities = Vec::with_capacity(keys.len());
        for (key, record) in keys.iter().zip(records) {
            let identity = record.identity.clone();
            self.session.assign(*key, identity.clone(), record.properties, None)?;
            identities.push(identity);
        }
        for key in keys {
            self.post_event(*key, EventKind::PostAdd);
        }
        info!("Bulk created {} vertices", identities.len());
        Ok(identities)
    }

    /// Each triple is (from, edge, to)
    pub fn prepare_bulk_connect(&self, triples: &[(EntityKey, EntityKey, EntityKey)]) -> OgmResult<Statement> {
        let (_, first, _) = triples
            .first()
            .ok_or_else(|| OgmError::InvalidArgument("bulk connect needs at least one edge".to_string()))?;
        let label = self.session.get(*first)?.label().to_string();
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(triples.len());
        let mut start_labels = Vec::new();
        let mut end_labels = Vec::new();
        let mut seen = FxHashSet::default();
        for (from, edge, to) in triples {
            let start = self.endpoint(*from)?;
            let end = self.endpoint(*to)?;
            let entity = self.session.get(*edge)?;
            if !seen.insert(*edge) {
                return Err(OgmError::InvalidArgument(format!(
                    "{} appears more than once in bulk connect",
                    entity.describe()
                )));
            }
            if entity.kind() != EntityKind::Edge || entity.label() != label {
                return Err(OgmError::InvalidArgument(format!(
                    "bulk connect needs edges of one label; {} is not a `{}` edge",
                    entity.describe(),
                    label
                )));
            }
            self.check_creatable(entity)?;
            let properties = non_null(entity.properties());
            for field in properties.keys() {
                if !columns.contains(field) {
                    columns.push(field.clone());
                }
            }
            let mut row = PropertyMap::new();
            row.insert("start_id".to_string(), start.id.as_i64().into());
            row.insert("end_id".to_string(), end.id.as_i64().into());
            row.insert("properties".to_string(), PropertyValue::Map(properties));
            rows.push(PropertyValue::Map(row));
            start_labels.push(start.label.clone());
            end_labels.push(end.label.clone());
        }
        for (_, edge, _) in triples {
            self.hooks.dispatch(self.session.get(*edge)?, EventKind::PreAdd)?;
        }

        let assignments = columns
            .iter()
            .map(|c| format!("{}: row.properties.{}", quote_ident(c), quote_ident(c)))
            .collect::<Vec<_>>();
        let mut params = ParamMap::new();
        params.insert(ROWS_PARAM.to_string(), PropertyValue::List(rows));
        let cypher = format!(
            "UNWIND ${} AS row\nMATCH (a{}), (b{})\nWHERE id(a) = row.start_id AND id(b) = row.end_id\nCREATE (a)-[{}:{}{}]->(b)\nRETURN {}",
            ROWS_PARAM,
            shared_label(&start_labels),
            shared_label(&end_labels),
            ALIAS,
            label,
            map_literal(&assignments),
            ALIAS
        );
        Statement::new(cypher, params, vec![ALIAS.to_string()])
    }

    pub fn finish_bulk_connect(
        &mut self,
        triples: &[(EntityKey, EntityKey, EntityKey)],
        rows: Vec<RawRow>,
        statement: &Statement,
    ) -> OgmResult<Vec<EntityIdentity>> {
        let records = decode_rows(rows, statement, triples.len(), |row| row.edge(ALIAS))?;
        let mut identities = Vec::with_capacity(triples.len());
        for ((_, edge, _), record) in triples.iter().zip(records) {
            let identity = record.identity.clone();
            let endpoints = Some((record.start_id, record.end_id));
            self.session.assign(*edge, identity.clone(), record.properties, endpoints)?;
            identities.push(identity);
        }
        for (_, edge, _) in triples {
            self.post_event(*edge, EventKind::PostAdd);
        }
        info!("Bulk created {} edges", identities.len());
        Ok(identities)
    }

    /// Attach every `n` column of a builder's result to the session
    pub fn attach_rows(&mut self, kind: EntityKind, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<Vec<EntityKey>> {
        let columns: Arc<[String]> = statement.columns().iter().cloned().collect();
        rows.into_iter()
            .map(|raw| self.attach_row(kind, Row::from_raw(columns.clone(), raw)?))
            .collect()
    }

    pub fn attach_row(&mut self, kind: EntityKind, row: Row) -> OgmResult<EntityKey> {
        Ok(match kind {
            EntityKind::Vertex => self.session.attach_vertex(row.vertex(ALIAS)?),
            EntityKind::Edge => self.session.attach_edge(row.edge(ALIAS)?),
        })
    }

    /// Result of `one`: the first row plus the number of rows seen, which is
    /// at most two since the statement is capped
    pub fn finish_one(&mut self, query: &QueryBuilder, first: Option<RawRow>, count: usize, statement: &Statement) -> OgmResult<EntityKey> {
        match (first, count) {
            (Some(raw), 1) => {
                let columns: Arc<[String]> = statement.columns().iter().cloned().collect();
                self.attach_row(query.kind(), Row::from_raw(columns, raw)?)
            }
            (_, 0) | (None, _) => Err(OgmError::NotFound {
                label: query.label().to_string(),
            }),
            (_, count) => Err(OgmError::MultipleResults {
                label: query.label().to_string(),
                count,
            }),
        }
    }

    pub fn finish_count(&self, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<u64> {
        let row = single_row(rows, statement, "count")?;
        let total = row.decode(COUNT_COLUMN)?;
        total
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| OgmError::Decode {
                fragment: total.to_string(),
                reason: "count is not a non-negative integer".to_string(),
            })
    }

    /// Ids of the entities a `delete_where` is about to remove; `rows` come
    /// from `QueryBuilder::build_ids`
    pub fn matched_ids(&self, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<Vec<GraphId>> {
        let columns: Arc<[String]> = statement.columns().iter().cloned().collect();
        rows.into_iter()
            .map(|raw| {
                let id = Row::from_raw(columns.clone(), raw)?.decode(ID_COLUMN)?;
                id.as_integer().map(GraphId).ok_or_else(|| OgmError::Decode {
                    fragment: id.to_string(),
                    reason: "id is not an integer".to_string(),
                })
            })
            .collect()
    }

    /// Delete exactly the ids read beforehand, so rows that start matching
    /// in between are left alone
    pub fn prepare_delete_matched(&self, query: &QueryBuilder, ids: &[GraphId]) -> OgmResult<Statement> {
        let mut params = ParamMap::new();
        params.insert(
            IDS_PARAM.to_string(),
            PropertyValue::List(ids.iter().map(|id| id.as_i64().into()).collect()),
        );
        let delete = match query.kind() {
            EntityKind::Vertex => "DETACH DELETE",
            EntityKind::Edge => "DELETE",
        };
        let cypher = format!(
            "{}\nWHERE id({}) IN ${}\n{} {}",
            match_one(query.kind(), query.label()),
            ALIAS,
            IDS_PARAM,
            delete,
            ALIAS
        );
        Statement::new(cypher, params, Vec::new())
    }

    /// Revoke tracked entities removed by a `delete_where`
    pub fn finish_delete_where(&mut self, query: &QueryBuilder, ids: &[GraphId]) -> OgmResult<u64> {
        for id in ids {
            let identity = EntityIdentity::new(query.label(), id.as_i64());
            if let Some(key) = self.session.lookup(&identity) {
                let cascaded = self.session.revoke(key)?;
                self.relations
                    .retain(|(owner, _), _| *owner != key && !cascaded.contains(owner));
            }
        }
        info!("Deleted {} `{}` entities", ids.len(), query.label());
        Ok(ids.len() as u64)
    }

    /// Decode raw cypher results; vertex and edge values are left as records
    pub fn finish_cypher(&self, rows: Vec<RawRow>, statement: &Statement) -> OgmResult<Vec<PropertyMap>> {
        let columns: Arc<[String]> = statement.sql_columns().iter().map(|c| c.to_string()).collect();
        rows.into_iter()
            .map(|raw| Row::from_raw(columns.clone(), raw)?.decode_all())
            .collect()
    }

    /// Track a decoded vertex or edge value; other values are ignored
    pub fn attach_value(&mut self, value: &PropertyValue) -> Option<EntityKey> {
        match value {
            PropertyValue::Vertex(record) => Some(self.session.attach_vertex((**record).clone())),
            PropertyValue::Edge(record) => Some(self.session.attach_edge((**record).clone())),
            _ => None,
        }
    }

    pub fn plan_expand(
        &self,
        origin: &EntityIdentity,
        edge_label: &str,
        direction: Direction,
        depth: u32,
        target_label: Option<&str>,
    ) -> OgmResult<(Statement, ExpandFilter)> {
        let mut plan = ExpandPlan::new(origin.clone(), edge_label, direction, depth, self.config.max_depth)?;
        if let Some(label) = target_label {
            plan = plan.target_label(label)?;
        }
        let statement = plan.statement()?;
        let filter = plan.filter(&statement);
        Ok((statement, filter))
    }

    /// Start resolving a relationship. `Err` is returned with the descriptor
    /// untouched; `Ok(Err(related))` carries a cached value.
    pub fn begin_related(&mut self, key: EntityKey, name: &str) -> OgmResult<Result<(Statement, ExpandFilter), Related>> {
        let entity = self.session.get(key)?;
        let describe = entity.describe();
        let origin = entity.identity().cloned();
        let spec = self
            .schema
            .get(entity.label())
            .and_then(|s| s.relationships.get(name))
            .cloned()
            .ok_or_else(|| OgmError::schema(entity.label(), Some(name), "unknown relationship"))?;
        let descriptor = self
            .relations
            .entry((key, name.to_string()))
            .or_insert_with(|| RelationshipDescriptor::new(name, spec));
        match descriptor.begin(&describe, origin.as_ref(), self.config.max_depth)? {
            None => descriptor
                .cached()
                .cloned()
                .map(Err)
                .ok_or_else(|| OgmError::state(describe, "relationship cache is empty")),
            Some(plan) => {
                let statement = match plan.statement() {
                    Ok(statement) => statement,
                    Err(e) => {
                        descriptor.abort();
                        return Err(e);
                    }
                };
                let filter = plan.filter(&statement);
                Ok(Ok((statement, filter)))
            }
        }
    }

    pub fn complete_related(&mut self, key: EntityKey, name: &str, pairs: Vec<ExpandPair>) -> OgmResult<Related> {
        let describe = self.session.get(key)?.describe();
        let targets: Vec<EntityKey> = pairs
            .into_iter()
            .map(|(_, vertex)| self.session.attach_vertex(vertex))
            .collect();
        let descriptor = self
            .relations
            .get_mut(&(key, name.to_string()))
            .ok_or_else(|| OgmError::state(describe.clone(), format!("relationship `{}` is not resolving", name)))?;
        descriptor.complete(&describe, targets)
    }

    pub fn abort_related(&mut self, key: EntityKey, name: &str) {
        if let Some(descriptor) = self.relations.get_mut(&(key, name.to_string())) {
            descriptor.abort();
        }
    }

    /// Drop a cached relationship value; None drops all of the entity's
    pub fn invalidate_related(&mut self, key: EntityKey, name: Option<&str>) {
        for ((owner, relation), descriptor) in self.relations.iter_mut() {
            if *owner == key && name.map_or(true, |n| n == relation) {
                descriptor.invalidate();
            }
        }
    }

    /// Identity of a vertex about to become an edge endpoint
    fn endpoint(&self, key: EntityKey) -> OgmResult<EntityIdentity> {
        let entity = self.session.get(key)?;
        if entity.kind() != EntityKind::Vertex {
            return Err(OgmError::InvalidArgument(format!(
                "{} cannot be an edge endpoint",
                entity.describe()
            )));
        }
        entity.require_identity().cloned()
    }

    fn check_creatable(&self, entity: &Entity) -> OgmResult<()> {
        if entity.state() != EntityState::Transient {
            return Err(OgmError::state(entity.describe(), "entity is already persisted"));
        }
        if let Some(schema) = self.label_schema(entity.label(), entity.kind())? {
            schema.check_properties(entity.properties(), true)?;
        }
        Ok(())
    }

    /// The write has already committed, so handler failures are only logged
    fn post_event(&self, key: EntityKey, event: EventKind) {
        let Ok(entity) = self.session.get(key) else {
            return;
        };
        for error in self.hooks.notify(entity, event) {
            warn!("Ignoring failed {} handler for {}: {}", event, entity.describe(), error);
        }
    }
}

fn match_one(kind: EntityKind, label: &str) -> String {
    match kind {
        EntityKind::Vertex => format!("MATCH ({}:{})", ALIAS, label),
        EntityKind::Edge => format!("MATCH ()-[{}:{}]->()", ALIAS, label),
    }
}

fn non_null(properties: &PropertyMap) -> PropertyMap {
    properties
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn map_literal(entries: &[String]) -> String {
    if entries.is_empty() {
        String::new()
    } else {
        format!(" {{{}}}", entries.join(", "))
    }
}

/// ` {k: $k_0, ...}` for the non-null properties, binding each value
fn property_literal(properties: &PropertyMap, params: &mut ParamMap) -> String {
    let entries = non_null(properties)
        .into_iter()
        .map(|(field, value)| {
            let name = bind_generated(params, &field, value);
            format!("{}: ${}", quote_ident(&field), name)
        })
        .collect::<Vec<_>>();
    map_literal(&entries)
}

/// `:Label` when every entry names the same label
fn shared_label(labels: &[String]) -> String {
    match labels.split_first() {
        Some((first, rest)) if rest.iter().all(|l| l == first) => format!(":{}", first),
        _ => String::new(),
    }
}

fn single_row(rows: Vec<RawRow>, statement: &Statement, entity: &str) -> OgmResult<Row> {
    if rows.len() != 1 {
        return Err(OgmError::DataIntegrity {
            entity: entity.to_string(),
            reason: format!("expected exactly one result row, got {}", rows.len()),
        });
    }
    let columns: Arc<[String]> = statement.sql_columns().iter().map(|c| c.to_string()).collect();
    let raw = rows.into_iter().next().unwrap_or_default();
    Row::from_raw(columns, raw)
}

fn decode_rows<T>(
    rows: Vec<RawRow>,
    statement: &Statement,
    expected: usize,
    decode: impl Fn(&Row) -> OgmResult<T>,
) -> OgmResult<Vec<T>> {
    if rows.len() != expected {
        return Err(OgmError::DataIntegrity {
            entity: format!("bulk create of {}", expected),
            reason: format!("database returned {} rows", rows.len()),
        });
    }
    let columns: Arc<[String]> = statement.columns().iter().cloned().collect();
    rows.into_iter()
        .map(|raw| decode(&Row::from_raw(columns.clone(), raw)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FieldType;

    fn vertex(id: i64, label: &str, props: &str) -> String {
        format!(r#"{{"id": {}, "label": "{}", "properties": {}}}::vertex"#, id, label, props)
    }

    fn context() -> GraphContext {
        let mut ctx = GraphContext::new(OgmConfig::for_graph("social")).unwrap();
        ctx.register(
            LabelSchema::vertex("Person")
                .required("name", FieldType::String)
                .field("age", FieldType::Integer),
        )
        .unwrap();
        ctx
    }

    fn person(name: &str, age: i64) -> Entity {
        let mut props = PropertyMap::new();
        props.insert("name".into(), name.into());
        props.insert("age".into(), age.into());
        Entity::vertex("Person", props)
    }

    #[test]
    fn test_add_statement_and_finish() {
        let mut ctx = context();
        let key = ctx.track(person("Alice", 30));
        let st = ctx.prepare_add(key).unwrap();
        assert_eq!(st.cypher(), "CREATE (n:Person {name: $name_0, age: $age_0})\nRETURN n");

        let identity = ctx
            .finish_add(key, vec![vec![vertex(7, "Person", r#"{"name": "Alice", "age": 30}"#)]], &st)
            .unwrap();
        assert_eq!(identity, EntityIdentity::new("Person", 7));
        assert_eq!(ctx.entity(key).unwrap().state(), EntityState::Clean);
        assert!(ctx.prepare_add(key).is_err());
    }

    #[test]
    fn test_add_checks_schema() {
        let mut ctx = context();
        let key = ctx.track(Entity::vertex("Person", PropertyMap::new()));
        assert!(matches!(ctx.prepare_add(key), Err(OgmError::Schema { .. })));

        let mut strict = GraphContext::new(OgmConfig {
            strict_schema: true,
            ..OgmConfig::default()
        })
        .unwrap();
        let key = strict.track(Entity::vertex("Robot", PropertyMap::new()));
        assert!(matches!(strict.prepare_add(key), Err(OgmError::Schema { .. })));
    }

    #[test]
    fn test_update_only_dirty_fields() {
        let mut ctx = context();
        let key = ctx
            .session_mut()
            .attach_vertex(crate::protocol::decode_vertex(&vertex(1, "Person", r#"{"name": "Alice", "age": 30}"#)).unwrap());
        assert!(ctx.prepare_update(key).unwrap().is_none());

        ctx.set(key, "age", 31.into()).unwrap();
        let st = ctx.prepare_update(key).unwrap().unwrap();
        assert_eq!(st.cypher(), "MATCH (n:Person)\nWHERE id(n) = $id\nSET n.age = $age_0\nRETURN n");
        assert_eq!(st.param_names().collect::<Vec<_>>(), vec!["id", "age_0"]);
        assert!(ctx.set(key, "age", "old".into()).is_err());
    }

    #[test]
    fn test_delete_statement() {
        let mut ctx = context();
        let key = ctx
            .session_mut()
            .attach_vertex(crate::protocol::decode_vertex(&vertex(1, "Person", r#"{"name": "Alice"}"#)).unwrap());
        let st = ctx.prepare_delete(key).unwrap();
        assert_eq!(st.cypher(), "MATCH (n:Person)\nWHERE id(n) = $id\nDETACH DELETE n");
        ctx.finish_delete(key).unwrap();
        assert_eq!(ctx.entity(key).unwrap().state(), EntityState::Deleted);
        assert!(ctx.prepare_delete(key).is_err());
    }

    #[test]
    fn test_bulk_add_statement() {
        let mut ctx = context();
        let a = ctx.track(person("Alice", 30));
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Bob".into());
        let b = ctx.track(Entity::vertex("Person", props));
        let st = ctx.prepare_bulk_add(&[a, b]).unwrap();
        assert_eq!(
            st.cypher(),
            "UNWIND $rows AS row\nCREATE (n:Person {name: row.name, age: row.age})\nRETURN n"
        );
        let rows = st.params().get("rows").and_then(|v| v.as_list()).unwrap();
        assert_eq!(rows.len(), 2);

        let short = vec![vec![vertex(1, "Person", r#"{"name": "Alice"}"#)]];
        assert!(matches!(
            ctx.finish_bulk_add(&[a, b], short, &st),
            Err(OgmError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn test_shared_label() {
        assert_eq!(shared_label(&["A".into(), "A".into()]), ":A");
        assert_eq!(shared_label(&["A".into(), "B".into()]), "");
    }
}
