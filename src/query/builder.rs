//! Fluent query builder
//!
//! Filters, sort keys and paging compose into one `MATCH` statement over a
//! single label, with the matched entity bound to the alias `n`:
//!
//! ```text
//! MATCH (n:Person)
//! WHERE (n.age > $min_age) AND (n.name = $name_0)
//! RETURN n
//! ORDER BY n.age DESC
//! SKIP 10
//! LIMIT 5
//! ```
//!
//! Every value is a bound parameter. Builders are values: each method
//! consumes and returns the builder, and `build*` never mutates it, so one
//! builder can produce its `all`, `count` and `first` variants. A projection
//! swaps `RETURN n` for named expressions and keeps the rest of the query.

use super::ident::{check_ident, quote_ident};
use super::params::{bind_generated, bind_named, ParamMap, Params};
use super::statement::Statement;
use crate::error::{OgmError, OgmResult};
use crate::graph::{EntityKind, LabelSchema};
use std::fmt::Write;

/// Variable the matched entity is bound to in predicates and sort keys
pub const ALIAS: &str = "n";

/// Column holding aggregate counts
pub const COUNT_COLUMN: &str = "total";

/// Column holding matched graph ids
pub const ID_COLUMN: &str = "nid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    joiner: Joiner,
    predicate: String,
}

/// Builder for queries over one vertex or edge label
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    label: String,
    kind: EntityKind,
    schema: Option<LabelSchema>,
    filters: Vec<Filter>,
    params: ParamMap,
    sort_keys: Vec<(String, SortOrder)>,
    skip: Option<u64>,
    limit: Option<u64>,
    full_scan: bool,
}

impl QueryBuilder {
    /// Query vertices of a label with no declared schema
    pub fn vertices(label: &str) -> OgmResult<Self> {
        Self::new(label, EntityKind::Vertex, None)
    }

    /// Query edges of a label with no declared schema
    pub fn edges(label: &str) -> OgmResult<Self> {
        Self::new(label, EntityKind::Edge, None)
    }

    /// Query a declared label; `filter_by` and `sort_by` fields are checked
    /// against the schema
    pub fn for_schema(schema: &LabelSchema) -> OgmResult<Self> {
        Self::new(&schema.label, schema.kind, Some(schema.clone()))
    }

    fn new(label: &str, kind: EntityKind, schema: Option<LabelSchema>) -> OgmResult<Self> {
        check_ident(label, "label")?;
        Ok(QueryBuilder {
            label: label.to_string(),
            kind,
            schema,
            filters: Vec::new(),
            params: ParamMap::new(),
            sort_keys: Vec::new(),
            skip: None,
            limit: None,
            full_scan: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn schema(&self) -> Option<&LabelSchema> {
        self.schema.as_ref()
    }

    /// AND a predicate written against `n`, with its named parameters
    pub fn filter(self, predicate: &str, params: Params) -> OgmResult<Self> {
        self.push_filter(Joiner::And, predicate, params)
    }

    /// OR a predicate onto the filters so far
    pub fn or_filter(self, predicate: &str, params: Params) -> OgmResult<Self> {
        self.push_filter(Joiner::Or, predicate, params)
    }

    fn push_filter(mut self, joiner: Joiner, predicate: &str, params: Params) -> OgmResult<Self> {
        let predicate = predicate.trim();
        if predicate.is_empty() {
            return Err(OgmError::InvalidArgument("filter predicate is empty".to_string()));
        }
        for (name, value) in params {
            bind_named(&mut self.params, &name, value)?;
        }
        self.filters.push(Filter {
            joiner,
            predicate: predicate.to_string(),
        });
        Ok(self)
    }

    /// One equality predicate per field, ANDed together
    pub fn filter_by(mut self, fields: Params) -> OgmResult<Self> {
        if fields.is_empty() {
            return Err(OgmError::InvalidArgument("filter_by needs at least one field".to_string()));
        }
        let mut clauses = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            if let Some(schema) = &self.schema {
                schema.check_value(&field, &value)?;
            }
            let name = bind_generated(&mut self.params, &field, value);
            clauses.push(format!("{}.{} = ${}", ALIAS, quote_ident(&field), name));
        }
        self.filters.push(Filter {
            joiner: Joiner::And,
            predicate: clauses.join(" AND "),
        });
        Ok(self)
    }

    /// Add a sort key written against `n`; the first key added is primary
    pub fn sort(mut self, expr: &str, order: SortOrder) -> OgmResult<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(OgmError::InvalidArgument("sort expression is empty".to_string()));
        }
        self.sort_keys.push((expr.to_string(), order));
        Ok(self)
    }

    /// Sort on a property, checked against the schema when one is declared
    pub fn sort_by(self, field: &str, order: SortOrder) -> OgmResult<Self> {
        if let Some(schema) = &self.schema {
            schema.check_field(field)?;
        }
        let expr = format!("{}.{}", ALIAS, quote_ident(field));
        self.sort(&expr, order)
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Allow building with no filters, matching every entity of the label
    pub fn full_scan(mut self) -> Self {
        self.full_scan = true;
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// `RETURN n` with sort keys and paging
    pub fn build(&self) -> OgmResult<Statement> {
        self.build_select(ALIAS, vec![ALIAS.to_string()], self.limit)
    }

    /// Like `build`, but never returns more than `cap` rows
    pub fn build_capped(&self, cap: u64) -> OgmResult<Statement> {
        let limit = Some(self.limit.map_or(cap, |l| l.min(cap)));
        self.build_select(ALIAS, vec![ALIAS.to_string()], limit)
    }

    /// `RETURN count(n)`; sort keys and paging do not apply
    pub fn build_count(&self) -> OgmResult<Statement> {
        let mut cypher = self.match_where()?;
        let _ = write!(cypher, "\nRETURN count({}) AS {}", ALIAS, COUNT_COLUMN);
        Statement::new(cypher, self.params.clone(), vec![COUNT_COLUMN.to_string()])
    }

    /// `RETURN id(n)` for every match, unordered and unpaged
    pub fn build_ids(&self) -> OgmResult<Statement> {
        let mut cypher = self.match_where()?;
        let _ = write!(cypher, "\nRETURN id({}) AS {}", ALIAS, ID_COLUMN);
        Statement::new(cypher, self.params.clone(), vec![ID_COLUMN.to_string()])
    }

    /// Bulk `SET` over every match, returning the number updated
    pub fn build_update(&self, values: Params) -> OgmResult<Statement> {
        if values.is_empty() {
            return Err(OgmError::InvalidArgument("update needs at least one field".to_string()));
        }
        let mut cypher = self.match_where()?;
        let mut params = self.params.clone();
        let mut sets = Vec::with_capacity(values.len());
        for (field, value) in values {
            if let Some(schema) = &self.schema {
                schema.check_value(&field, &value)?;
            }
            let name = bind_generated(&mut params, &format!("set_{}", field), value);
            sets.push(format!("{}.{} = ${}", ALIAS, quote_ident(&field), name));
        }
        let _ = write!(
            cypher,
            "\nSET {}\nRETURN count({}) AS {}",
            sets.join(", "),
            ALIAS,
            COUNT_COLUMN
        );
        Statement::new(cypher, params, vec![COUNT_COLUMN.to_string()])
    }

    /// Return named expressions over `n` instead of the entity, e.g.
    /// `[("n.name", "name"), ("size(n.tags)", "tags")]`. Sort keys and
    /// paging still apply.
    pub fn build_projection(&self, projections: &[(&str, &str)]) -> OgmResult<Statement> {
        if projections.is_empty() {
            return Err(OgmError::InvalidArgument("projection needs at least one column".to_string()));
        }
        let mut items = Vec::with_capacity(projections.len());
        let mut columns = Vec::with_capacity(projections.len());
        for (expr, column) in projections {
            let expr = expr.trim();
            if expr.is_empty() {
                return Err(OgmError::InvalidArgument(format!(
                    "projection column `{}` has an empty expression",
                    column
                )));
            }
            if columns.iter().any(|c: &String| c.as_str() == *column) {
                return Err(OgmError::InvalidArgument(format!("projection column `{}` appears twice", column)));
            }
            items.push(format!("{} AS {}", expr, column));
            columns.push(column.to_string());
        }
        self.build_select(&items.join(", "), columns, self.limit)
    }

    fn build_select(&self, returns: &str, columns: Vec<String>, limit: Option<u64>) -> OgmResult<Statement> {
        let mut cypher = self.match_where()?;
        let _ = write!(cypher, "\nRETURN {}", returns);
        if !self.sort_keys.is_empty() {
            let keys = self
                .sort_keys
                .iter()
                .map(|(expr, order)| format!("{} {}", expr, order.keyword()))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(cypher, "\nORDER BY {}", keys);
        }
        if let Some(skip) = self.skip {
            let _ = write!(cypher, "\nSKIP {}", skip);
        }
        if let Some(limit) = limit {
            let _ = write!(cypher, "\nLIMIT {}", limit);
        }
        Statement::new(cypher, self.params.clone(), columns)
    }

    fn match_where(&self) -> OgmResult<String> {
        if self.filters.is_empty() && !self.full_scan {
            return Err(OgmError::InvalidArgument(format!(
                "query on `{}` has no filters; call full_scan() to match every entity",
                self.label
            )));
        }
        let mut cypher = match self.kind {
            EntityKind::Vertex => format!("MATCH ({}:{})", ALIAS, self.label),
            EntityKind::Edge => format!("MATCH ()-[{}:{}]->()", ALIAS, self.label),
        };
        for (i, filter) in self.filters.iter().enumerate() {
            let joiner = match (i, filter.joiner) {
                (0, _) => "\nWHERE",
                (_, Joiner::And) => " AND",
                (_, Joiner::Or) => " OR",
            };
            let _ = write!(cypher, "{} ({})", joiner, filter.predicate);
        }
        Ok(cypher)
    }
}
