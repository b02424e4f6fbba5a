//! Finished statements: Cypher text plus a separate parameter map
//!
//! A `Statement` is the only thing executors ever see. Construction checks
//! that every `$placeholder` in the text has a binding, so a statement that
//! exists is always executable as far as parameters go.

use super::ident::check_ident;
use super::params::{bind_named, ParamMap, Params};
use crate::error::{OgmError, OgmResult};
use crate::protocol::agtype;
use regex::Regex;
use std::sync::OnceLock;

/// Column name used when a statement returns nothing
pub const DEFAULT_COLUMN: &str = "result";

/// Matches quoted strings and back-tick identifiers so placeholders inside
/// them are skipped; group 1 captures real placeholders.
fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|`[^`]*`|\$([A-Za-z_][A-Za-z0-9_]*)"#)
            .unwrap_or_else(|e| unreachable!("placeholder pattern is valid: {}", e))
    })
}

/// Cypher text with bound parameters and declared result columns
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    cypher: String,
    params: ParamMap,
    columns: Vec<String>,
}

impl Statement {
    /// Validate and assemble a statement
    pub fn new(cypher: impl Into<String>, params: ParamMap, columns: Vec<String>) -> OgmResult<Self> {
        let cypher = cypher.into();
        if cypher.contains("$$") {
            return Err(OgmError::InvalidArgument(
                "statement text must not contain `$$`".to_string(),
            ));
        }
        for column in &columns {
            check_ident(column, "column")?;
        }
        if let Some(name) = placeholders(&cypher).find(|name| !params.contains_key(*name)) {
            return Err(OgmError::UnboundParameter {
                name: name.to_string(),
            });
        }
        Ok(Statement {
            cypher,
            params,
            columns,
        })
    }

    /// Caller-written text with caller-named parameters. No predicate
    /// composition happens; only binding safety is enforced.
    pub fn raw(cypher: impl Into<String>, params: Params, columns: &[&str]) -> OgmResult<Self> {
        let mut map = ParamMap::new();
        for (name, value) in params {
            bind_named(&mut map, &name, value)?;
        }
        Self::new(cypher, map, columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn cypher(&self) -> &str {
        &self.cypher
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Columns as they appear in the SQL `AS (...)` clause
    pub fn sql_columns(&self) -> Vec<&str> {
        if self.columns.is_empty() {
            vec![DEFAULT_COLUMN]
        } else {
            self.columns.iter().map(String::as_str).collect()
        }
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// The agtype map literal passed as the statement's single SQL parameter
    pub fn params_literal(&self) -> String {
        agtype::encode_map(&self.params)
    }

    /// Render the SQL that runs this statement through AGE. Parameters are
    /// sent separately as `$1`, the value of `params_literal()`.
    pub fn to_sql(&self, graph: &str) -> OgmResult<String> {
        check_ident(graph, "graph")?;
        let cols = self
            .sql_columns()
            .iter()
            .map(|c| format!("{} agtype", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = if self.params.is_empty() {
            format!(
                "SELECT * FROM ag_catalog.cypher('{}', $$ {} $$) AS ({})",
                graph, self.cypher, cols
            )
        } else {
            format!(
                "SELECT * FROM ag_catalog.cypher('{}', $$ {} $$, $1) AS ({})",
                graph, self.cypher, cols
            )
        };
        Ok(sql)
    }
}

fn placeholders(cypher: &str) -> impl Iterator<Item = &str> {
    placeholder_regex()
        .captures_iter(cypher)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn test_unbound_placeholder_rejected() {
        let err = Statement::raw("MATCH (n) WHERE n.age > $min_age RETURN n", params! {}, &["n"])
            .unwrap_err();
        assert!(matches!(err, OgmError::UnboundParameter { ref name } if name == "min_age"));
    }

    #[test]
    fn test_placeholders_inside_strings_ignored() {
        let st = Statement::raw(
            "MATCH (n) WHERE n.note = 'costs $5 or $price' AND n.`$odd` = $v RETURN n",
            params! { "v" => 1 },
            &["n"],
        )
        .unwrap();
        assert_eq!(st.param_names().collect::<Vec<_>>(), vec!["v"]);
    }

    #[test]
    fn test_dollar_quote_rejected() {
        let err = Statement::raw("RETURN 1 $$ ; DROP TABLE x", params! {}, &["x"]).unwrap_err();
        assert!(matches!(err, OgmError::InvalidArgument(_)));
    }

    #[test]
    fn test_duplicate_raw_param_rejected() {
        let err = Statement::raw("RETURN $a", params! { "a" => 1, "a" => 2 }, &["x"]).unwrap_err();
        assert!(matches!(err, OgmError::ParameterConflict { .. }));
    }

    #[test]
    fn test_bad_column_rejected() {
        assert!(Statement::raw("RETURN 1", params! {}, &["a b"]).is_err());
    }

    #[test]
    fn test_to_sql() {
        let st = Statement::raw(
            "MATCH (n:Person) WHERE n.name = $name RETURN n",
            params! { "name" => "Alice" },
            &["n"],
        )
        .unwrap();
        assert_eq!(
            st.to_sql("social").unwrap(),
            "SELECT * FROM ag_catalog.cypher('social', $$ MATCH (n:Person) WHERE n.name = $name RETURN n $$, $1) AS (n agtype)"
        );
        assert_eq!(st.params_literal(), r#"{"name": "Alice"}"#);
        assert!(st.to_sql("bad'graph").is_err());

        let delete = Statement::raw("MATCH (n) DETACH DELETE n", params! {}, &[]).unwrap();
        assert_eq!(
            delete.to_sql("social").unwrap(),
            "SELECT * FROM ag_catalog.cypher('social', $$ MATCH (n) DETACH DELETE n $$) AS (result agtype)"
        );
    }
}
