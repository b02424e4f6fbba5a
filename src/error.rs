//! Error types for the object-graph mapper
//!
//! Every variant carries the offending identity, field, parameter or literal
//! fragment so a caller can pinpoint the faulty entity or clause.

use thiserror::Error;

/// Errors raised by the codec, the query builder, the state tracker and the
/// graph façades.
#[derive(Error, Debug)]
pub enum OgmError {
    /// A parameter name is already bound in the query or collides with a
    /// Cypher reserved keyword
    #[error("parameter `${name}` conflicts: {reason}")]
    ParameterConflict { name: String, reason: &'static str },

    /// Statement text references a placeholder with no binding
    #[error("parameter `${name}` is referenced but never bound")]
    UnboundParameter { name: String },

    /// Unknown field or type mismatch against a declared label schema
    #[error("schema error on `{label}`{}: {reason}", field_suffix(.field))]
    Schema {
        label: String,
        field: Option<String>,
        reason: String,
    },

    /// A label, graph or column name that cannot be spliced into statement text
    #[error("invalid {context} identifier `{ident}`")]
    InvalidIdentifier { ident: String, context: &'static str },

    /// Malformed agtype literal
    #[error("cannot decode agtype near `{fragment}`: {reason}")]
    Decode { fragment: String, reason: String },

    /// Lifecycle violation (mutate after delete, persist twice, operate on a
    /// transient entity)
    #[error("{entity}: {reason}")]
    State { entity: String, reason: String },

    /// The database returned data that breaks a declared constraint
    #[error("data integrity violation on {entity}: {reason}")]
    DataIntegrity { entity: String, reason: String },

    /// Lazy relationship access on an entity without a graph identity
    #[error("cannot resolve relationship `{relation}` on {entity}: entity has no graph identity")]
    UnboundRelationship { entity: String, relation: String },

    /// Result rows do not match the declared column names
    #[error("result row has {actual} columns but {expected} column names were declared")]
    ColumnCount { expected: usize, actual: usize },

    /// `one()` matched nothing
    #[error("no `{label}` matched the query")]
    NotFound { label: String },

    /// `one()` matched more than one entity
    #[error("expected exactly one `{label}`, query matched at least {count}")]
    MultipleResults { label: String, count: usize },

    /// Argument outside the accepted domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A registered pre-hook rejected the operation
    #[error("{event} hook rejected {entity}: {reason}")]
    Hook {
        event: &'static str,
        entity: String,
        reason: String,
    },

    /// Error reported by the connection collaborator; never retried here
    #[error("Connection error: {0}")]
    Connection(String),

    /// Model (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OgmError {
    pub(crate) fn state(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        OgmError::State {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn schema(label: &str, field: Option<&str>, reason: impl Into<String>) -> Self {
        OgmError::Schema {
            label: label.to_string(),
            field: field.map(str::to_string),
            reason: reason.into(),
        }
    }
}

fn field_suffix(field: &Option<String>) -> String {
    field.as_ref().map(|f| format!(".{}", f)).unwrap_or_default()
}

pub type OgmResult<T> = Result<T, OgmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_field() {
        let err = OgmError::schema("Person", Some("nmae"), "unknown field");
        assert_eq!(err.to_string(), "schema error on `Person`.nmae: unknown field");

        let err = OgmError::schema("Person", None, "label is not registered");
        assert_eq!(err.to_string(), "schema error on `Person`: label is not registered");
    }

    #[test]
    fn test_parameter_conflict_message() {
        let err = OgmError::ParameterConflict {
            name: "min_age".into(),
            reason: "already bound",
        };
        assert!(err.to_string().contains("$min_age"));
    }
}
