//! Result rows keyed by declared column name

use crate::error::{OgmError, OgmResult};
use crate::graph::{EdgeRecord, PropertyMap, PropertyValue, VertexRecord};
use crate::protocol::agtype;
use std::sync::Arc;

/// Positional agtype values of one result row, as returned by an executor
pub type RawRow = Vec<String>;

/// A raw result row: declared column names mapped to agtype text.
/// Decoding is per column and on demand, so one malformed value fails only
/// the row that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// Pair positional values with column names; any count mismatch is an error
    pub fn from_raw(columns: Arc<[String]>, values: RawRow) -> OgmResult<Self> {
        if columns.len() != values.len() {
            return Err(OgmError::ColumnCount {
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(Row { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw literal text of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    fn require(&self, column: &str) -> OgmResult<&str> {
        self.get(column)
            .ok_or_else(|| OgmError::InvalidArgument(format!("result has no column `{}`", column)))
    }

    pub fn decode(&self, column: &str) -> OgmResult<PropertyValue> {
        agtype::decode(self.require(column)?)
    }

    pub fn vertex(&self, column: &str) -> OgmResult<VertexRecord> {
        agtype::decode_vertex(self.require(column)?)
    }

    pub fn edge(&self, column: &str) -> OgmResult<EdgeRecord> {
        agtype::decode_edge(self.require(column)?)
    }

    /// Decode every column, in declared order
    pub fn decode_all(&self) -> OgmResult<PropertyMap> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, text)| Ok((name.clone(), agtype::decode(text)?)))
            .collect()
    }
}
