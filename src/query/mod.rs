//! Query construction module
//!
//! Builds openCypher statements for Apache AGE:
//! - Fluent filter/sort/paging builder over one label
//! - Named and generated parameter binding
//! - Statement validation and SQL wrapping
//! - Result rows keyed by column name

pub mod builder;
pub mod ident;
pub mod params;
pub mod row;
pub mod statement;

// Re-export main types
pub use builder::{QueryBuilder, SortOrder, ALIAS, COUNT_COLUMN, ID_COLUMN};
pub use params::{ParamMap, Params};
pub use row::{RawRow, Row};
pub use statement::Statement;
