//! Wire format module
//!
//! Implements the agtype text format spoken by Apache AGE:
//! - Literal encoding for the bound parameter payload
//! - Decoding of result columns into property values, vertices and edges

pub mod agtype;

// Re-export main functions
pub use agtype::{decode, decode_edge, decode_edges, decode_vertex, encode, encode_map};
