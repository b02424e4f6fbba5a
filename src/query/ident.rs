//! Identifier checks for text spliced into statements
//!
//! Values always travel as bound parameters. Labels, graph names, property
//! keys and column names cannot be parameterized, so they are validated or
//! quoted here before they reach statement text.

use crate::error::{OgmError, OgmResult};
use std::borrow::Cow;

/// openCypher keywords that cannot be used as parameter names
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "ASCENDING", "BY", "CALL", "CASE", "CONTAINS", "COUNT", "CREATE",
    "DELETE", "DESC", "DESCENDING", "DETACH", "DISTINCT", "ELSE", "END", "ENDS", "EXISTS",
    "FALSE", "IN", "IS", "LIMIT", "MATCH", "MERGE", "NOT", "NULL", "OPTIONAL", "OR", "ORDER",
    "REMOVE", "RETURN", "SET", "SKIP", "STARTS", "THEN", "TRUE", "UNION", "UNWIND", "WHEN",
    "WHERE", "WITH", "XOR", "YIELD",
];

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Case-insensitive reserved keyword check
pub fn is_reserved(s: &str) -> bool {
    RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(s))
}

/// Require a plain identifier for a label, graph or column name
pub fn check_ident(ident: &str, context: &'static str) -> OgmResult<()> {
    if is_plain_ident(ident) {
        Ok(())
    } else {
        Err(OgmError::InvalidIdentifier {
            ident: ident.to_string(),
            context,
        })
    }
}

/// Property key as it may appear after `n.`; back-tick quoted unless it is a
/// plain, non-reserved identifier
pub fn quote_ident(key: &str) -> Cow<'_, str> {
    if is_plain_ident(key) && !is_reserved(key) {
        Cow::Borrowed(key)
    } else {
        Cow::Owned(format!("`{}`", key.replace('`', "``")))
    }
}
