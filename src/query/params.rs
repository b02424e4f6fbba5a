//! Bound parameters
//!
//! Callers hand parameters over as `Params` (usually through the `params!`
//! macro); statements own them as a `ParamMap` where every name is unique.

use super::ident::{is_plain_ident, is_reserved};
use crate::error::{OgmError, OgmResult};
use crate::graph::PropertyValue;
use indexmap::IndexMap;

/// Parameter name -> value, in binding order
pub type ParamMap = IndexMap<String, PropertyValue>;

/// Caller-supplied named parameters. Duplicates are kept so that binding
/// can report them instead of silently overwriting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, PropertyValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Builder-style `push`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for Params {
    type Item = (String, PropertyValue);
    type IntoIter = std::vec::IntoIter<(String, PropertyValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Build a `Params` list
///
/// ```ignore
/// let p = params! { "min_age" => 18, "name" => "Alice" };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::query::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::query::Params::new();
        $(params.push($name, $value);)+
        params
    }};
}

/// Check a parameter name: a plain identifier that is not a reserved keyword
pub fn check_param_name(name: &str) -> OgmResult<()> {
    if !is_plain_ident(name) {
        return Err(OgmError::InvalidIdentifier {
            ident: name.to_string(),
            context: "parameter",
        });
    }
    if is_reserved(name) {
        return Err(OgmError::ParameterConflict {
            name: name.to_string(),
            reason: "collides with a reserved keyword",
        });
    }
    Ok(())
}

/// Bind a caller-named parameter; the name must not be bound yet
pub fn bind_named(params: &mut ParamMap, name: &str, value: PropertyValue) -> OgmResult<()> {
    check_param_name(name)?;
    if params.contains_key(name) {
        return Err(OgmError::ParameterConflict {
            name: name.to_string(),
            reason: "already bound in this query",
        });
    }
    params.insert(name.to_string(), value);
    Ok(())
}

/// Bind a value under a generated name `<hint>_<k>` with the smallest free
/// `k`, returning the name
pub fn bind_generated(params: &mut ParamMap, hint: &str, value: PropertyValue) -> String {
    let base = sanitize_hint(hint);
    let mut k = 0usize;
    let name = loop {
        let candidate = format!("{}_{}", base, k);
        if !params.contains_key(&candidate) {
            break candidate;
        }
        k += 1;
    };
    params.insert(name.clone(), value);
    name
}

fn sanitize_hint(hint: &str) -> String {
    let mut base: String = hint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !base.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        base.insert_str(0, "p_");
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_macro() {
        let p = crate::params! { "min_age" => 18, "name" => "Alice" };
        assert_eq!(p.len(), 2);
        let names: Vec<&str> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["min_age", "name"]);
        assert!(crate::params! {}.is_empty());
    }

    #[test]
    fn test_bind_named_conflicts() {
        let mut map = ParamMap::new();
        bind_named(&mut map, "min_age", 18i64.into()).unwrap();
        assert!(matches!(
            bind_named(&mut map, "min_age", 21i64.into()),
            Err(OgmError::ParameterConflict { .. })
        ));
        assert!(matches!(
            bind_named(&mut map, "limit", 1i64.into()),
            Err(OgmError::ParameterConflict { .. })
        ));
        assert!(matches!(
            bind_named(&mut map, "bad name", 1i64.into()),
            Err(OgmError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_bind_generated_picks_smallest_free_suffix() {
        let mut map = ParamMap::new();
        assert_eq!(bind_generated(&mut map, "name", "A".into()), "name_0");
        assert_eq!(bind_generated(&mut map, "name", "B".into()), "name_1");
        assert_eq!(bind_generated(&mut map, "first name", "C".into()), "first_name_0");
        assert_eq!(bind_generated(&mut map, "2nd", "D".into()), "p_2nd_0");
        assert_eq!(bind_generated(&mut map, "order", 1i64.into()), "order_0");
        assert_eq!(map.len(), 5);
    }
}
