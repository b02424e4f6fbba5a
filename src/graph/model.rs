//! Typed models over vertex and edge labels
//!
//! A model is any serde type bound to a label. Properties are bridged through
//! `serde_json::Value`, so struct fields map one-to-one onto graph properties.

use super::property::{PropertyMap, PropertyValue};
use super::schema::LabelSchema;
use super::types::EntityKind;
use crate::error::{OgmError, OgmResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

/// A typed vertex or edge model
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Person { name: String, age: i64 }
///
/// impl Model for Person {
///     const LABEL: &'static str = "Person";
///     fn schema() -> LabelSchema {
///         LabelSchema::vertex("Person")
///             .required("name", FieldType::String)
///             .field("age", FieldType::Integer)
///     }
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned {
    const LABEL: &'static str;
    const KIND: EntityKind = EntityKind::Vertex;

    /// Declared schema; the default accepts any field
    fn schema() -> LabelSchema {
        LabelSchema::new(Self::LABEL, Self::KIND).allow_extra()
    }

    fn to_properties(&self) -> OgmResult<PropertyMap> {
        match json_to_property(serde_json::to_value(self)?)? {
            PropertyValue::Map(map) => Ok(map),
            other => Err(OgmError::schema(
                Self::LABEL,
                None,
                format!("model serialized to {} instead of a map", other.type_name()),
            )),
        }
    }

    /// Build the model from stored properties; undeclared extras are ignored
    /// unless the model type rejects unknown fields itself.
    fn from_properties(properties: &PropertyMap) -> OgmResult<Self> {
        let json = property_to_json(&PropertyValue::Map(properties.clone()));
        Ok(serde_json::from_value(json)?)
    }
}

/// Convert a JSON value into a property value
pub fn json_to_property(value: JsonValue) -> OgmResult<PropertyValue> {
    Ok(match value {
        JsonValue::Null => PropertyValue::Null,
        JsonValue::Bool(b) => PropertyValue::Boolean(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                PropertyValue::Integer(i)
            } else if n.is_u64() {
                return Err(OgmError::InvalidArgument(format!(
                    "integer {} does not fit in a signed 64-bit property",
                    n
                )));
            } else {
                PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => PropertyValue::String(s),
        JsonValue::Array(items) => PropertyValue::List(
            items
                .into_iter()
                .map(json_to_property)
                .collect::<OgmResult<Vec<_>>>()?,
        ),
        JsonValue::Object(map) => {
            let mut props = PropertyMap::with_capacity(map.len());
            for (key, val) in map {
                props.insert(key, json_to_property(val)?);
            }
            PropertyValue::Map(props)
        }
    })
}

/// Convert a property value into JSON. Non-finite floats have no JSON form and
/// become null; vertex and edge records become their property maps.
pub fn property_to_json(value: &PropertyValue) -> JsonValue {
    match value {
        PropertyValue::Null => JsonValue::Null,
        PropertyValue::Boolean(b) => JsonValue::Bool(*b),
        PropertyValue::Integer(i) => JsonValue::Number((*i).into()),
        PropertyValue::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        PropertyValue::String(s) => JsonValue::String(s.clone()),
        PropertyValue::List(items) => JsonValue::Array(items.iter().map(property_to_json).collect()),
        PropertyValue::Map(map) => map_to_json(map),
        PropertyValue::Vertex(v) => map_to_json(&v.properties),
        PropertyValue::Edge(e) => map_to_json(&e.properties),
    }
}

fn map_to_json(map: &PropertyMap) -> JsonValue {
    let mut out = JsonMap::with_capacity(map.len());
    for (key, val) in map {
        out.insert(key.clone(), property_to_json(val));
    }
    JsonValue::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FieldType;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: i64,
        #[serde(default)]
        tags: Vec<String>,
        nickname: Option<String>,
    }

    impl Model for Person {
        const LABEL: &'static str = "Person";

        fn schema() -> LabelSchema {
            LabelSchema::vertex("Person")
                .required("name", FieldType::String)
                .field("age", FieldType::Integer)
                .field("tags", FieldType::List)
                .field("nickname", FieldType::String)
        }
    }

    #[test]
    fn test_model_to_properties_keeps_field_order() {
        let alice = Person {
            name: "Alice".into(),
            age: 30,
            tags: vec!["admin".into()],
            nickname: None,
        };
        let props = alice.to_properties().unwrap();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "age", "tags", "nickname"]);
        assert_eq!(props.get("age"), Some(&PropertyValue::Integer(30)));
        assert_eq!(props.get("nickname"), Some(&PropertyValue::Null));
        assert!(Person::schema().check_properties(&props, true).is_ok());
    }

    #[test]
    fn test_model_from_properties_ignores_extras() {
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Bob".into());
        props.insert("age".into(), 25i64.into());
        props.insert("legacy_flag".into(), true.into());

        let bob = Person::from_properties(&props).unwrap();
        assert_eq!(bob.name, "Bob");
        assert_eq!(bob.age, 25);
        assert!(bob.tags.is_empty());
        assert_eq!(bob.nickname, None);
    }

    #[test]
    fn test_model_type_mismatch_is_serialization_error() {
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Bob".into());
        props.insert("age".into(), "old".into());
        assert!(matches!(
            Person::from_properties(&props),
            Err(OgmError::Serialization(_))
        ));
    }

    #[test]
    fn test_default_schema_is_open() {
        #[derive(Serialize, Deserialize)]
        struct Tag {
            value: String,
        }
        impl Model for Tag {
            const LABEL: &'static str = "Tag";
        }
        let schema = Tag::schema();
        assert!(schema.open);
        assert_eq!(schema.kind, EntityKind::Vertex);
    }
}
