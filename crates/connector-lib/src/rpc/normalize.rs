//! Raw response values and their normalization into plain JSON trees

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A value as produced by the transport, before normalization
///
/// `Object` is the backend-specific structured type: a named record whose
/// fields may repeat (repeated XML elements). Everything else mirrors plain
/// JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<RemoteValue>),
    Map(BTreeMap<String, RemoteValue>),
    Object {
        class: String,
        fields: Vec<(String, RemoteValue)>,
    },
}

impl RemoteValue {
    pub fn object(class: impl Into<String>, fields: Vec<(String, RemoteValue)>) -> Self {
        RemoteValue::Object {
            class: class.into(),
            fields,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        RemoteValue::String(value.into())
    }

    /// True when this value or anything below it is an `Object`
    pub fn contains_object(&self) -> bool {
        match self {
            RemoteValue::Object { .. } => true,
            RemoteValue::List(items) => items.iter().any(RemoteValue::contains_object),
            RemoteValue::Map(map) => map.values().any(RemoteValue::contains_object),
            _ => false,
        }
    }
}

impl From<Value> for RemoteValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RemoteValue::Null,
            Value::Bool(b) => RemoteValue::Bool(b),
            Value::Number(n) => RemoteValue::Number(n),
            Value::String(s) => RemoteValue::String(s),
            Value::Array(items) => RemoteValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                RemoteValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Convert a raw response into a plain mapping/sequence/scalar tree
///
/// Objects become maps keyed by field name. A field name appearing more than
/// once collapses into an array holding every occurrence in document order.
pub fn normalize(value: RemoteValue) -> Value {
    match value {
        RemoteValue::Null => Value::Null,
        RemoteValue::Bool(b) => Value::Bool(b),
        RemoteValue::Number(n) => Value::Number(n),
        RemoteValue::String(s) => Value::String(s),
        RemoteValue::List(items) => Value::Array(items.into_iter().map(normalize).collect()),
        RemoteValue::Map(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        RemoteValue::Object { fields, .. } => {
            let mut grouped: Vec<(String, Vec<Value>)> = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                let field = normalize(field);
                match grouped.iter_mut().find(|(existing, _)| *existing == name) {
                    Some((_, occurrences)) => occurrences.push(field),
                    None => grouped.push((name, vec![field])),
                }
            }

            let mut out = Map::new();
            for (name, mut occurrences) in grouped {
                let value = if occurrences.len() == 1 {
                    occurrences.remove(0)
                } else {
                    Value::Array(occurrences)
                };
                out.insert(name, value);
            }
            Value::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer(id: &str) -> RemoteValue {
        RemoteValue::object(
            "Customer",
            vec![
                ("CustomerId".into(), RemoteValue::string(id)),
                ("Result".into(), RemoteValue::string("Success")),
            ],
        )
    }

    #[test]
    fn test_object_becomes_map() {
        let value = normalize(customer("42"));
        assert_eq!(value, json!({"CustomerId": "42", "Result": "Success"}));
    }

    #[test]
    fn test_nested_objects_inside_lists_and_maps() {
        let mut map = BTreeMap::new();
        map.insert(
            "list".to_string(),
            RemoteValue::List(vec![customer("1"), RemoteValue::Null]),
        );
        map.insert("scalar".to_string(), RemoteValue::Bool(true));
        let raw = RemoteValue::object("Response", vec![("payload".into(), RemoteValue::Map(map))]);

        assert!(raw.contains_object());
        let value = normalize(raw);
        assert_eq!(
            value,
            json!({"payload": {"list": [{"CustomerId": "1", "Result": "Success"}, null], "scalar": true}})
        );
        assert!(!RemoteValue::from(value).contains_object());
    }

    #[test]
    fn test_repeated_fields_collapse_into_array() {
        let raw = RemoteValue::object(
            "Customers",
            vec![
                ("Customer".into(), customer("1")),
                ("Customer".into(), customer("2")),
                ("Customer".into(), customer("3")),
            ],
        );

        let value = normalize(raw);
        let customers = value["Customer"].as_array().unwrap();
        assert_eq!(customers.len(), 3);
        assert_eq!(customers[2]["CustomerId"], "3");
    }

    #[test]
    fn test_normalize_is_identity_on_plain_values() {
        let plain = json!({
            "a": [1, 2.5, "x", null, {"b": false}],
            "c": {"d": {"e": []}},
        });
        assert_eq!(normalize(RemoteValue::from(plain.clone())), plain);

        let scalar = json!("only");
        assert_eq!(normalize(RemoteValue::from(scalar.clone())), scalar);
    }
}
