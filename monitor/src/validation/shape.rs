//! Payload shape normalization.
//!
//! The upstream has served the same match list under several wrappers. The
//! shape is resolved once here so the validator only ever walks a slice of
//! item records.

use serde_json::{Map, Value};

/// Recognized top-level layouts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadShape<'a> {
    /// `[item, ...]`
    List(&'a [Value]),
    /// `{"data": {"items": [...]}}`
    DataItems(&'a [Value]),
    /// `{"items": [...]}`
    Items(&'a [Value]),
    /// A single object treated as one item
    SingleObject(&'a Map<String, Value>),
    /// Anything else; carries the JSON type name
    Unsupported(&'static str),
}

impl<'a> PayloadShape<'a> {
    /// Classify a decoded document.
    pub fn classify(doc: &'a Value) -> Self {
        match doc {
            Value::Array(items) => Self::List(items),
            Value::Object(map) => {
                if let Some(items) = map
                    .get("data")
                    .and_then(|d| d.get("items"))
                    .and_then(Value::as_array)
                {
                    Self::DataItems(items)
                } else if let Some(items) = map.get("items").and_then(Value::as_array) {
                    Self::Items(items)
                } else {
                    Self::SingleObject(map)
                }
            }
            other => Self::Unsupported(type_name(other)),
        }
    }

    /// Shape label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::DataItems(_) | Self::Items(_) => "wrapped-items",
            Self::SingleObject(_) => "single-object",
            Self::Unsupported(_) => "unsupported",
        }
    }

    /// Item records, or None for an unsupported document.
    pub fn items(&self) -> Option<Vec<ItemRef<'a>>> {
        match *self {
            Self::List(items) | Self::DataItems(items) | Self::Items(items) => {
                Some(items.iter().map(ItemRef::from_value).collect())
            }
            Self::SingleObject(map) => Some(vec![ItemRef::Object(map)]),
            Self::Unsupported(_) => None,
        }
    }
}

/// One entry of the normalized item sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemRef<'a> {
    /// A JSON object
    Object(&'a Map<String, Value>),
    /// Any other JSON value found where an item was expected
    Other(&'static str),
}

impl<'a> ItemRef<'a> {
    fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            other => Self::Other(type_name(other)),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_variants() {
        let list = json!([{"a": 1}, {"a": 2}]);
        assert!(matches!(PayloadShape::classify(&list), PayloadShape::List(items) if items.len() == 2));

        let data = json!({"data": {"items": [{"a": 1}]}});
        assert!(matches!(PayloadShape::classify(&data), PayloadShape::DataItems(_)));

        let items = json!({"items": []});
        assert!(matches!(PayloadShape::classify(&items), PayloadShape::Items(i) if i.is_empty()));

        let single = json!({"homeTeam": "A"});
        assert_eq!(PayloadShape::classify(&single).label(), "single-object");

        let scalar = json!("text");
        assert_eq!(
            PayloadShape::classify(&scalar),
            PayloadShape::Unsupported("string")
        );
    }

    #[test]
    fn test_data_without_items_array_is_single_object() {
        let doc = json!({"data": {"items": "nope"}});
        assert_eq!(PayloadShape::classify(&doc).label(), "single-object");
    }

    #[test]
    fn test_items_flag_non_objects() {
        let doc = json!([{"a": 1}, 5]);
        let items = PayloadShape::classify(&doc).items().unwrap();
        assert!(matches!(items[0], ItemRef::Object(_)));
        assert_eq!(items[1], ItemRef::Other("number"));
        assert!(PayloadShape::classify(&json!(null)).items().is_none());
    }
}
