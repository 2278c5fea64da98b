//! Unwrapping of typed-value documents.
//!
//! Structured payloads wrap every value in a one-key object naming its type,
//! e.g. `{"stringValue": "Madrid"}` or `{"mapValue": {"fields": {...}}}`.
//! Both the protobuf `Struct` tags and the document-store tags are accepted.
//! Values that are not tagged pass through unchanged, so a plain JSON struct
//! survives the walk as-is.

use serde_json::{Map, Value};

/// Recursively replace tagged values with plain JSON.
pub fn untag(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some((tag, inner)) = obj.iter().next() {
                    if let Some(plain) = untag_tagged(tag, inner) {
                        return plain;
                    }
                }
            }
            Value::Object(untag_map(obj))
        }
        Value::Array(items) => Value::Array(items.iter().map(untag).collect()),
        other => other.clone(),
    }
}

/// Untag every value of a `fields` map.
pub fn untag_map(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), untag(v)))
        .collect()
}

fn untag_tagged(tag: &str, inner: &Value) -> Option<Value> {
    match tag {
        "nullValue" => Some(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Some(inner.clone())
        }
        // integerValue arrives as a decimal string; coercion parses it later.
        "numberValue" | "doubleValue" | "integerValue" => Some(inner.clone()),
        "boolValue" | "booleanValue" => Some(inner.clone()),
        "geoPointValue" => Some(inner.clone()),
        "structValue" | "mapValue" => Some(match inner.get("fields") {
            Some(Value::Object(fields)) => Value::Object(untag_map(fields)),
            _ => Value::Object(Map::new()),
        }),
        "listValue" | "arrayValue" => Some(match inner.get("values") {
            Some(Value::Array(values)) => Value::Array(values.iter().map(untag).collect()),
            _ => Value::Array(Vec::new()),
        }),
        _ => None,
    }
}
