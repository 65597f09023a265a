//! Response-shape adapter.
//!
//! The backend's deployments answer the same operation with different
//! envelopes: a bare object, `{item: {...}}`, `{data: {...}}`, a bare
//! array, or `{items: [...]}`. Every payload is normalized here, at the
//! sync boundary, so callers never branch on shape themselves.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Envelope keys checked, in order, when unwrapping single objects.
const OBJECT_KEYS: [&str; 3] = ["item", "data", "result"];

/// Envelope keys checked, in order, when unwrapping collections.
const COLLECTION_KEYS: [&str; 3] = ["items", "data", "results"];

/// Unwraps a single-object payload from whatever envelope it arrived in.
///
/// A one-element array also resolves to its element; anything else is
/// returned as-is and left to the typed decode to accept or reject.
pub fn normalize_object(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            for key in OBJECT_KEYS {
                if let Some(inner) = map.remove(key) {
                    if inner.is_object() {
                        return inner;
                    }
                    map.insert(key.to_string(), inner);
                }
            }
            Value::Object(map)
        }
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

/// Unwraps a collection payload from whatever envelope it arrived in.
///
/// A bare array is taken as-is, `{items: [...]}`-style envelopes are
/// unwrapped, and a bare object is treated as a one-element collection.
/// `null` is an empty collection.
pub fn normalize_collection(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in COLLECTION_KEYS {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            vec![Value::Object(map)]
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Decodes a normalized payload into a typed value.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::serialization(format!("failed to parse response payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_bare_object() {
        let value = json!({"score": 1});
        assert_eq!(normalize_object(value.clone()), value);
    }

    #[test]
    fn test_normalize_enveloped_object() {
        let value = json!({"item": {"score": 1}});
        assert_eq!(normalize_object(value), json!({"score": 1}));

        let value = json!({"data": {"score": 2}});
        assert_eq!(normalize_object(value), json!({"score": 2}));
    }

    #[test]
    fn test_normalize_single_element_array() {
        let value = json!([{"score": 1}]);
        assert_eq!(normalize_object(value), json!({"score": 1}));
    }

    #[test]
    fn test_normalize_collection_shapes() {
        let bare = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(normalize_collection(bare).len(), 2);

        let enveloped = json!({"items": [{"id": 1}]});
        assert_eq!(normalize_collection(enveloped).len(), 1);

        let object = json!({"id": 1});
        assert_eq!(normalize_collection(object).len(), 1);

        assert!(normalize_collection(Value::Null).is_empty());
    }

    #[test]
    fn test_decode_error_classification() {
        let result: Result<u32> = decode(json!("not a number"));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
