//! Recursive argument values for decoded payloads.
//!
//! Binary packets carry a JSON argument list whose attachments appear as
//! `{"_placeholder":true,"num":N}` markers. [`ArgValue`] extends the JSON
//! shapes with a raw-bytes variant so substitution is a structural transform
//! rather than an out-of-band lookup.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::debug;

/// A decoded argument: JSON plus raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ArgValue>),
    Object(BTreeMap<String, ArgValue>),
    /// A resolved binary attachment.
    Binary(Bytes),
}

impl ArgValue {
    /// The string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The attachment bytes, if this is a binary value.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            ArgValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Convert a plain JSON tree without touching placeholder markers.
    pub fn from_json(value: serde_json::Value) -> Self {
        resolve(value, &[])
    }

    /// Convert a JSON tree, replacing every placeholder marker with the
    /// referenced attachment's bytes.
    ///
    /// A marker whose index is out of range is kept as its literal object
    /// form; the peer miscounted, and dropping the marker silently would
    /// hide that from the application.
    pub fn resolve_placeholders(value: serde_json::Value, attachments: &[Bytes]) -> Self {
        resolve(value, attachments)
    }
}

fn resolve(value: serde_json::Value, attachments: &[Bytes]) -> ArgValue {
    match value {
        serde_json::Value::Null => ArgValue::Null,
        serde_json::Value::Bool(b) => ArgValue::Bool(b),
        serde_json::Value::Number(n) => ArgValue::Number(n),
        serde_json::Value::String(s) => ArgValue::String(s),
        serde_json::Value::Array(items) => ArgValue::Array(
            items
                .into_iter()
                .map(|item| resolve(item, attachments))
                .collect(),
        ),
        serde_json::Value::Object(map) => {
            if let Some(index) = placeholder_index(&map) {
                match attachments.get(index) {
                    Some(bytes) => return ArgValue::Binary(bytes.clone()),
                    None => {
                        debug!(index, count = attachments.len(), "placeholder out of range");
                    }
                }
            }
            ArgValue::Object(
                map.into_iter()
                    .map(|(key, item)| (key, resolve(item, attachments)))
                    .collect(),
            )
        }
    }
}

fn placeholder_index(map: &serde_json::Map<String, serde_json::Value>) -> Option<usize> {
    if map.get("_placeholder").and_then(serde_json::Value::as_bool) != Some(true) {
        return None;
    }
    map.get("num")
        .and_then(serde_json::Value::as_u64)
        .map(|num| num as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_replaced_with_attachment() {
        let attachments = [Bytes::from_static(b"\x01\x02")];
        let value = ArgValue::resolve_placeholders(
            json!(["upload", {"_placeholder": true, "num": 0}]),
            &attachments,
        );

        let ArgValue::Array(args) = value else {
            panic!("expected array");
        };
        assert_eq!(args[0].as_str(), Some("upload"));
        assert_eq!(args[1].as_binary(), Some(&attachments[0]));
    }

    #[test]
    fn test_placeholders_resolved_recursively() {
        let attachments = [Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        let value = ArgValue::resolve_placeholders(
            json!({"files": [{"_placeholder": true, "num": 1}, {"meta": {"_placeholder": true, "num": 0}}]}),
            &attachments,
        );

        let ArgValue::Object(map) = value else {
            panic!("expected object");
        };
        let ArgValue::Array(files) = &map["files"] else {
            panic!("expected array");
        };
        assert_eq!(files[0].as_binary(), Some(&attachments[1]));
        let ArgValue::Object(meta) = &files[1] else {
            panic!("expected object");
        };
        assert_eq!(meta["meta"].as_binary(), Some(&attachments[0]));
    }

    #[test]
    fn test_out_of_range_placeholder_kept_literal() {
        let value =
            ArgValue::resolve_placeholders(json!({"_placeholder": true, "num": 3}), &[]);
        let ArgValue::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(map["_placeholder"], ArgValue::Bool(true));
    }

    #[test]
    fn test_non_placeholder_object_untouched() {
        let value = ArgValue::from_json(json!({"_placeholder": false, "num": 0}));
        assert!(matches!(value, ArgValue::Object(_)));
    }
}
