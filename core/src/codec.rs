//! Conversion between flat string maps and their JSON object wire form.
//!
//! # Design
//! Every request body and every response body of the enrollment protocol is
//! a single JSON object whose members are all strings. `ValueMap` is a
//! `BTreeMap` so encoding is stable (members sorted by key), which keeps
//! request bodies reproducible in tests and logs.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

/// A flat mapping from string keys to string values.
pub type ValueMap = BTreeMap<String, String>;

/// Structural failures when decoding a JSON document into a `ValueMap`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The text is not syntactically valid JSON (or not valid UTF-8).
    #[error("malformed JSON document: {0}")]
    MalformedDocument(String),

    /// The document parsed, but its root is not an object.
    #[error("invalid JSON document: root must be an object")]
    InvalidShape,

    /// A member of the root object holds something other than a string.
    #[error("invalid JSON document: value of \"{field}\" must be a string")]
    InvalidFieldType { field: String },
}

/// Encode `values` as a pretty-printed JSON object of string members.
pub fn encode(values: &ValueMap) -> String {
    let object: Map<String, Value> = values
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    format!("{:#}", Value::Object(object))
}

/// Decode a JSON object whose members are all strings.
pub fn decode(text: &str) -> Result<ValueMap, CodecError> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| CodecError::MalformedDocument(e.to_string()))?;

    let Value::Object(members) = document else {
        return Err(CodecError::InvalidShape);
    };

    members
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok((key, value)),
            _ => Err(CodecError::InvalidFieldType { field: key }),
        })
        .collect()
}

/// Decode a raw response body. Bodies that are not UTF-8 are malformed.
pub fn decode_bytes(body: &[u8]) -> Result<ValueMap, CodecError> {
    let text =
        std::str::from_utf8(body).map_err(|e| CodecError::MalformedDocument(e.to_string()))?;
    decode(text)
}
