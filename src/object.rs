//! Checks on raw, already decoded API objects.
//!
//! The builders in `github_data` run these before handing a value to serde,
//! so a missing key or a wrong container always ends up as a descriptive
//! `Error` naming what was looked at. Maps with arbitrary keys, like the
//! languages map, are checked value by value with `count_value`.

use serde_json::{Map, Value};

use crate::api_errors::{Error, Result};

pub type Object = Map<String, Value>;

/// Ensures every key of `required` is present in `obj`.
/// Reports all missing keys at once, in the order they were required.
pub fn require_keys(obj: &Object, required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|key| !obj.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingKeys(missing))
    }
}

/// Name of the JSON type of `value`, used in error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Views `value` as an object, `context` names it in the error
pub fn as_object<'a>(value: &'a Value, context: &str) -> Result<&'a Object> {
    value.as_object().ok_or_else(|| Error::Shape {
        context: context.to_string(),
        expected: "object",
        found: json_type_name(value),
    })
}

/// Views `value` as an array, `context` names it in the error
pub fn as_array<'a>(value: &'a Value, context: &str) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| Error::Shape {
        context: context.to_string(),
        expected: "array",
        found: json_type_name(value),
    })
}

fn type_error(key: &str, expected: &'static str, found: &Value) -> Error {
    Error::FieldType {
        key: key.to_string(),
        expected,
        found: json_type_name(found).to_string(),
    }
}

/// Checks that `value` is a count (non-negative integer). Numbers that do not
/// fit are reported separately from values that are not numbers at all.
pub fn count_value(key: &str, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| Error::FieldType {
            key: key.to_string(),
            expected: "non-negative integer",
            found: "negative or fractional number".to_string(),
        }),
        other => Err(type_error(key, "number", other)),
    }
}
