//! Helpers for pulling typed fields out of JSON payloads.

use serde_json::{Map, Value};

use super::ResourceError;

pub fn object(data: &Value) -> Result<&Map<String, Value>, ResourceError> {
    data.as_object()
        .ok_or_else(|| ResourceError::validation("Payload must be a JSON object"))
}

/// Integer identifiers may be sent as numbers or numeric strings.
pub fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn optional_str(data: &Value, field: &str) -> Result<Option<String>, ResourceError> {
    match object(data)?.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ResourceError::validation(format!(
            "Field {} must be a string",
            field
        ))),
    }
}

pub fn required_str(data: &Value, field: &str) -> Result<String, ResourceError> {
    optional_str(data, field)?
        .ok_or_else(|| ResourceError::validation(format!("Missing field {}", field)))
}

pub fn optional_id(data: &Value, field: &str) -> Result<Option<i64>, ResourceError> {
    match object(data)?.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_id(value).map(Some).ok_or_else(|| {
            ResourceError::validation(format!("Field {} must be an integer", field))
        }),
    }
}

pub fn required_id(data: &Value, field: &str) -> Result<i64, ResourceError> {
    optional_id(data, field)?
        .ok_or_else(|| ResourceError::validation(format!("Missing field {}", field)))
}

pub fn optional_bool(data: &Value, field: &str) -> Result<Option<bool>, ResourceError> {
    match object(data)?.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ResourceError::validation(format!(
            "Field {} must be a boolean",
            field
        ))),
    }
}

/// Reject an attempt to change a field that is fixed after creation.
/// Sending the current value back is allowed.
pub fn unchanged<T: PartialEq>(
    field: &str,
    current: &T,
    submitted: Option<T>,
) -> Result<(), ResourceError> {
    match submitted {
        Some(value) if value != *current => Err(ResourceError::validation(format!(
            "Field {} cannot be changed",
            field
        ))),
        _ => Ok(()),
    }
}
