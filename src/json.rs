//! JSONPath lookups on arbitrary serializable values, plus small JSON helpers.
//!
//! The `select*` functions return a typed error so callers can tell a malformed selector from
//! unparseable input or an empty match. The `safe_get*` wrappers log and flatten failures to `None`.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use serde_json_path::JsonPath;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JsonPathError {
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to parse json: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("no value at {0}")]
    NotFound(String),
    #[error("failed to deserialize value at {selector}: {source}")]
    Deserialize {
        selector: String,
        #[source]
        source: serde_json::Error,
    },
}

/// True for null, blank strings, and empty objects or arrays.
pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn compile(selector: &str) -> Result<JsonPath, JsonPathError> {
    JsonPath::parse(selector).map_err(|e| JsonPathError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// First non-blank match of `selector` in an already parsed document.
pub fn select_value(doc: &Value, selector: &str) -> Result<Value, JsonPathError> {
    let path = compile(selector)?;
    match path.query(doc).first() {
        Some(v) if !is_blank(v) => Ok(v.clone()),
        _ => Err(JsonPathError::NotFound(selector.to_string())),
    }
}

/// Serialize `value` and return the first non-blank match of `selector`.
pub fn select<S: Serialize + ?Sized>(value: &S, selector: &str) -> Result<Value, JsonPathError> {
    let doc = serde_json::to_value(value).map_err(JsonPathError::Serialize)?;
    select_value(&doc, selector)
}

/// Like `select`, then deserialize the match into `D`.
pub fn select_as<D: DeserializeOwned, S: Serialize + ?Sized>(value: &S, selector: &str) -> Result<D, JsonPathError> {
    let found = select(value, selector)?;
    serde_json::from_value(found).map_err(|source| JsonPathError::Deserialize {
        selector: selector.to_string(),
        source,
    })
}

/// Parse JSON text and return the first non-blank match of `selector`.
pub fn select_in_str(json: &str, selector: &str) -> Result<Value, JsonPathError> {
    let doc: Value = serde_json::from_str(json).map_err(JsonPathError::Parse)?;
    select_value(&doc, selector)
}

/// The match re-serialized as JSON text (strings keep their quotes).
pub fn select_to_string(json: &str, selector: &str) -> Result<String, JsonPathError> {
    let found = select_in_str(json, selector)?;
    serde_json::to_string(&found).map_err(JsonPathError::Serialize)
}

/// The match re-serialized as JSON bytes.
pub fn select_marshalled(json: &str, selector: &str) -> Result<Vec<u8>, JsonPathError> {
    let found = select_in_str(json, selector)?;
    serde_json::to_vec(&found).map_err(JsonPathError::Serialize)
}

fn log_miss<T>(selector: &str, result: Result<T, JsonPathError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(JsonPathError::NotFound(_)) => None,
        Err(e) => {
            tracing::debug!(selector, error = %e, "safe get failed");
            None
        }
    }
}

pub fn safe_get<S: Serialize + ?Sized>(value: &S, selector: &str) -> Option<Value> {
    log_miss(selector, select(value, selector))
}

pub fn safe_get_as<D: DeserializeOwned, S: Serialize + ?Sized>(value: &S, selector: &str) -> Option<D> {
    log_miss(selector, select_as(value, selector))
}

pub fn safe_get_in_str(json: &str, selector: &str) -> Option<Value> {
    log_miss(selector, select_in_str(json, selector))
}

/// Overlay `incoming` onto a previously stored JSON object.
/// When `previous` is missing or not an object, `incoming` is returned as is.
pub fn merge_dynamic_property(previous: Option<&Value>, incoming: Map<String, Value>) -> Map<String, Value> {
    match previous {
        Some(Value::Object(prev)) if !prev.is_empty() => {
            let mut merged = prev.clone();
            merged.extend(incoming);
            merged
        }
        _ => incoming,
    }
}
