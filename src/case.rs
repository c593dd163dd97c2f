//! Identifier case conversion between JSON field names (camelCase) and column names (snake_case).

use serde_json::{Map, Value};

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert an identifier to lowercase snake_case, the storage naming convention.
/// Word boundaries are case changes, `_`, `-` and whitespace; other punctuation is dropped.
/// e.g. "columnName" -> "column_name", "HTTPStatus" -> "http_status", "hello__man how-Are you??" -> "hello_man_how_are_you"
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    let mut pending_sep = false;
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        if !c.is_alphanumeric() {
            continue;
        }
        if c.is_uppercase() && !out.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                pending_sep = true;
            }
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Convert all keys of a JSON object from snake_case to camelCase (in place).
pub fn object_keys_to_camel_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let camel = to_camel_case(&k);
        if camel != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(camel, v);
            }
        }
    }
}

/// Convert all keys of a JSON object to snake_case (in place). Used before mapping fields onto columns.
pub fn object_keys_to_snake_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let snake = to_snake_case(&k);
        if snake != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(snake, v);
            }
        }
    }
}

/// camelCase the column keys of a decoded row, and of the rows preloaded under the `nested` keys.
/// Column values are left as stored, so keys inside json/jsonb documents keep their spelling.
pub fn row_keys_to_camel_case(row: &mut Map<String, Value>, nested: &[&str]) {
    for name in nested {
        match row.get_mut(*name) {
            Some(Value::Object(related)) => object_keys_to_camel_case(related),
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(related) = item {
                        object_keys_to_camel_case(related);
                    }
                }
            }
            _ => {}
        }
    }
    object_keys_to_camel_case(row);
}
