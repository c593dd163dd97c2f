//! Request DTOs shared by every entity.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Single-column update of one record: `{id, columnName, patchValue}`, all required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchByIdRequest {
    #[validate(length(min = 1, message = "id is required"))]
    pub id: String,
    #[validate(length(min = 1, message = "columnName is required"))]
    pub column_name: String,
    #[serde(default)]
    #[validate(custom(function = "present"))]
    pub patch_value: Value,
}

fn present(value: &Value) -> Result<(), ValidationError> {
    if value.is_null() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("patchValue is required")));
    }
    Ok(())
}
