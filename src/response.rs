//! Uniform response envelope: `{status, message, data: {result}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub const SUCCESSFUL: &str = "successful";
pub const NOT_FOUND: &str = "not found";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub message: String,
    pub data: EnvelopeData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeData<T> {
    pub result: Option<T>,
}

/// Wrap an optional payload under `data.result`. `None` serializes as `null`.
pub fn set_response<T>(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Envelope<T> {
    Envelope {
        status: status.as_u16(),
        message: message.into(),
        data: EnvelopeData { result: data },
    }
}

pub fn success_ok<T>(data: T) -> Envelope<T> {
    set_response(StatusCode::OK, SUCCESSFUL, Some(data))
}

pub fn success_created<T>(data: T) -> Envelope<T> {
    set_response(StatusCode::CREATED, SUCCESSFUL, Some(data))
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
