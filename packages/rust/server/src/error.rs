//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// An error body of the form `{"<key>": "<message>"}`.
///
/// Most routes report under `error`; the chat route answers under `reply`
/// so the widget can show the text directly.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    key: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            key: "error",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            key: "error",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            key: "error",
            message: message.into(),
        }
    }

    /// Same status and message, reported under `reply`.
    pub fn as_reply(mut self) -> Self {
        self.key = "reply";
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::Map::new();
        body.insert(self.key.to_string(), json!(self.message));
        (self.status, Json(serde_json::Value::Object(body))).into_response()
    }
}
