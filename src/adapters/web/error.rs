//! Web adapter error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::error::BacksimError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        WebError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<BacksimError> for WebError {
    fn from(err: BacksimError) -> Self {
        let status = match &err {
            BacksimError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
            BacksimError::ConfigParse { .. }
            | BacksimError::ConfigMissing { .. }
            | BacksimError::ConfigInvalid { .. }
            | BacksimError::UnknownStrategy { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        WebError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}
