use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceMapError {
    #[error("Upstream query failed: {0}")]
    Upstream(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Superseded by a newer fetch")]
    Stale,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ServiceMapError {
    fn from(err: reqwest::Error) -> Self {
        ServiceMapError::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceMapError {
    fn from(err: serde_json::Error) -> Self {
        ServiceMapError::Serialization(err.to_string())
    }
}

impl From<JsonRejection> for ServiceMapError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceMapError::InvalidRequest(rejection.body_text())
    }
}

impl ServiceMapError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceMapError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceMapError::Serialization(_) | ServiceMapError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceMapError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceMapError::Stale => StatusCode::CONFLICT,
            ServiceMapError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceMapError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceMapError>;
