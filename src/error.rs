use crate::db::DbError;
use crate::gate::GateError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "Database unavailable",
                    "message": msg,
                }),
            ),
            // A backend that could not be built is an availability problem,
            // not a failed statement.
            AppError::Database(err) if err.is_construction_failure() => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "Database unavailable",
                    "message": err.to_string(),
                }),
            ),
            // The driver message was already logged by the adapter; clients
            // only get a generic error.
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}
