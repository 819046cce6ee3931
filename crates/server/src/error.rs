use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use factory_core::CoreError;
use orchestrator::ProvisionError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Database(db::DbError),
    Provision(ProvisionError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

fn database_response(err: db::DbError) -> (StatusCode, &'static str, String) {
    match err {
        db::DbError::RunNotFound(slug) => (
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Provision run not found: {}", slug),
        ),
        db::DbError::AlreadyExists(slug) => (
            StatusCode::CONFLICT,
            "conflict",
            format!("Provision run already exists: {}", slug),
        ),
        err => {
            tracing::error!("Database error: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Database error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Database(err) => database_response(err),
            AppError::Provision(err) => match err {
                ProvisionError::InvalidRequest(e) => {
                    (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
                }
                ProvisionError::RunNotFound(slug) => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("Provision run not found: {}", slug),
                ),
                ProvisionError::RunAlreadyActive(slug) => (
                    StatusCode::CONFLICT,
                    "run_already_active",
                    format!("Provisioning is already running for {}", slug),
                ),
                ProvisionError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "invalid_transition", err.to_string())
                }
                ProvisionError::Store(db_err) => database_response(db_err),
                other => {
                    tracing::error!("Provisioning error: {:?}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        other.kind(),
                        "Provisioning error occurred".to_string(),
                    )
                }
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<db::DbError> for AppError {
    fn from(err: db::DbError) -> Self {
        AppError::Database(err)
    }
}

impl From<ProvisionError> for AppError {
    fn from(err: ProvisionError) -> Self {
        AppError::Provision(err)
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
