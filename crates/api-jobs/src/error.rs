use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type Result<T> = std::result::Result<T, JobsApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Error)]
pub enum JobsApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Setup error: {0}")]
    Setup(String),
}

impl From<vox_job_queue::JobError> for JobsApiError {
    fn from(err: vox_job_queue::JobError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<vox_supabase_store::Error> for JobsApiError {
    fn from(err: vox_supabase_store::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl IntoResponse for JobsApiError {
    fn into_response(self) -> Response {
        let internal_message = "Internal server error".to_string();

        let (status, code, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            Self::Database(message) => {
                tracing::error!(error = %message, "database_error");
                sentry::capture_message(&message, sentry::Level::Error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database request failed".to_string(),
                )
            }
            Self::Setup(message) => {
                tracing::error!(error = %message, "internal_error");
                sentry::capture_message(&message, sentry::Level::Error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_server_error",
                    internal_message,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
