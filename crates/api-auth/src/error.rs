use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("invalid worker key")]
    InvalidWorkerKey,
}

#[derive(Serialize)]
struct ErrorDetails {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::InvalidToken(e) = &self {
            tracing::debug!(error = %e, "jwt_rejected");
        }

        let message = match &self {
            Self::MissingToken => "missing bearer token",
            Self::InvalidToken(_) => "invalid or expired token",
            Self::InvalidWorkerKey => "invalid worker key",
        };

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                code: "unauthorized".to_string(),
                message: message.to_string(),
            },
        });

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
