use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::error::AuthError;
use crate::state::{AuthContext, AuthState, WorkerKey};

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())
        .ok_or(AuthError::MissingToken)?
        .to_string();
    let claims = state.verify(&token)?;

    request
        .extensions_mut()
        .insert(AuthContext { token, claims });

    Ok(next.run(request).await)
}

pub async fn require_worker_key(
    State(key): State<WorkerKey>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let candidate = bearer_token(request.headers()).ok_or(AuthError::MissingToken)?;
    if !key.matches(candidate) {
        tracing::warn!(path = %request.uri().path(), "worker_key_rejected");
        return Err(AuthError::InvalidWorkerKey);
    }

    Ok(next.run(request).await)
}
