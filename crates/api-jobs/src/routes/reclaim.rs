use axum::{Json, body::Bytes, extract::State};
use serde::Deserialize;
use utoipa::ToSchema;

use vox_job_queue::ReclaimReport;

use crate::error::{JobsApiError, Result};
use crate::state::JobsState;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetStuckRequest {
    /// Defaults to the configured staleness window.
    pub max_time_minutes: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/jobs/reset-stuck",
    request_body(
        content = ResetStuckRequest,
        description = "Optional; an empty body uses the configured window",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Stuck jobs reclaimed", body = ReclaimReport),
        (status = 400, description = "Invalid body", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid worker key"),
        (status = 500, description = "Job store unavailable", body = crate::error::ErrorResponse),
    ),
    security(("worker_key" = [])),
    tag = "jobs",
)]
pub async fn reset_stuck(State(state): State<JobsState>, body: Bytes) -> Result<Json<ReclaimReport>> {
    let request: ResetStuckRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetStuckRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| JobsApiError::BadRequest(e.to_string()))?
    };

    let max_time_minutes = request
        .max_time_minutes
        .unwrap_or(state.config.worker.worker_stuck_minutes);

    let report = state
        .worker
        .reclaimer()
        .reset_stuck_jobs(max_time_minutes)
        .await?;

    Ok(Json(report))
}
