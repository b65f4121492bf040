use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use utoipa::IntoParams;

use vox_api_auth::AuthContext;
use vox_job_queue::{Job, JobFilter, JobStatus};

use crate::error::{JobsApiError, Result};
use crate::state::JobsState;

pub const LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJobsQuery {
    pub transcription_id: Option<String>,
    #[param(inline)]
    pub status: Option<JobStatus>,
}

#[utoipa::path(
    get,
    path = "/jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "Jobs visible to the caller", body = Vec<Job>),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 500, description = "Job store unavailable", body = crate::error::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "jobs",
)]
pub async fn list_jobs(
    State(state): State<JobsState>,
    Extension(auth): Extension<AuthContext>,
    query: std::result::Result<Query<ListJobsQuery>, QueryRejection>,
) -> Result<Json<Vec<Job>>> {
    let Query(query) = query.map_err(|e| JobsApiError::BadRequest(e.body_text()))?;

    let filter = JobFilter {
        status: query.status,
        transcription_id: query.transcription_id,
        limit: Some(LIST_LIMIT),
        ..Default::default()
    };

    let jobs = state
        .supabase
        .list_jobs_as_user(&auth.token, &filter)
        .await?;

    tracing::debug!(user_id = %auth.claims.sub, count = jobs.len(), "jobs_listed");
    Ok(Json(jobs))
}
