use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use vox_job_queue::WorkerReport;

use crate::error::{JobsApiError, Result};
use crate::state::JobsState;

pub const MAX_JOBS_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    #[default]
    Single,
    Continuous,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkerQuery {
    /// Jobs claimed per batch. Defaults to the configured value.
    #[serde(rename = "maxJobs")]
    pub max_jobs: Option<usize>,
    #[serde(default)]
    #[param(inline)]
    pub mode: WorkerMode,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundStarted {
    pub started: bool,
    pub already_running: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BackgroundStopped {
    pub stopped: bool,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[utoipa::path(
    post,
    path = "/jobs/worker",
    params(WorkerQuery),
    responses(
        (status = 200, description = "Batch processed", body = WorkerReport),
        (status = 202, description = "Continuous worker started or already running", body = BackgroundStarted),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid worker key"),
        (status = 500, description = "Job store unavailable", body = crate::error::ErrorResponse),
    ),
    security(("worker_key" = [])),
    tag = "jobs",
)]
pub async fn run(
    State(state): State<JobsState>,
    query: std::result::Result<Query<WorkerQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| JobsApiError::BadRequest(e.body_text()))?;

    if let Some(max_jobs) = query.max_jobs {
        if max_jobs == 0 || max_jobs > MAX_JOBS_LIMIT {
            return Err(JobsApiError::BadRequest(format!(
                "maxJobs must be between 1 and {MAX_JOBS_LIMIT}"
            )));
        }
    }

    match query.mode {
        WorkerMode::Single => {
            let max_jobs = query
                .max_jobs
                .unwrap_or(state.worker.config().max_jobs);
            let report = state.worker.run_batch(max_jobs).await?;

            tracing::info!(
                processed = report.processed,
                succeeded = report.succeeded(),
                "worker_triggered"
            );

            Ok(Json(report).into_response())
        }
        WorkerMode::Continuous => {
            let started = state.start_background(query.max_jobs).await;
            tracing::info!(started, "continuous_worker_requested");

            Ok((
                StatusCode::ACCEPTED,
                Json(BackgroundStarted {
                    started,
                    already_running: !started,
                }),
            )
                .into_response())
        }
    }
}

#[utoipa::path(
    delete,
    path = "/jobs/worker",
    responses(
        (status = 200, description = "Continuous worker stopped", body = BackgroundStopped),
        (status = 401, description = "Missing or invalid worker key"),
    ),
    security(("worker_key" = [])),
    tag = "jobs",
)]
pub async fn stop(State(state): State<JobsState>) -> Json<BackgroundStopped> {
    let stopped = state.stop_background().await;
    let summary = stopped.unwrap_or_default();

    Json(BackgroundStopped {
        stopped: stopped.is_some(),
        processed: summary.processed,
        succeeded: summary.succeeded,
        failed: summary.failed,
    })
}
