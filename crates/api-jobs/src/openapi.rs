use utoipa::OpenApi;

use vox_job_queue::{Job, JobReport, JobStatus, ReclaimReport, WorkerReport};

use crate::error::{ErrorDetails, ErrorResponse};
use crate::routes::{BackgroundStarted, BackgroundStopped, ResetStuckRequest, WorkerMode};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::worker::run,
        crate::routes::worker::stop,
        crate::routes::reclaim::reset_stuck,
        crate::routes::list::list_jobs,
    ),
    components(
        schemas(
            Job,
            JobStatus,
            JobReport,
            WorkerReport,
            ReclaimReport,
            WorkerMode,
            BackgroundStarted,
            BackgroundStopped,
            ResetStuckRequest,
            ErrorDetails,
            ErrorResponse,
        )
    ),
    tags(
        (name = "jobs", description = "Background job worker and job status")
    )
)]
struct ApiDoc;

pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
