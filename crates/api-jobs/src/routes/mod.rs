pub(crate) mod list;
pub(crate) mod reclaim;
pub(crate) mod worker;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use vox_api_auth::{AuthState, WorkerKey, require_auth, require_worker_key};

use crate::state::JobsState;

pub use reclaim::ResetStuckRequest;
pub use worker::{BackgroundStarted, BackgroundStopped, WorkerMode};

pub fn router(state: JobsState) -> Router {
    let worker_key = WorkerKey::new(&state.config.worker.worker_api_key);
    let auth_state = AuthState::new(&state.config.supabase.supabase_jwt_secret);

    let worker_routes = Router::new()
        .route("/jobs/worker", post(worker::run).delete(worker::stop))
        .route("/jobs/reset-stuck", post(reclaim::reset_stuck))
        .route_layer(middleware::from_fn_with_state(
            worker_key,
            require_worker_key,
        ));

    let user_routes = Router::new()
        .route("/jobs", get(list::list_jobs))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .merge(worker_routes)
        .merge(user_routes)
        .with_state(state)
}
