use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /{job_id}/events  -> publish_event
/// GET    /{job_id}/state   -> get_state
/// DELETE /{job_id}         -> cleanup_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{job_id}/events", post(jobs::publish_event))
        .route("/{job_id}/state", get(jobs::get_state))
        .route("/{job_id}", delete(jobs::cleanup_job))
}
