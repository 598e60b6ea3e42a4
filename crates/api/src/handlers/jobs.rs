//! Handlers for the `/jobs` resource.
//!
//! Render workers report progress by POSTing [`JobEvent`]s; the hub fans
//! them out to every WebSocket following the job.

use aidj_core::error::CoreError;
use aidj_core::job_events::JobEvent;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublishResult {
    pub job_id: String,
    pub kind: &'static str,
    /// Connections the event reached.
    pub delivered: usize,
}

/// POST /api/v1/jobs/{job_id}/events
///
/// Publish one event to the job's subscribers. Returns 202.
pub async fn publish_event(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(event): Json<JobEvent>,
) -> ApiResult<impl IntoResponse> {
    if let JobEvent::Connected = event {
        return Err(ApiError::BadRequest(
            "connected events are generated by the server".into(),
        ));
    }

    let kind = event.kind();
    let delivered = state.hub.publish(&job_id, event).await;
    tracing::info!(job_id = %job_id, kind, delivered, "Job event published");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: PublishResult {
                job_id,
                kind,
                delivered,
            },
        }),
    ))
}

/// GET /api/v1/jobs/{job_id}/state
///
/// The message a new subscriber would be replayed.
pub async fn get_state(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DataResponse<Value>>> {
    let last = state
        .hub
        .last_state(&job_id)
        .await
        .ok_or(CoreError::NotFound {
            entity: "JobState",
            id: job_id,
        })?;
    Ok(Json(DataResponse { data: last }))
}

/// DELETE /api/v1/jobs/{job_id}
///
/// Close every subscriber and forget the job's state. Returns 204.
pub async fn cleanup_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> StatusCode {
    state.hub.cleanup_job(&job_id).await;
    StatusCode::NO_CONTENT
}
