//! Route tree.
//!
//! ```text
//! /health                                  service health (root level)
//! /ws/{job_id}                             job event WebSocket (root level)
//!
//! /api/v1
//! /jobs/{job_id}/events                    publish an event (POST)
//! /jobs/{job_id}/state                     last stored event (GET)
//! /jobs/{job_id}                           close subscribers, drop state (DELETE)
//! ```

pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// WebSocket routes, mounted at the root so clients resolve
/// `{base_url}/ws/{job_id}`.
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/{job_id}", get(ws::ws_handler))
}

/// Routes nested under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
