//! Job event streaming over WebSocket.
//!
//! Provides the per-job subscriber hub, the heartbeat task, and the HTTP
//! upgrade handler mounted at `/ws/{job_id}`.

mod handler;
mod heartbeat;
pub mod hub;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use hub::JobHub;
