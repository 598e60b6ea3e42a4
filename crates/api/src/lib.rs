//! aidj job broadcast server.
//!
//! Render workers publish job events over HTTP; browser and CLI clients
//! follow them over `/ws/{job_id}`. The library exposes config, state,
//! routes and the [`JobHub`](ws::JobHub) so the binary and integration
//! tests build the same app.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
