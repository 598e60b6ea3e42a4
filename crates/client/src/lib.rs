//! Client library for following aidj render jobs.
//!
//! Provides the reconnecting [`JobChannel`](channel::JobChannel) that
//! streams job-progress events over WebSocket, the frame decoder, the
//! transport seam used to open connections, and an HTTP client for
//! audio uploads.

pub mod channel;
pub mod config;
pub mod endpoint;
pub mod handlers;
pub mod messages;
pub mod reconnect;
pub mod transport;
pub mod upload;

pub use channel::{ConnectionState, JobChannel};
pub use config::ChannelConfig;
pub use handlers::JobHandlers;
pub use messages::JobMessage;
