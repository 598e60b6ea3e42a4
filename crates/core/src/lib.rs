//! Shared building blocks for the aidj job-progress workspace.
//!
//! Holds the identifier aliases, wire message-type constants, upload
//! validation rules and the domain error type used by both the client
//! and the broadcast server.

pub mod error;
pub mod job_events;
pub mod types;
pub mod upload;
