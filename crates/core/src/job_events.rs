//! Job-progress wire events and their message type constants.
//!
//! Shared by the client decoder and the broadcast server so both sides
//! agree on the `"type"` tag and field names of every frame.

use serde::{Deserialize, Serialize};

/// Sent by the server once a subscription is accepted.
pub const MSG_TYPE_CONNECTED: &str = "connected";

/// A pipeline stage started, finished or failed.
pub const MSG_TYPE_STAGE_UPDATE: &str = "stage_update";

/// Free-form log line from the render pipeline.
pub const MSG_TYPE_LOG: &str = "log";

/// Percentage update for the job as a whole.
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Job finished; carries the URL of the rendered mix.
pub const MSG_TYPE_COMPLETE: &str = "complete";

/// Job failed with an error.
pub const MSG_TYPE_ERROR: &str = "error";

/// Server-side liveness signal with no payload.
pub const MSG_TYPE_HEARTBEAT: &str = "heartbeat";

/// Job was paused by the user.
pub const MSG_TYPE_PAUSED: &str = "paused";

/// A paused job resumed.
pub const MSG_TYPE_RESUMED: &str = "resumed";

/// Job was cancelled.
pub const MSG_TYPE_CANCELLED: &str = "cancelled";

/// Every `"type"` tag the decoder understands.
pub const KNOWN_MSG_TYPES: [&str; 10] = [
    MSG_TYPE_CONNECTED,
    MSG_TYPE_STAGE_UPDATE,
    MSG_TYPE_LOG,
    MSG_TYPE_PROGRESS,
    MSG_TYPE_COMPLETE,
    MSG_TYPE_ERROR,
    MSG_TYPE_HEARTBEAT,
    MSG_TYPE_PAUSED,
    MSG_TYPE_RESUMED,
    MSG_TYPE_CANCELLED,
];

/// Number of stages in the mix pipeline, reported with every stage update.
pub const TOTAL_STAGES: u32 = 5;

/// Literal keepalive frame sent by clients.
pub const PING_FRAME: &str = "ping";

/// Returns `true` if `kind` is one of [`KNOWN_MSG_TYPES`].
pub fn is_known_type(kind: &str) -> bool {
    KNOWN_MSG_TYPES.contains(&kind)
}

/// A server-pushed job event, tagged by its `"type"` field.
///
/// Optional fields are tolerated when missing so older servers that
/// omit them still decode. Extra fields (e.g. `success`) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Connected,

    StageUpdate {
        /// Zero-based index of the pipeline stage.
        stage: i64,
        name: String,
        /// Free-form status, e.g. `"running"` or `"complete"`.
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_stages: Option<u32>,
    },

    Log {
        message: String,
        #[serde(default = "default_log_level")]
        level: String,
    },

    /// Percent complete. Not clamped: out-of-range values pass through.
    Progress {
        percent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<i64>,
    },

    Complete {
        /// URL of the rendered mix.
        mix_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },

    Error {
        message: String,
    },

    Heartbeat,

    Paused {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    Resumed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    Cancelled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

fn default_log_level() -> String {
    "info".to_string()
}

impl JobEvent {
    /// The wire `"type"` tag for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::Connected => MSG_TYPE_CONNECTED,
            JobEvent::StageUpdate { .. } => MSG_TYPE_STAGE_UPDATE,
            JobEvent::Log { .. } => MSG_TYPE_LOG,
            JobEvent::Progress { .. } => MSG_TYPE_PROGRESS,
            JobEvent::Complete { .. } => MSG_TYPE_COMPLETE,
            JobEvent::Error { .. } => MSG_TYPE_ERROR,
            JobEvent::Heartbeat => MSG_TYPE_HEARTBEAT,
            JobEvent::Paused { .. } => MSG_TYPE_PAUSED,
            JobEvent::Resumed { .. } => MSG_TYPE_RESUMED,
            JobEvent::Cancelled { .. } => MSG_TYPE_CANCELLED,
        }
    }

    /// Whether the job can emit no further progress after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Complete { .. } | JobEvent::Error { .. } | JobEvent::Cancelled { .. }
        )
    }
}
