//! Job-progress frame decoder.
//!
//! The server sends one JSON object per text frame with the shape
//! `{"type": "<kind>", ...fields}`. Recognised kinds decode into a typed
//! [`JobEvent`]; any other `type` is kept as [`JobMessage::Unknown`] so
//! the generic handler still sees it.

use aidj_core::job_events::{is_known_type, JobEvent};
use serde::Deserialize;
use serde_json::Value;

/// One decoded inbound frame.
///
/// Both variants keep the raw JSON object so callers can read fields
/// the typed event does not model.
#[derive(Debug, Clone, PartialEq)]
pub enum JobMessage {
    /// A frame whose `type` is one of the known job event kinds.
    Known { event: JobEvent, raw: Value },

    /// A well-formed frame with a `type` this client does not know.
    Unknown { kind: String, raw: Value },
}

impl JobMessage {
    /// The frame's `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            JobMessage::Known { event, .. } => event.kind(),
            JobMessage::Unknown { kind, .. } => kind,
        }
    }

    /// The typed event, if the kind was recognised.
    pub fn event(&self) -> Option<&JobEvent> {
        match self {
            JobMessage::Known { event, .. } => Some(event),
            JobMessage::Unknown { .. } => None,
        }
    }

    /// The full JSON object as received.
    pub fn raw(&self) -> &Value {
        match self {
            JobMessage::Known { raw, .. } | JobMessage::Unknown { raw, .. } => raw,
        }
    }
}

/// Reasons a frame could not be decoded. Always local to one frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is JSON but not an object with a string `type` field.
    #[error("Frame has no string \"type\" field")]
    MissingType,

    /// The `type` is known but its fields do not match the event shape.
    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a text frame into a [`JobMessage`].
///
/// Unknown `type` values are not an error. Callers should log the
/// returned error and keep reading.
pub fn decode_frame(text: &str) -> Result<JobMessage, DecodeError> {
    let raw: Value = serde_json::from_str(text)?;

    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();

    if !is_known_type(&kind) {
        return Ok(JobMessage::Unknown { kind, raw });
    }

    match JobEvent::deserialize(&raw) {
        Ok(event) => Ok(JobMessage::Known { event, raw }),
        Err(source) => Err(DecodeError::InvalidPayload { kind, source }),
    }
}
