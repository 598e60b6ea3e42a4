//! Caller-supplied event handlers.
//!
//! [`JobHandlers`] is a fixed table with one optional slot per event
//! kind. It is built once with the `on_*` builder methods and moved into
//! the channel, which owns it for the rest of its life.

use std::fmt;

use aidj_core::job_events::JobEvent;

use crate::messages::JobMessage;

type MessageHandler = Box<dyn Fn(&JobMessage) + Send + Sync>;
type StageUpdateHandler = Box<dyn Fn(i64, &str, &str) + Send + Sync>;
type LogHandler = Box<dyn Fn(&str, &str) + Send + Sync>;
type ProgressHandler = Box<dyn Fn(f64) + Send + Sync>;
type TextHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Optional callbacks, one per event kind.
#[derive(Default)]
pub struct JobHandlers {
    on_message: Option<MessageHandler>,
    on_stage_update: Option<StageUpdateHandler>,
    on_log: Option<LogHandler>,
    on_progress: Option<ProgressHandler>,
    on_complete: Option<TextHandler>,
    on_error: Option<TextHandler>,
}

impl JobHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every decoded frame, including unknown kinds.
    pub fn on_message(mut self, handler: impl Fn(&JobMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Box::new(handler));
        self
    }

    /// Called with `(stage, name, status)` for `stage_update` frames.
    pub fn on_stage_update(
        mut self,
        handler: impl Fn(i64, &str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_stage_update = Some(Box::new(handler));
        self
    }

    /// Called with `(message, level)` for `log` frames.
    pub fn on_log(mut self, handler: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Box::new(handler));
        self
    }

    /// Called with the raw, unclamped percentage for `progress` frames.
    pub fn on_progress(mut self, handler: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(handler));
        self
    }

    /// Called with the mix URL for `complete` frames.
    pub fn on_complete(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(handler));
        self
    }

    /// Called with the server's message for `error` frames.
    pub fn on_error(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Fan one decoded frame out to the registered handlers.
    ///
    /// The generic handler runs first, then the kind-specific one. Each
    /// runs at most once per call.
    pub fn dispatch(&self, message: &JobMessage) {
        if let Some(handler) = &self.on_message {
            handler(message);
        }

        let Some(event) = message.event() else {
            return;
        };

        match event {
            JobEvent::StageUpdate {
                stage,
                name,
                status,
                ..
            } => {
                if let Some(handler) = &self.on_stage_update {
                    handler(*stage, name.as_str(), status.as_str());
                }
            }
            JobEvent::Log { message, level } => {
                if let Some(handler) = &self.on_log {
                    handler(message.as_str(), level.as_str());
                }
            }
            JobEvent::Progress { percent, .. } => {
                if let Some(handler) = &self.on_progress {
                    handler(*percent);
                }
            }
            JobEvent::Complete { mix_url, .. } => {
                if let Some(handler) = &self.on_complete {
                    handler(mix_url.as_str());
                }
            }
            JobEvent::Error { message } => {
                if let Some(handler) = &self.on_error {
                    handler(message.as_str());
                }
            }
            JobEvent::Connected
            | JobEvent::Heartbeat
            | JobEvent::Paused { .. }
            | JobEvent::Resumed { .. }
            | JobEvent::Cancelled { .. } => {}
        }
    }
}

impl fmt::Debug for JobHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_stage_update", &self.on_stage_update.is_some())
            .field("on_log", &self.on_log.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
