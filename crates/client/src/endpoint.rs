//! Stream endpoint resolution.
//!
//! Maps a job identifier to the WebSocket URL its events are served on.
//! The URL scheme belongs to the server; the default [`BaseUrlResolver`]
//! follows the `/ws/{job_id}` route of `aidj-api`.

/// Resolves the event-stream URL for a job.
pub trait EndpointResolver: Send + Sync + 'static {
    fn resolve(&self, job_id: &str) -> String;
}

impl<F> EndpointResolver for F
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    fn resolve(&self, job_id: &str) -> String {
        self(job_id)
    }
}

/// Appends `/ws/{job_id}` to a fixed WebSocket base URL.
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    base_url: String,
}

impl BaseUrlResolver {
    /// * `base_url` - WebSocket base URL, e.g. `ws://host:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// WebSocket base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl EndpointResolver for BaseUrlResolver {
    fn resolve(&self, job_id: &str) -> String {
        format!("{}/ws/{}", self.base_url, job_id)
    }
}
