//! HTTP client for the audio upload endpoints.
//!
//! Files are validated locally before any bytes leave the machine, then
//! streamed as a multipart body so the caller can render progress.

use aidj_core::error::CoreError;
use aidj_core::upload::{validate_audio_upload, AUDIO_CONTENT_TYPE};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, Url};
use serde::Deserialize;
use serde_json::Value;

/// Size of each streamed body chunk. Progress is reported per chunk.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Upload client configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// HTTP base URL of the API (default: `http://localhost:8000`).
    pub api_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
        }
    }
}

impl UploadConfig {
    /// | Env Var        | Default                 |
    /// |----------------|-------------------------|
    /// | `AIDJ_API_URL` | `http://localhost:8000` |
    pub fn from_env() -> Self {
        match std::env::var("AIDJ_API_URL") {
            Ok(api_url) => Self { api_url },
            Err(_) => Self::default(),
        }
    }
}

/// Snapshot of an upload in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub percent: f64,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

/// A file the server accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    /// Public URL the audio can be played from.
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// An entry from the stored file listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredFile {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
struct FileListResponse {
    files: Vec<StoredFile>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Rejected locally before sending.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A success status with a body that could not be parsed.
    #[error("Invalid response from server")]
    InvalidResponse,

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

/// Client for `/upload-audio` and `/api/upload/*`.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    api_url: Url,
}

impl UploadClient {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| UploadError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if api_url.cannot_be_a_base() {
            return Err(UploadError::InvalidUrl(config.api_url.clone()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_url,
        })
    }

    /// Validate and upload one MP3 file.
    ///
    /// `on_progress` is called each time a chunk of the body is handed to
    /// the connection. The final call reports 100%.
    pub async fn upload_audio(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        on_progress: impl Fn(UploadProgress) + Send + Sync + 'static,
    ) -> Result<UploadedFile, UploadError> {
        let total_bytes = bytes.len() as u64;
        validate_audio_upload(file_name, total_bytes)?;

        let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let mut bytes_uploaded = 0u64;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            bytes_uploaded += chunk.len() as u64;
            on_progress(UploadProgress {
                percent: bytes_uploaded as f64 / total_bytes as f64 * 100.0,
                bytes_uploaded,
                total_bytes,
            });
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total_bytes)
            .file_name(file_name.to_string())
            .mime_str(AUDIO_CONTENT_TYPE)?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&["upload-audio"])?;
        tracing::info!(file_name, total_bytes, "Uploading audio");

        let response = self.http.post(url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("Upload failed with status {}", status.as_u16());
            return Err(rejection(response, message).await);
        }

        let uploaded = response
            .json::<UploadedFile>()
            .await
            .map_err(|_| UploadError::InvalidResponse)?;
        tracing::info!(url = %uploaded.url, "Upload complete");
        Ok(uploaded)
    }

    /// Delete a stored file by name.
    pub async fn delete_file(&self, filename: &str) -> Result<(), UploadError> {
        let url = self.endpoint(&["api", "upload", filename])?;
        let response = self.http.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(rejection(response, "Delete failed".into()).await);
        }
        tracing::info!(filename, "Deleted stored file");
        Ok(())
    }

    /// List every stored file.
    pub async fn list_files(&self) -> Result<Vec<StoredFile>, UploadError> {
        let url = self.endpoint(&["api", "upload", "files"])?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(rejection(response, "Failed to list files".into()).await);
        }
        let listing = response
            .json::<FileListResponse>()
            .await
            .map_err(|_| UploadError::InvalidResponse)?;
        Ok(listing.files)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UploadError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Build a [`UploadError::Rejected`] from the server's `detail` field,
/// falling back to `fallback` when the body carries none.
async fn rejection(response: Response, fallback: String) -> UploadError {
    let status = response.status().as_u16();
    let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("detail")?.as_str().map(str::to_string));
    UploadError::Rejected {
        status,
        message: detail.unwrap_or(fallback),
    }
}
