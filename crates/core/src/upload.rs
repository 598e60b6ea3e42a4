//! Validation rules for audio uploads.
//!
//! Only MP3 files up to [`MAX_UPLOAD_BYTES`] are accepted. The checks
//! run client-side before any bytes are sent.

use crate::error::CoreError;

/// Largest accepted upload (50 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Required file extension, compared case-insensitively.
pub const AUDIO_EXTENSION: &str = ".mp3";

/// Content type sent with the multipart file part.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Check that a file is an MP3 of acceptable size.
///
/// Returns [`CoreError::Validation`] for a wrong extension or an empty
/// file, and [`CoreError::PayloadTooLarge`] when `size_bytes` exceeds
/// [`MAX_UPLOAD_BYTES`].
pub fn validate_audio_upload(file_name: &str, size_bytes: u64) -> Result<(), CoreError> {
    if !file_name.to_lowercase().ends_with(AUDIO_EXTENSION) {
        return Err(CoreError::Validation(
            "Only MP3 files are allowed".to_string(),
        ));
    }

    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::PayloadTooLarge(format!(
            "File too large. Maximum size is 50MB. Your file: {:.2}MB",
            size_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    if size_bytes == 0 {
        return Err(CoreError::Validation("Uploaded file is empty".to_string()));
    }

    Ok(())
}
