/// Remote jobs are addressed by an opaque string handed out by the backend.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
